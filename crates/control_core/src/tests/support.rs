//! In-memory production host used by every control_core test.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use obs_client::RemoteSession;
use serde_json::{json, Map, Value};
use shared::{
    domain::{InputName, SceneName},
    error::RemoteError,
    protocol::{MediaInputStatus, MediaState, Notification, Request, SceneItemTransform},
};
use tokio::sync::{broadcast, Mutex};

use crate::config::PanelConfig;

pub struct HostState {
    pub program_scene: SceneName,
    pub muted: HashMap<InputName, bool>,
    pub volume_db: HashMap<InputName, f64>,
    pub items: HashMap<(SceneName, String), i64>,
    pub transforms: HashMap<(SceneName, i64), SceneItemTransform>,
    pub persistent: HashMap<(String, String), Value>,
    pub media: MediaInputStatus,
    pub input_settings: HashMap<InputName, Value>,
    pub broadcasts: Vec<Map<String, Value>>,
    pub media_actions: Vec<(InputName, String)>,
}

pub struct FakeHost {
    pub state: Mutex<HostState>,
    requests: Mutex<Vec<Request>>,
    failures: Mutex<HashMap<(String, Option<String>), RemoteError>>,
    events: broadcast::Sender<Notification>,
    latency: Duration,
}

fn target(request: &Request) -> Option<String> {
    match request {
        Request::SetCurrentProgramScene { scene_name }
        | Request::GetSceneItemId { scene_name, .. }
        | Request::GetSceneItemTransform { scene_name, .. }
        | Request::SetSceneItemTransform { scene_name, .. } => Some(scene_name.to_string()),
        Request::GetInputMute { input_name }
        | Request::SetInputMute { input_name, .. }
        | Request::GetInputVolume { input_name }
        | Request::SetInputVolume { input_name, .. }
        | Request::SetInputSettings { input_name, .. }
        | Request::TriggerMediaInputAction { input_name, .. }
        | Request::GetMediaInputStatus { input_name } => Some(input_name.to_string()),
        Request::GetPersistentData { slot_name, .. }
        | Request::SetPersistentData { slot_name, .. } => Some(slot_name.clone()),
        Request::GetCurrentProgramScene | Request::BroadcastCustomEvent { .. } => None,
    }
}

fn rejected(request_type: &str, comment: &str) -> RemoteError {
    RemoteError::Rejected {
        request_type: request_type.to_string(),
        code: 600,
        comment: comment.to_string(),
    }
}

impl FakeHost {
    /// A studio matching the default panel config: program on Title, both mics live,
    /// PIP at 0.25 in every hosting scene.
    pub fn new() -> Arc<Self> {
        Self::build(Duration::ZERO)
    }

    pub fn with_latency(latency: Duration) -> Arc<Self> {
        Self::build(latency)
    }

    fn build(latency: Duration) -> Arc<Self> {
        let config = PanelConfig::default();
        let mut items = HashMap::new();
        let mut transforms = HashMap::new();
        for (index, scene) in config.pip_scenes.iter().enumerate() {
            let id = index as i64 + 10;
            items.insert((scene.clone(), config.pip_source.clone()), id);
            let mut other = Map::new();
            other.insert("positionX".into(), json!(1280.0));
            transforms.insert(
                (scene.clone(), id),
                SceneItemTransform {
                    scale_x: 0.25,
                    scale_y: 0.25,
                    other,
                    ..SceneItemTransform::default()
                },
            );
        }
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            state: Mutex::new(HostState {
                program_scene: SceneName::new("Title"),
                muted: [
                    (config.instructor_input.clone(), false),
                    (config.broadcaster_input.clone(), false),
                ]
                .into_iter()
                .collect(),
                volume_db: [(config.volume_input.clone(), -3.0)].into_iter().collect(),
                items,
                transforms,
                persistent: HashMap::new(),
                media: MediaInputStatus {
                    media_state: MediaState::Stopped,
                    media_duration: None,
                    media_cursor: None,
                },
                input_settings: HashMap::new(),
                broadcasts: Vec::new(),
                media_actions: Vec::new(),
            }),
            requests: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            events,
            latency,
        })
    }

    pub fn session(self: &Arc<Self>) -> Arc<dyn RemoteSession> {
        self.clone()
    }

    /// Makes every `request_type` call (optionally only for one scene/input/slot) fail.
    pub async fn fail(&self, request_type: &str, target: Option<&str>, err: RemoteError) {
        self.failures
            .lock()
            .await
            .insert((request_type.to_string(), target.map(str::to_string)), err);
    }

    pub async fn heal(&self) {
        self.failures.lock().await.clear();
    }

    pub fn emit(&self, notification: Notification) {
        let _ = self.events.send(notification);
    }

    pub async fn requests(&self) -> Vec<Request> {
        self.requests.lock().await.clone()
    }

    pub async fn clear_requests(&self) {
        self.requests.lock().await.clear();
    }

    pub async fn mutations(&self) -> Vec<Request> {
        self.requests()
            .await
            .into_iter()
            .filter(Request::is_mutation)
            .collect()
    }

    pub async fn scale_in(&self, scene: &str) -> f64 {
        let state = self.state.lock().await;
        state
            .transforms
            .iter()
            .find(|((name, _), _)| name.as_str() == scene)
            .map(|(_, transform)| transform.scale_x)
            .unwrap_or(f64::NAN)
    }

    pub async fn transform_in(&self, scene: &str) -> SceneItemTransform {
        let state = self.state.lock().await;
        state
            .transforms
            .iter()
            .find(|((name, _), _)| name.as_str() == scene)
            .map(|(_, transform)| transform.clone())
            .unwrap_or_default()
    }

    async fn injected_failure(&self, request: &Request) -> Option<RemoteError> {
        let failures = self.failures.lock().await;
        let request_type = request.request_type().to_string();
        failures
            .get(&(request_type.clone(), target(request)))
            .or_else(|| failures.get(&(request_type, None)))
            .cloned()
    }

    async fn apply(&self, request: Request) -> Result<Value, RemoteError> {
        let request_type = request.request_type();
        let mut state = self.state.lock().await;
        let response = match request {
            Request::GetCurrentProgramScene => {
                json!({"currentProgramSceneName": state.program_scene})
            }
            Request::SetCurrentProgramScene { scene_name } => {
                state.program_scene = scene_name;
                Value::Null
            }
            Request::GetInputMute { input_name } => match state.muted.get(&input_name) {
                Some(muted) => json!({"inputMuted": muted}),
                None => return Err(rejected(request_type, "no such input")),
            },
            Request::SetInputMute {
                input_name,
                input_muted,
            } => {
                state.muted.insert(input_name, input_muted);
                Value::Null
            }
            Request::GetInputVolume { input_name } => match state.volume_db.get(&input_name) {
                Some(db) => json!({"inputVolumeMul": 10f64.powf(db / 20.0), "inputVolumeDb": db}),
                None => return Err(rejected(request_type, "no such input")),
            },
            Request::SetInputVolume {
                input_name,
                input_volume_db,
            } => {
                state.volume_db.insert(input_name, input_volume_db);
                Value::Null
            }
            Request::GetSceneItemId {
                scene_name,
                source_name,
            } => match state.items.get(&(scene_name, source_name)) {
                Some(id) => json!({"sceneItemId": id}),
                None => return Err(rejected(request_type, "no such scene item")),
            },
            Request::GetSceneItemTransform {
                scene_name,
                scene_item_id,
            } => match state.transforms.get(&(scene_name, scene_item_id)) {
                Some(transform) => json!({"sceneItemTransform": transform}),
                None => return Err(rejected(request_type, "no such scene item")),
            },
            Request::SetSceneItemTransform {
                scene_name,
                scene_item_id,
                scene_item_transform,
            } => {
                state
                    .transforms
                    .insert((scene_name, scene_item_id), scene_item_transform);
                Value::Null
            }
            Request::GetPersistentData { realm, slot_name } => {
                let value = state
                    .persistent
                    .get(&(realm, slot_name))
                    .cloned()
                    .unwrap_or(Value::Null);
                json!({"slotValue": value})
            }
            Request::SetPersistentData {
                realm,
                slot_name,
                slot_value,
            } => {
                state.persistent.insert((realm, slot_name), slot_value);
                Value::Null
            }
            Request::BroadcastCustomEvent { event_data } => {
                state.broadcasts.push(event_data);
                Value::Null
            }
            Request::SetInputSettings {
                input_name,
                input_settings,
                ..
            } => {
                state.input_settings.insert(input_name, input_settings);
                Value::Null
            }
            Request::TriggerMediaInputAction {
                input_name,
                media_action,
            } => {
                state.media_actions.push((input_name, media_action));
                Value::Null
            }
            Request::GetMediaInputStatus { .. } => serde_json::to_value(&state.media)
                .map_err(|err| RemoteError::Protocol(err.to_string()))?,
        };
        Ok(response)
    }
}

#[async_trait]
impl RemoteSession for FakeHost {
    async fn call(&self, request: Request) -> Result<Value, RemoteError> {
        self.requests.lock().await.push(request.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(err) = self.injected_failure(&request).await {
            return Err(err);
        }
        self.apply(request).await
    }

    fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.events.subscribe()
    }
}
