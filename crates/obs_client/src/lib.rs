//! Connection to the production host: the `RemoteSession` command/notification seam and its
//! obs-websocket implementation.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use shared::{
    domain::{InputName, SceneName},
    error::RemoteError,
    protocol::{
        CurrentProgramScene, InputMuteState, InputVolume, MediaInputStatus, Notification,
        PersistentData, Request, SceneItemId, SceneItemTransform, SceneItemTransformResponse,
        MEDIA_ACTION_STOP,
    },
};
use tokio::sync::broadcast;

pub mod auth;
mod session;

pub use session::{ConnectOptions, ObsWebSocketSession};

/// Command/notification channel to the production host.
///
/// `call` is bounded by the implementation's request timeout and fails with
/// [`RemoteError::Unavailable`] on expiry or connection loss. Implementations never retry.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    async fn call(&self, request: Request) -> Result<Value, RemoteError>;

    /// Every inbound notification, in the order the host sent it.
    fn subscribe(&self) -> broadcast::Receiver<Notification>;
}

fn decode<T: DeserializeOwned>(request_type: &str, value: Value) -> Result<T, RemoteError> {
    serde_json::from_value(value).map_err(|err| {
        RemoteError::Protocol(format!("malformed {request_type} response: {err}"))
    })
}

impl dyn RemoteSession {
    async fn call_as<T: DeserializeOwned>(&self, request: Request) -> Result<T, RemoteError> {
        let request_type = request.request_type();
        let value = self.call(request).await?;
        decode(request_type, value)
    }

    pub async fn get_current_program_scene(&self) -> Result<SceneName, RemoteError> {
        let scene: CurrentProgramScene = self.call_as(Request::GetCurrentProgramScene).await?;
        Ok(scene.current_program_scene_name)
    }

    pub async fn set_current_program_scene(&self, scene: &SceneName) -> Result<(), RemoteError> {
        self.call(Request::SetCurrentProgramScene {
            scene_name: scene.clone(),
        })
        .await
        .map(drop)
    }

    pub async fn get_input_mute(&self, input: &InputName) -> Result<bool, RemoteError> {
        let state: InputMuteState = self
            .call_as(Request::GetInputMute {
                input_name: input.clone(),
            })
            .await?;
        Ok(state.input_muted)
    }

    pub async fn set_input_mute(&self, input: &InputName, muted: bool) -> Result<(), RemoteError> {
        self.call(Request::SetInputMute {
            input_name: input.clone(),
            input_muted: muted,
        })
        .await
        .map(drop)
    }

    pub async fn get_input_volume(&self, input: &InputName) -> Result<f64, RemoteError> {
        let volume: InputVolume = self
            .call_as(Request::GetInputVolume {
                input_name: input.clone(),
            })
            .await?;
        Ok(volume.input_volume_db)
    }

    pub async fn set_input_volume(&self, input: &InputName, db: f64) -> Result<(), RemoteError> {
        self.call(Request::SetInputVolume {
            input_name: input.clone(),
            input_volume_db: db,
        })
        .await
        .map(drop)
    }

    pub async fn get_scene_item_id(
        &self,
        scene: &SceneName,
        source_name: &str,
    ) -> Result<i64, RemoteError> {
        let item: SceneItemId = self
            .call_as(Request::GetSceneItemId {
                scene_name: scene.clone(),
                source_name: source_name.to_string(),
            })
            .await?;
        Ok(item.scene_item_id)
    }

    pub async fn get_scene_item_transform(
        &self,
        scene: &SceneName,
        scene_item_id: i64,
    ) -> Result<SceneItemTransform, RemoteError> {
        let response: SceneItemTransformResponse = self
            .call_as(Request::GetSceneItemTransform {
                scene_name: scene.clone(),
                scene_item_id,
            })
            .await?;
        Ok(response.scene_item_transform)
    }

    pub async fn set_scene_item_transform(
        &self,
        scene: &SceneName,
        scene_item_id: i64,
        transform: SceneItemTransform,
    ) -> Result<(), RemoteError> {
        self.call(Request::SetSceneItemTransform {
            scene_name: scene.clone(),
            scene_item_id,
            scene_item_transform: transform,
        })
        .await
        .map(drop)
    }

    pub async fn get_persistent_data(
        &self,
        realm: &str,
        slot_name: &str,
    ) -> Result<Option<Value>, RemoteError> {
        let data: PersistentData = self
            .call_as(Request::GetPersistentData {
                realm: realm.to_string(),
                slot_name: slot_name.to_string(),
            })
            .await?;
        Ok(data.slot_value.filter(|value| !value.is_null()))
    }

    pub async fn set_persistent_data(
        &self,
        realm: &str,
        slot_name: &str,
        value: Value,
    ) -> Result<(), RemoteError> {
        self.call(Request::SetPersistentData {
            realm: realm.to_string(),
            slot_name: slot_name.to_string(),
            slot_value: value,
        })
        .await
        .map(drop)
    }

    pub async fn broadcast_custom_event(
        &self,
        payload: Map<String, Value>,
    ) -> Result<(), RemoteError> {
        self.call(Request::BroadcastCustomEvent {
            event_data: payload,
        })
        .await
        .map(drop)
    }

    pub async fn set_input_settings(
        &self,
        input: &InputName,
        settings: Value,
        overlay: bool,
    ) -> Result<(), RemoteError> {
        self.call(Request::SetInputSettings {
            input_name: input.clone(),
            input_settings: settings,
            overlay,
        })
        .await
        .map(drop)
    }

    pub async fn trigger_media_input_action(
        &self,
        input: &InputName,
        action: &str,
    ) -> Result<(), RemoteError> {
        self.call(Request::TriggerMediaInputAction {
            input_name: input.clone(),
            media_action: action.to_string(),
        })
        .await
        .map(drop)
    }

    pub async fn get_media_input_status(
        &self,
        input: &InputName,
    ) -> Result<MediaInputStatus, RemoteError> {
        self.call_as(Request::GetMediaInputStatus {
            input_name: input.clone(),
        })
        .await
    }

    /// Points the media input at `file` and starts it from the top.
    pub async fn play_media(&self, input: &InputName, file: &str) -> Result<(), RemoteError> {
        self.set_input_settings(input, json!({ "local_file": file }), true)
            .await
    }

    pub async fn stop_media(&self, input: &InputName) -> Result<(), RemoteError> {
        self.trigger_media_input_action(input, MEDIA_ACTION_STOP)
            .await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
