//! obs-websocket v5 wire format: envelopes, requests, responses and the events we consume.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{InputName, SceneName};

pub const RPC_VERSION: u32 = 1;

/// Event subscription bits from the v5 `EventSubscription` enum.
pub mod event_subscription {
    pub const GENERAL: u32 = 1 << 0;
    pub const SCENES: u32 = 1 << 2;
    pub const INPUTS: u32 = 1 << 3;
    pub const MEDIA_INPUTS: u32 = 1 << 8;

    /// Custom events ride on `GENERAL`.
    pub const CONTROL_SURFACE: u32 = GENERAL | SCENES | INPUTS | MEDIA_INPUTS;
}

/// Close code the host uses when `Identify` carries a wrong password.
pub const CLOSE_AUTHENTICATION_FAILED: u16 = 4009;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum OpCode {
    Hello,
    Identify,
    Identified,
    Reidentify,
    Event,
    Request,
    RequestResponse,
    RequestBatch,
    RequestBatchResponse,
}

impl TryFrom<u8> for OpCode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => OpCode::Hello,
            1 => OpCode::Identify,
            2 => OpCode::Identified,
            3 => OpCode::Reidentify,
            5 => OpCode::Event,
            6 => OpCode::Request,
            7 => OpCode::RequestResponse,
            8 => OpCode::RequestBatch,
            9 => OpCode::RequestBatchResponse,
            other => return Err(format!("unknown op code {other}")),
        })
    }
}

impl From<OpCode> for u8 {
    fn from(value: OpCode) -> Self {
        match value {
            OpCode::Hello => 0,
            OpCode::Identify => 1,
            OpCode::Identified => 2,
            OpCode::Reidentify => 3,
            OpCode::Event => 5,
            OpCode::Request => 6,
            OpCode::RequestResponse => 7,
            OpCode::RequestBatch => 8,
            OpCode::RequestBatchResponse => 9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub op: OpCode,
    pub d: Value,
}

impl Envelope {
    pub fn new<T: Serialize>(op: OpCode, payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            op,
            d: serde_json::to_value(payload)?,
        })
    }

    pub fn payload<T: DeserializeOwned>(self) -> serde_json::Result<T> {
        serde_json::from_value(self.d)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    #[serde(default)]
    pub obs_web_socket_version: String,
    pub rpc_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthChallenge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    pub rpc_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    pub event_subscriptions: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identified {
    pub negotiated_rpc_version: u32,
}

/// Requests the control surface issues. Serializes to `{requestType, requestData}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "requestType",
    content = "requestData",
    rename_all_fields = "camelCase"
)]
pub enum Request {
    GetCurrentProgramScene,
    SetCurrentProgramScene {
        scene_name: SceneName,
    },
    GetInputMute {
        input_name: InputName,
    },
    SetInputMute {
        input_name: InputName,
        input_muted: bool,
    },
    GetInputVolume {
        input_name: InputName,
    },
    SetInputVolume {
        input_name: InputName,
        input_volume_db: f64,
    },
    GetSceneItemId {
        scene_name: SceneName,
        source_name: String,
    },
    GetSceneItemTransform {
        scene_name: SceneName,
        scene_item_id: i64,
    },
    SetSceneItemTransform {
        scene_name: SceneName,
        scene_item_id: i64,
        scene_item_transform: SceneItemTransform,
    },
    GetPersistentData {
        realm: String,
        slot_name: String,
    },
    SetPersistentData {
        realm: String,
        slot_name: String,
        slot_value: Value,
    },
    BroadcastCustomEvent {
        event_data: Map<String, Value>,
    },
    SetInputSettings {
        input_name: InputName,
        input_settings: Value,
        overlay: bool,
    },
    TriggerMediaInputAction {
        input_name: InputName,
        media_action: String,
    },
    GetMediaInputStatus {
        input_name: InputName,
    },
}

impl Request {
    pub fn request_type(&self) -> &'static str {
        match self {
            Request::GetCurrentProgramScene => "GetCurrentProgramScene",
            Request::SetCurrentProgramScene { .. } => "SetCurrentProgramScene",
            Request::GetInputMute { .. } => "GetInputMute",
            Request::SetInputMute { .. } => "SetInputMute",
            Request::GetInputVolume { .. } => "GetInputVolume",
            Request::SetInputVolume { .. } => "SetInputVolume",
            Request::GetSceneItemId { .. } => "GetSceneItemId",
            Request::GetSceneItemTransform { .. } => "GetSceneItemTransform",
            Request::SetSceneItemTransform { .. } => "SetSceneItemTransform",
            Request::GetPersistentData { .. } => "GetPersistentData",
            Request::SetPersistentData { .. } => "SetPersistentData",
            Request::BroadcastCustomEvent { .. } => "BroadcastCustomEvent",
            Request::SetInputSettings { .. } => "SetInputSettings",
            Request::TriggerMediaInputAction { .. } => "TriggerMediaInputAction",
            Request::GetMediaInputStatus { .. } => "GetMediaInputStatus",
        }
    }

    /// Reads never change what the audience sees.
    pub fn is_mutation(&self) -> bool {
        !self.request_type().starts_with("Get")
    }

    /// Request body (`d` of an op 6 envelope) tagged with `request_id`.
    pub fn to_payload(&self, request_id: &str) -> serde_json::Result<Value> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.insert(
                "requestId".to_string(),
                Value::String(request_id.to_string()),
            );
        }
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestResponse {
    pub request_type: String,
    pub request_id: String,
    pub request_status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestStatus {
    pub result: bool,
    pub code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentProgramScene {
    pub current_program_scene_name: SceneName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputMuteState {
    pub input_muted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputVolume {
    #[serde(default)]
    pub input_volume_mul: f64,
    pub input_volume_db: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneItemId {
    pub scene_item_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneItemTransformResponse {
    pub scene_item_transform: SceneItemTransform,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentData {
    #[serde(default)]
    pub slot_value: Option<Value>,
}

/// Transform of one scene item. Fields we never touch are carried through untouched so a
/// read-modify-write does not reset them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneItemTransform {
    #[serde(default)]
    pub scale_x: f64,
    #[serde(default)]
    pub scale_y: f64,
    #[serde(default)]
    pub crop_top: i64,
    #[serde(default)]
    pub crop_bottom: i64,
    #[serde(default)]
    pub crop_left: i64,
    #[serde(default)]
    pub crop_right: i64,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaState {
    #[serde(rename = "OBS_MEDIA_STATE_NONE")]
    None,
    #[serde(rename = "OBS_MEDIA_STATE_PLAYING")]
    Playing,
    #[serde(rename = "OBS_MEDIA_STATE_OPENING")]
    Opening,
    #[serde(rename = "OBS_MEDIA_STATE_BUFFERING")]
    Buffering,
    #[serde(rename = "OBS_MEDIA_STATE_PAUSED")]
    Paused,
    #[serde(rename = "OBS_MEDIA_STATE_STOPPED")]
    Stopped,
    #[serde(rename = "OBS_MEDIA_STATE_ENDED")]
    Ended,
    #[serde(rename = "OBS_MEDIA_STATE_ERROR")]
    Error,
    #[serde(other)]
    Unknown,
}

impl MediaState {
    /// States that may still turn into `Playing` without operator action.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            MediaState::Opening | MediaState::Buffering | MediaState::Paused
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInputStatus {
    pub media_state: MediaState,
    /// Milliseconds; absent or negative while the host has not probed the file yet.
    #[serde(default)]
    pub media_duration: Option<i64>,
    #[serde(default)]
    pub media_cursor: Option<i64>,
}

pub const MEDIA_ACTION_STOP: &str = "OBS_WEBSOCKET_MEDIA_INPUT_ACTION_STOP";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub event_type: String,
    #[serde(default)]
    pub event_intent: u32,
    #[serde(default)]
    pub event_data: Value,
}

/// Inbound notifications the control surface reconciles against.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "eventType", content = "eventData")]
pub enum Notification {
    #[serde(rename_all = "camelCase")]
    CurrentProgramSceneChanged { scene_name: SceneName },
    #[serde(rename_all = "camelCase")]
    InputVolumeChanged {
        input_name: InputName,
        input_volume_db: f64,
    },
    #[serde(rename_all = "camelCase")]
    InputMuteStateChanged {
        input_name: InputName,
        input_muted: bool,
    },
    #[serde(rename_all = "camelCase")]
    MediaInputPlaybackStarted { input_name: InputName },
    CustomEvent(Map<String, Value>),
    /// Synthesised locally when the socket goes away; never on the wire.
    #[serde(skip_deserializing)]
    ConnectionClosed { reason: String },
}

const CONSUMED_EVENT_TYPES: [&str; 5] = [
    "CurrentProgramSceneChanged",
    "InputVolumeChanged",
    "InputMuteStateChanged",
    "MediaInputPlaybackStarted",
    "CustomEvent",
];

impl Notification {
    /// Decodes an op 5 payload. Event types the control surface does not consume yield `None`.
    pub fn from_event(event: EventPayload) -> serde_json::Result<Option<Self>> {
        if !CONSUMED_EVENT_TYPES.contains(&event.event_type.as_str()) {
            return Ok(None);
        }
        let tagged = serde_json::json!({
            "eventType": event.event_type,
            "eventData": event.event_data,
        });
        serde_json::from_value(tagged).map(Some)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::CurrentProgramSceneChanged { .. } => "CurrentProgramSceneChanged",
            Notification::InputVolumeChanged { .. } => "InputVolumeChanged",
            Notification::InputMuteStateChanged { .. } => "InputMuteStateChanged",
            Notification::MediaInputPlaybackStarted { .. } => "MediaInputPlaybackStarted",
            Notification::CustomEvent(_) => "CustomEvent",
            Notification::ConnectionClosed { .. } => "ConnectionClosed",
        }
    }
}
