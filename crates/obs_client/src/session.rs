use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use futures::{SinkExt, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{
    error::RemoteError,
    protocol::{
        event_subscription, Envelope, EventPayload, Hello, Identified, Identify, Notification,
        OpCode, Request, RequestResponse, CLOSE_AUTHENTICATION_FAILED, RPC_VERSION,
    },
};
use tokio::{
    sync::{broadcast, mpsc, oneshot, Mutex},
    task::JoinHandle,
    time::timeout,
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::{auth::authentication_string, RemoteSession};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);
const NOTIFICATION_CAPACITY: usize = 1024;

type PendingRequests = Arc<Mutex<HashMap<String, oneshot::Sender<RequestResponse>>>>;

#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub request_timeout: Duration,
    pub tls: bool,
}

impl ConnectOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            password: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            tls: false,
        }
    }

    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn url(&self) -> String {
        let scheme = if self.tls { "wss" } else { "ws" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

/// obs-websocket v5 session. One reader task owns the inbound half of the socket and is the
/// single delivery context for notifications; one writer task serialises outbound frames.
pub struct ObsWebSocketSession {
    outbound: mpsc::UnboundedSender<Message>,
    pending: PendingRequests,
    events: broadcast::Sender<Notification>,
    closed: Arc<AtomicBool>,
    request_timeout: Duration,
    tasks: Vec<JoinHandle<()>>,
}

impl ObsWebSocketSession {
    /// Connects and completes the Hello/Identify handshake. No reconnect is attempted later.
    pub async fn connect(options: ConnectOptions) -> Result<Arc<Self>, RemoteError> {
        let url = options.url();
        let (ws_stream, _) = timeout(options.request_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| RemoteError::Unavailable(format!("timed out connecting to {url}")))?
            .map_err(|err| RemoteError::Unavailable(format!("failed to connect to {url}: {err}")))?;
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        let hello: Hello =
            read_handshake(&mut ws_reader, OpCode::Hello, options.request_timeout).await?;
        let authentication = match (&hello.authentication, &options.password) {
            (Some(challenge), Some(password)) => Some(authentication_string(
                password,
                &challenge.salt,
                &challenge.challenge,
            )),
            (Some(_), None) => {
                return Err(RemoteError::Authentication(
                    "host requires a password but none was supplied".to_string(),
                ))
            }
            (None, _) => None,
        };
        let identify = Envelope::new(
            OpCode::Identify,
            &Identify {
                rpc_version: RPC_VERSION,
                authentication,
                event_subscriptions: event_subscription::CONTROL_SURFACE,
            },
        )
        .map_err(|err| RemoteError::Protocol(format!("failed to encode identify: {err}")))?;
        ws_writer
            .send(Message::Text(encode_envelope(&identify)?))
            .await
            .map_err(|err| RemoteError::Unavailable(format!("failed to send identify: {err}")))?;
        let identified: Identified =
            read_handshake(&mut ws_reader, OpCode::Identified, options.request_timeout).await?;
        info!(
            url = %url,
            host_version = %hello.obs_web_socket_version,
            rpc_version = identified.negotiated_rpc_version,
            "obs: session identified"
        );

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let pending: PendingRequests = Arc::new(Mutex::new(HashMap::new()));
        let (events, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        let closed = Arc::new(AtomicBool::new(false));

        let writer_task = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let is_close = matches!(message, Message::Close(_));
                if let Err(err) = ws_writer.send(message).await {
                    warn!("obs: websocket send failed: {err}");
                    break;
                }
                if is_close {
                    break;
                }
            }
        });

        let reader_task = {
            let pending = Arc::clone(&pending);
            let events = events.clone();
            let closed = Arc::clone(&closed);
            tokio::spawn(async move {
                let reason = loop {
                    match ws_reader.next().await {
                        Some(Ok(Message::Text(text))) => {
                            handle_inbound_text(&text, &pending, &events).await;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            break match frame {
                                Some(frame) if !frame.reason.is_empty() => frame.reason.to_string(),
                                Some(frame) => {
                                    format!("closed by host (code {})", u16::from(frame.code))
                                }
                                None => "closed by host".to_string(),
                            };
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => break format!("websocket receive failed: {err}"),
                        None => break "connection closed".to_string(),
                    }
                };
                closed.store(true, Ordering::SeqCst);
                pending.lock().await.clear();
                error!(reason = %reason, "obs: connection to production host lost");
                let _ = events.send(Notification::ConnectionClosed { reason });
            })
        };

        Ok(Arc::new(Self {
            outbound,
            pending,
            events,
            closed,
            request_timeout: options.request_timeout,
            tasks: vec![reader_task, writer_task],
        }))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sends a close frame. In-flight requests fail as the host acknowledges it.
    pub fn close(&self) {
        let _ = self.outbound.send(Message::Close(None));
    }
}

impl Drop for ObsWebSocketSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[async_trait]
impl RemoteSession for ObsWebSocketSession {
    async fn call(&self, request: Request) -> Result<Value, RemoteError> {
        let request_type = request.request_type();
        if self.is_closed() {
            return Err(RemoteError::Unavailable(format!(
                "connection closed; {request_type} not sent"
            )));
        }

        let request_id = Uuid::new_v4().to_string();
        let payload = request.to_payload(&request_id).map_err(|err| {
            RemoteError::Protocol(format!("failed to encode {request_type}: {err}"))
        })?;
        let text = encode_envelope(&Envelope {
            op: OpCode::Request,
            d: payload,
        })?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id.clone(), tx);
        if self.outbound.send(Message::Text(text)).is_err() {
            self.pending.lock().await.remove(&request_id);
            return Err(RemoteError::Unavailable(format!(
                "writer stopped; {request_type} not sent"
            )));
        }

        let response = match timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(RemoteError::Unavailable(format!(
                    "connection closed before {request_type} completed"
                )))
            }
            Err(_) => {
                self.pending.lock().await.remove(&request_id);
                return Err(RemoteError::Unavailable(format!(
                    "{request_type} timed out after {}ms",
                    self.request_timeout.as_millis()
                )));
            }
        };

        if !response.request_status.result {
            return Err(RemoteError::Rejected {
                request_type: response.request_type,
                code: response.request_status.code,
                comment: response.request_status.comment.unwrap_or_default(),
            });
        }
        trace!(request_type, request_id = %request_id, "obs: request completed");
        Ok(response.response_data.unwrap_or(Value::Null))
    }

    fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.events.subscribe()
    }
}

fn encode_envelope(envelope: &Envelope) -> Result<String, RemoteError> {
    serde_json::to_string(envelope)
        .map_err(|err| RemoteError::Protocol(format!("failed to encode envelope: {err}")))
}

async fn read_handshake<S, T>(
    reader: &mut S,
    expected: OpCode,
    deadline: Duration,
) -> Result<T, RemoteError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    T: DeserializeOwned,
{
    let wait = async {
        while let Some(message) = reader.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    let envelope: Envelope = serde_json::from_str(&text).map_err(|err| {
                        RemoteError::Protocol(format!("invalid handshake frame: {err}"))
                    })?;
                    if envelope.op != expected {
                        debug!(op = ?envelope.op, ?expected, "obs: skipping frame during handshake");
                        continue;
                    }
                    return envelope.payload().map_err(|err| {
                        RemoteError::Protocol(format!("invalid {expected:?} payload: {err}"))
                    });
                }
                Ok(Message::Close(Some(frame)))
                    if u16::from(frame.code) == CLOSE_AUTHENTICATION_FAILED =>
                {
                    return Err(RemoteError::Authentication(frame.reason.to_string()));
                }
                Ok(Message::Close(frame)) => {
                    let reason = frame
                        .map(|frame| frame.reason.to_string())
                        .unwrap_or_default();
                    return Err(RemoteError::Unavailable(format!(
                        "host closed the connection during handshake: {reason}"
                    )));
                }
                Ok(_) => {}
                Err(err) => {
                    return Err(RemoteError::Unavailable(format!(
                        "websocket failed during handshake: {err}"
                    )))
                }
            }
        }
        Err(RemoteError::Unavailable(
            "connection closed during handshake".to_string(),
        ))
    };
    timeout(deadline, wait).await.map_err(|_| {
        RemoteError::Unavailable(format!("timed out waiting for {expected:?}"))
    })?
}

async fn handle_inbound_text(
    text: &str,
    pending: &PendingRequests,
    events: &broadcast::Sender<Notification>,
) {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!("obs: dropping undecodable frame: {err}");
            return;
        }
    };
    match envelope.op {
        OpCode::RequestResponse => match envelope.payload::<RequestResponse>() {
            Ok(response) => {
                let waiter = pending.lock().await.remove(&response.request_id);
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(response);
                    }
                    None => debug!(
                        request_id = %response.request_id,
                        "obs: response for a request nobody awaits"
                    ),
                }
            }
            Err(err) => warn!("obs: invalid request response: {err}"),
        },
        OpCode::Event => match envelope.payload::<EventPayload>() {
            Ok(event) => {
                let event_type = event.event_type.clone();
                match Notification::from_event(event) {
                    Ok(Some(notification)) => {
                        let _ = events.send(notification);
                    }
                    Ok(None) => trace!(event_type = %event_type, "obs: unconsumed event dropped"),
                    Err(err) => warn!(event_type = %event_type, "obs: invalid event data: {err}"),
                }
            }
            Err(err) => warn!("obs: invalid event frame: {err}"),
        },
        other => debug!(op = ?other, "obs: ignoring frame"),
    }
}
