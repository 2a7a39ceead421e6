use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use obs_client::RemoteSession;
use shared::{
    domain::{EntityKey, InputName},
    error::ControlError,
    protocol::MediaState,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{
    config::CueSpec,
    events::EventSink,
    presentation::{ColorClass, Presentable, Presentation, PresentedValue},
};

pub const PLACEHOLDER: &str = "-";

fn mmss(seconds: i64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// `-remaining/total`, both as `m:ss`.
pub fn format_countdown(duration_ms: i64, cursor_ms: i64) -> String {
    let remaining = (duration_ms - cursor_ms).max(0) / 1000;
    format!("-{}/{}", mmss(remaining), mmss(duration_ms.max(0) / 1000))
}

/// Plays configured audio cues through one media input.
pub struct CuePlayer {
    session: Arc<dyn RemoteSession>,
    input: InputName,
    cues: Vec<CueSpec>,
}

impl CuePlayer {
    pub fn new(session: Arc<dyn RemoteSession>, input: InputName, cues: Vec<CueSpec>) -> Self {
        Self {
            session,
            input,
            cues,
        }
    }

    pub fn cues(&self) -> &[CueSpec] {
        &self.cues
    }

    pub async fn play(&self, label: &str) -> Result<(), ControlError> {
        let cue = self
            .cues
            .iter()
            .find(|cue| cue.label == label)
            .ok_or_else(|| ControlError::unknown("cue", label))?;
        info!(cue = label, file = %cue.file, input = %self.input, "playback: starting cue");
        self.session.play_media(&self.input, &cue.file).await?;
        Ok(())
    }

    pub async fn stop(&self) -> Result<(), ControlError> {
        info!(input = %self.input, "playback: stopping");
        self.session.stop_media(&self.input).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Rendered(String),
    /// Not playing yet (opening, buffering, paused, or duration unknown); poll again.
    Pending,
    Stopped,
}

struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Countdown of the playback input. The host pushes no per-tick updates, so while something
/// plays the status is re-read on a fixed interval.
pub struct PlaybackTimer {
    session: Arc<dyn RemoteSession>,
    events: EventSink,
    input: InputName,
    key: EntityKey,
    interval: Duration,
    display: RwLock<String>,
    running: Arc<AtomicBool>,
    /// Set by every restart; a poll that started before it may report a stale state.
    restart_requested: AtomicBool,
}

impl PlaybackTimer {
    pub fn new(
        session: Arc<dyn RemoteSession>,
        events: EventSink,
        input: InputName,
        interval: Duration,
    ) -> Self {
        Self {
            session,
            events,
            key: EntityKey::playback(&input),
            input,
            interval,
            display: RwLock::new(PLACEHOLDER.to_string()),
            running: Arc::new(AtomicBool::new(false)),
            restart_requested: AtomicBool::new(false),
        }
    }

    pub fn input(&self) -> &InputName {
        &self.input
    }

    pub async fn display(&self) -> String {
        self.display.read().await.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn poll_once(&self) -> PollOutcome {
        let status = match self.session.get_media_input_status(&self.input).await {
            Ok(status) => status,
            Err(err) => {
                warn!(input = %self.input, "playback: status failed: {err}");
                self.render(PLACEHOLDER.to_string()).await;
                return PollOutcome::Stopped;
            }
        };

        match status.media_state {
            state if state.is_transient() => {
                debug!(input = %self.input, ?state, "playback: waiting");
                PollOutcome::Pending
            }
            MediaState::Playing => match status.media_duration {
                Some(duration) if duration >= 0 => {
                    let text = format_countdown(duration, status.media_cursor.unwrap_or(0));
                    self.render(text.clone()).await;
                    PollOutcome::Rendered(text)
                }
                _ => PollOutcome::Pending,
            },
            state => {
                debug!(input = %self.input, ?state, "playback: not playing");
                self.render(PLACEHOLDER.to_string()).await;
                PollOutcome::Stopped
            }
        }
    }

    /// Starts the poll loop unless one is already running. Returns whether a loop was started.
    /// A running loop is told to keep polling past a stopped state it may have read before
    /// the new playback began.
    pub fn restart(self: &Arc<Self>) -> bool {
        self.restart_requested.store(true, Ordering::SeqCst);
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(input = %self.input, "playback: poll already running");
            return false;
        }
        let guard = RunningGuard(Arc::clone(&self.running));
        let timer = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            loop {
                timer.restart_requested.store(false, Ordering::SeqCst);
                if timer.poll_once().await == PollOutcome::Stopped && timer.release() {
                    break;
                }
                tokio::time::sleep(timer.interval).await;
            }
        });
        true
    }

    /// Gives up the loop after a stopped poll, unless a restart came in meanwhile. Returns
    /// whether the loop should exit.
    fn release(&self) -> bool {
        if self.restart_requested.load(Ordering::SeqCst) {
            debug!(input = %self.input, "playback: restarted while polling");
            return false;
        }
        self.running.store(false, Ordering::SeqCst);
        // A restart that saw the loop still running must not be lost.
        !(self.restart_requested.load(Ordering::SeqCst)
            && self
                .running
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok())
    }

    async fn render(&self, text: String) {
        {
            let mut display = self.display.write().await;
            if *display == text {
                return;
            }
            *display = text;
        }
        self.events.presentations(self.presentations().await);
    }
}

#[async_trait]
impl Presentable for PlaybackTimer {
    fn key(&self) -> &EntityKey {
        &self.key
    }

    async fn presentations(&self) -> Vec<Presentation> {
        let text = self.display().await;
        let color = if text == PLACEHOLDER {
            ColorClass::Neutral
        } else {
            ColorClass::Active
        };
        vec![Presentation {
            key: self.key.clone(),
            value: PresentedValue::Text(text.clone()),
            text,
            color,
        }]
    }
}

#[cfg(test)]
#[path = "tests/playback_tests.rs"]
mod tests;
