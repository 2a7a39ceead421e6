use super::*;
use crate::{config::PanelConfig, test_support::FakeHost};
use serde_json::{json, Value};
use shared::{
    error::RemoteError,
    protocol::{MediaInputStatus, Notification, Request, MEDIA_ACTION_STOP},
};
use std::sync::atomic::AtomicUsize;
use tokio::sync::broadcast;

fn timer_for(host: &Arc<FakeHost>) -> Arc<PlaybackTimer> {
    Arc::new(PlaybackTimer::new(
        host.session(),
        EventSink::new(),
        InputName::new("CRaudio"),
        Duration::from_millis(500),
    ))
}

async fn set_media(host: &FakeHost, media_state: MediaState, duration: Option<i64>, cursor: Option<i64>) {
    host.state.lock().await.media = MediaInputStatus {
        media_state,
        media_duration: duration,
        media_cursor: cursor,
    };
}

#[test]
fn countdown_shows_remaining_and_total() {
    assert_eq!(format_countdown(65_000, 5_000), "-1:00/1:05");
    assert_eq!(format_countdown(3_000, 0), "-0:03/0:03");
    assert_eq!(format_countdown(1_000, 5_000), "-0:00/0:01");
    assert_eq!(format_countdown(600_000, 599_999), "-0:00/10:00");
}

#[tokio::test]
async fn playing_media_renders_a_countdown() {
    let host = FakeHost::new();
    let timer = timer_for(&host);
    set_media(&host, MediaState::Playing, Some(30_000), Some(12_500)).await;

    assert_eq!(
        timer.poll_once().await,
        PollOutcome::Rendered("-0:17/0:30".into())
    );
    assert_eq!(timer.display().await, "-0:17/0:30");
    assert_eq!(timer.presentations().await[0].color, ColorClass::Active);
}

#[tokio::test]
async fn opening_and_unprobed_media_keep_polling() {
    let host = FakeHost::new();
    let timer = timer_for(&host);

    set_media(&host, MediaState::Opening, None, None).await;
    assert_eq!(timer.poll_once().await, PollOutcome::Pending);
    set_media(&host, MediaState::Playing, Some(-1), Some(0)).await;
    assert_eq!(timer.poll_once().await, PollOutcome::Pending);
    set_media(&host, MediaState::Paused, Some(10_000), Some(2_000)).await;
    assert_eq!(timer.poll_once().await, PollOutcome::Pending);

    assert_eq!(timer.display().await, PLACEHOLDER);
}

#[tokio::test]
async fn ended_media_or_host_error_shows_placeholder() {
    let host = FakeHost::new();
    let timer = timer_for(&host);
    set_media(&host, MediaState::Playing, Some(10_000), Some(0)).await;
    timer.poll_once().await;

    set_media(&host, MediaState::Ended, Some(10_000), Some(10_000)).await;
    assert_eq!(timer.poll_once().await, PollOutcome::Stopped);
    assert_eq!(timer.display().await, PLACEHOLDER);

    set_media(&host, MediaState::Playing, Some(10_000), Some(0)).await;
    timer.poll_once().await;
    host.fail(
        "GetMediaInputStatus",
        None,
        RemoteError::Unavailable("socket closed".into()),
    )
    .await;
    assert_eq!(timer.poll_once().await, PollOutcome::Stopped);
    assert_eq!(timer.presentations().await[0].color, ColorClass::Neutral);
}

#[tokio::test(start_paused = true)]
async fn restart_runs_a_single_loop_until_playback_stops() {
    let host = FakeHost::new();
    let timer = timer_for(&host);
    set_media(&host, MediaState::Playing, Some(65_000), Some(5_000)).await;

    assert!(timer.restart());
    assert!(!timer.restart());
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(timer.is_polling());
    assert_eq!(timer.display().await, "-1:00/1:05");

    set_media(&host, MediaState::Stopped, None, None).await;
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(!timer.is_polling());
    assert_eq!(timer.display().await, PLACEHOLDER);

    assert!(timer.restart());
}

#[tokio::test]
async fn cue_player_loads_the_file_and_stops() {
    let host = FakeHost::new();
    let config = PanelConfig::default();
    let player = CuePlayer::new(host.session(), config.playback_input.clone(), config.cues.clone());

    player.play("short").await.expect("play");
    player.stop().await.expect("stop");

    let state = host.state.lock().await;
    assert_eq!(
        state.input_settings.get("CRaudio"),
        Some(&json!({"local_file": "CR_LOGO_sound_short.mp3"}))
    );
    assert_eq!(
        state.media_actions,
        vec![(InputName::new("CRaudio"), MEDIA_ACTION_STOP.to_string())]
    );
}

#[tokio::test]
async fn unknown_cue_sends_nothing() {
    let host = FakeHost::new();
    let player = CuePlayer::new(
        host.session(),
        InputName::new("CRaudio"),
        PanelConfig::default().cues,
    );

    let err = player.play("fanfare").await.expect_err("unknown");
    assert!(matches!(err, ControlError::UnknownEntity { kind: "cue", .. }));
    assert!(host.requests().await.is_empty());
}

/// Answers the first status read late, with the state from before the new cue started.
struct StaleFirstStatus {
    calls: AtomicUsize,
    events: broadcast::Sender<Notification>,
}

#[async_trait]
impl RemoteSession for StaleFirstStatus {
    async fn call(&self, _request: Request) -> Result<Value, RemoteError> {
        let status = if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            MediaInputStatus {
                media_state: MediaState::Ended,
                media_duration: Some(10_000),
                media_cursor: Some(10_000),
            }
        } else {
            MediaInputStatus {
                media_state: MediaState::Playing,
                media_duration: Some(20_000),
                media_cursor: Some(0),
            }
        };
        serde_json::to_value(&status).map_err(|err| RemoteError::Protocol(err.to_string()))
    }

    fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.events.subscribe()
    }
}

#[tokio::test(start_paused = true)]
async fn restart_during_a_stale_status_read_keeps_polling() {
    let (events, _) = broadcast::channel(4);
    let session = Arc::new(StaleFirstStatus {
        calls: AtomicUsize::new(0),
        events,
    });
    let timer = Arc::new(PlaybackTimer::new(
        session,
        EventSink::new(),
        InputName::new("CRaudio"),
        Duration::from_millis(500),
    ));

    assert!(timer.restart());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!timer.restart());
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert!(timer.is_polling());
    assert_eq!(timer.display().await, "-0:20/0:20");
}
