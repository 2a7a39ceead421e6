use super::*;
use crate::{
    config::{PanelConfig, PROFILE_REALM},
    test_support::FakeHost,
};
use serde_json::json;
use shared::{error::RemoteError, protocol::Request};

async fn sequencer_for(host: &Arc<FakeHost>, jingle_enabled: bool) -> MacroSequencer {
    let config = PanelConfig {
        jingle_enabled,
        ..PanelConfig::default()
    };
    let surface = Arc::new(ControlSurface::new(host.session(), &config));
    surface.seed().await.expect("seed");
    host.clear_requests().await;
    MacroSequencer::new(surface)
}

async fn finished(run: MacroRun) -> MacroReport {
    match run {
        MacroRun::Finished(report) => report,
        MacroRun::Spawned(handle) => handle.await.expect("macro task"),
    }
}

fn screenshare() -> SceneName {
    SceneName::new("Screenshare")
}

#[tokio::test]
async fn break_mutes_hides_pip_and_remembers_its_size() {
    let host = FakeHost::new();
    let sequencer = sequencer_for(&host, false).await;

    let report = finished(sequencer.run_break().await.expect("break")).await;

    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.completed_steps, 5);
    {
        let state = host.state.lock().await;
        assert_eq!(state.muted.get("Instructors"), Some(&true));
        assert_eq!(state.muted.get("BroadcasterMic"), Some(&true));
        assert_eq!(state.program_scene, SceneName::new("Notes"));
        assert_eq!(
            state
                .persistent
                .get(&(PROFILE_REALM.to_string(), "pip_last_state".to_string())),
            Some(&json!(0.25))
        );
    }
    assert_eq!(host.scale_in("ScreenshareCrop").await, 0.0);
    assert_eq!(sequencer.surface.pip().last_saved_scale().await, 0.25);
}

#[tokio::test]
async fn return_without_jingle_goes_straight_back() {
    let host = FakeHost::new();
    let sequencer = sequencer_for(&host, false).await;
    finished(sequencer.run_break().await.expect("break")).await;
    host.clear_requests().await;

    let report = finished(sequencer.run_return(&screenshare()).await.expect("return")).await;

    assert!(report.is_success(), "{report:?}");
    assert_eq!(host.state.lock().await.program_scene, screenshare());
    assert_eq!(host.scale_in("Notes").await, 0.25);
    assert_eq!(host.state.lock().await.muted.get("BroadcasterMic"), Some(&true));
    assert!(!host
        .mutations()
        .await
        .iter()
        .any(|request| matches!(request, Request::SetInputSettings { .. })));
}

#[tokio::test(start_paused = true)]
async fn return_with_jingle_waits_before_switching() {
    let host = FakeHost::new();
    let sequencer = sequencer_for(&host, true).await;
    finished(sequencer.run_break().await.expect("break")).await;

    let run = sequencer.run_return(&screenshare()).await.expect("return");
    sequencer.surface.set_jingle_enabled(false);
    tokio::time::sleep(Duration::from_secs(1)).await;
    {
        let state = host.state.lock().await;
        assert_eq!(state.muted.get("Instructors"), Some(&false));
        assert_eq!(
            state.input_settings.get("CRaudio"),
            Some(&json!({"local_file": "CR_LOGO_sound_short.mp3"}))
        );
        assert_eq!(state.program_scene, SceneName::new("Notes"));
    }

    let report = finished(run).await;
    assert!(report.is_success(), "{report:?}");
    assert_eq!(host.state.lock().await.program_scene, screenshare());
    assert_eq!(sequencer.surface.pip().scale().await, 0.25);
}

#[tokio::test(start_paused = true)]
async fn the_same_macro_never_runs_twice_at_once() {
    let host = FakeHost::new();
    let sequencer = sequencer_for(&host, true).await;

    let first = sequencer.run_return(&screenshare()).await.expect("first");
    assert!(sequencer.is_running("return:Screenshare"));
    assert!(matches!(
        sequencer.run_return(&screenshare()).await,
        Err(ControlError::MacroInFlight(name)) if name == "return:Screenshare"
    ));

    let other = sequencer
        .run_return(&SceneName::new("Notes"))
        .await
        .expect("different macro");
    finished(first).await;
    finished(other).await;

    assert!(!sequencer.is_running("return:Screenshare"));
    assert!(sequencer.run_return(&screenshare()).await.is_ok());
}

#[tokio::test]
async fn host_outage_aborts_the_sequence() {
    let host = FakeHost::new();
    let sequencer = sequencer_for(&host, false).await;
    let mut events = sequencer.surface.subscribe();
    host.fail(
        "SetCurrentProgramScene",
        None,
        RemoteError::Unavailable("request timed out".into()),
    )
    .await;

    let report = finished(sequencer.run_break().await.expect("break")).await;

    assert!(!report.is_success());
    assert_eq!(report.completed_steps, 2);
    assert_eq!(host.scale_in("Notes").await, 0.25);
    assert!(!host
        .mutations()
        .await
        .iter()
        .any(|request| matches!(request, Request::SetSceneItemTransform { .. })));

    let mut saw_error = false;
    let mut finished_report = None;
    while let Ok(event) = events.try_recv() {
        match event {
            ControlEvent::Error(_) => saw_error = true,
            ControlEvent::MacroFinished(report) => finished_report = Some(report),
            _ => {}
        }
    }
    assert!(saw_error);
    assert_eq!(finished_report, Some(report));
}

#[tokio::test]
async fn partial_pip_failure_is_a_warning() {
    let host = FakeHost::new();
    let sequencer = sequencer_for(&host, false).await;
    host.fail(
        "SetSceneItemTransform",
        Some("Broadcaster-Screen"),
        RemoteError::Rejected {
            request_type: "SetSceneItemTransform".into(),
            code: 600,
            comment: "no such scene item".into(),
        },
    )
    .await;

    let report = finished(sequencer.run_break().await.expect("break")).await;

    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.completed_steps, 5);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(host.scale_in("Screenshare").await, 0.0);
}

#[tokio::test]
async fn snapshot_steps_only_accept_the_pip() {
    let host = FakeHost::new();
    let sequencer = sequencer_for(&host, false).await;
    let custom = Macro {
        name: "odd".into(),
        steps: vec![
            MacroStep::SaveSnapshot(EntityKey::volume(&InputName::new("Instructors"))),
            MacroStep::SetPip(0.5),
        ],
        mode: ExecutionMode::Inline,
    };

    let report = finished(sequencer.run(custom).await.expect("run")).await;

    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.completed_steps, 2);
    assert_eq!(host.scale_in("Notes").await, 0.5);
}
