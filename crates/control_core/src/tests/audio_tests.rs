use super::*;
use crate::{config::PanelConfig, test_support::FakeHost};
use shared::{error::RemoteError, protocol::Request};

fn instructor_mute(host: &Arc<FakeHost>) -> MuteSwitch {
    let spec = PanelConfig::default()
        .mutes
        .into_iter()
        .find(|spec| spec.input.as_str() == "Instructors")
        .expect("instructor mute");
    MuteSwitch::new(host.session(), EventSink::new(), spec, Duration::from_secs(1))
}

fn fader(host: &Arc<FakeHost>) -> VolumeFader {
    VolumeFader::new(
        host.session(),
        EventSink::new(),
        InputName::new("Instructors"),
        Duration::from_secs(1),
    )
}

#[test]
fn gain_mapping_round_trips_over_the_slider_range() {
    for step in 0..=400 {
        let state = -2.0 + f64::from(step) * 0.005;
        let back = db_to_gain_state(gain_state_to_db(state));
        assert!((back - state).abs() < 1e-6, "{state} -> {back}");
    }
}

#[test]
fn gain_mapping_endpoints() {
    assert_eq!(gain_state_to_db(0.0), 0.0);
    assert!((gain_state_to_db(-2.0) + 99.0).abs() < 1e-9);
    assert!(gain_state_to_db(-1.0) < gain_state_to_db(-0.5));
}

#[test]
fn host_gain_outside_the_slider_is_clamped() {
    assert_eq!(db_to_gain_state(6.0), GAIN_STATE_MAX);
    assert_eq!(db_to_gain_state(0.5), GAIN_STATE_MAX);
    assert_eq!(db_to_gain_state(-100.0), GAIN_STATE_MIN);
    assert_eq!(db_to_gain_state(f64::NEG_INFINITY), GAIN_STATE_MIN);
    assert_eq!(db_to_gain_state(f64::NAN), GAIN_STATE_MIN);
}

#[tokio::test]
async fn mute_apply_then_echo_sends_once() {
    let host = FakeHost::new();
    let mute = instructor_mute(&host);
    mute.seed().await.expect("seed");
    host.clear_requests().await;

    mute.apply(true).await.expect("mute");
    mute.observe(true).await;

    assert!(mute.muted().await);
    assert_eq!(
        host.mutations().await,
        vec![Request::SetInputMute {
            input_name: InputName::new("Instructors"),
            input_muted: true,
        }]
    );
}

#[tokio::test]
async fn toggle_flips_and_live_mic_is_active() {
    let host = FakeHost::new();
    let mute = instructor_mute(&host);
    mute.seed().await.expect("seed");

    let live = mute.presentations().await;
    assert_eq!(live[0].color, ColorClass::Active);
    assert_eq!(live[0].text, "Instr");

    mute.toggle().await.expect("toggle");
    assert!(mute.muted().await);
    assert_eq!(mute.presentations().await[0].color, ColorClass::Neutral);
    assert_eq!(
        host.state.lock().await.muted.get("Instructors"),
        Some(&true)
    );
}

#[tokio::test]
async fn failed_mute_is_rolled_back() {
    let host = FakeHost::new();
    let mute = instructor_mute(&host);
    mute.seed().await.expect("seed");
    host.fail(
        "SetInputMute",
        Some("Instructors"),
        RemoteError::Unavailable("socket closed".into()),
    )
    .await;

    assert!(mute.apply(true).await.is_err());
    assert!(!mute.muted().await);
}

#[tokio::test]
async fn volume_is_sent_in_db() {
    let host = FakeHost::new();
    let fader = fader(&host);
    fader.seed().await.expect("seed");
    host.clear_requests().await;

    fader.apply(-1.0).await.expect("apply");
    assert_eq!(fader.db().await, -9.0);
    assert_eq!(fader.presentations().await[0].text, "-9.0 dB");
    assert_eq!(
        host.mutations().await,
        vec![Request::SetInputVolume {
            input_name: InputName::new("Instructors"),
            input_volume_db: -9.0,
        }]
    );
}

#[tokio::test]
async fn out_of_range_volume_is_never_sent() {
    let host = FakeHost::new();
    let fader = fader(&host);
    fader.seed().await.expect("seed");
    host.clear_requests().await;

    for bad in [0.5, -2.5, f64::NAN] {
        let err = fader.apply(bad).await.expect_err("rejected");
        assert!(matches!(err, ControlError::ValueOutOfRange { .. }), "{err}");
    }
    assert!(host.requests().await.is_empty());
    assert_eq!(fader.db().await, -3.0);
}

#[tokio::test]
async fn observed_volume_moves_the_slider() {
    let host = FakeHost::new();
    let fader = fader(&host);
    fader.observe(-99.0).await;
    assert!((fader.gain_state().await + 2.0).abs() < 1e-9);
    assert!(host.requests().await.is_empty());
}
