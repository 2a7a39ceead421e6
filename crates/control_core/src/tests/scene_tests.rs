use super::*;
use crate::{config::PanelConfig, test_support::FakeHost};
use shared::error::RemoteError;

async fn seeded_selector(host: &Arc<FakeHost>) -> SceneSelector {
    let config = PanelConfig::default();
    let selector = SceneSelector::new(
        host.session(),
        EventSink::new(),
        config.scenes.clone(),
        config.safe_scenes.clone(),
        Duration::from_secs(1),
    );
    selector.seed().await.expect("seed");
    host.clear_requests().await;
    selector
}

fn color_of(presentations: &[Presentation], scene: &str) -> ColorClass {
    presentations
        .iter()
        .find(|p| p.key == EntityKey::scene(&SceneName::new(scene)))
        .map(|p| p.color)
        .expect("scene presented")
}

#[tokio::test]
async fn seed_adopts_the_program_scene() {
    let host = FakeHost::new();
    let selector = seeded_selector(&host).await;
    assert_eq!(selector.active().await, Some(SceneName::new("Title")));
}

#[tokio::test]
async fn unknown_scene_from_host_changes_nothing() {
    let host = FakeHost::new();
    let selector = seeded_selector(&host).await;

    selector
        .switch(&SceneName::new("NonexistentScene"), Origin::Remote)
        .await
        .expect("ignored, not an error");

    assert_eq!(selector.active().await, Some(SceneName::new("Title")));
    assert!(host.requests().await.is_empty());
}

#[tokio::test]
async fn unknown_scene_from_operator_is_reported_and_not_sent() {
    let host = FakeHost::new();
    let selector = seeded_selector(&host).await;

    let err = selector
        .switch(&SceneName::new("Backstage"), Origin::Local)
        .await
        .expect_err("unknown");
    assert!(matches!(err, ControlError::UnknownEntity { kind: "scene", .. }));
    assert!(host.requests().await.is_empty());
}

#[tokio::test]
async fn own_echo_does_not_send_again() {
    let host = FakeHost::new();
    let selector = seeded_selector(&host).await;
    let notes = SceneName::new("Notes");

    selector.switch(&notes, Origin::Local).await.expect("switch");
    selector.switch(&notes, Origin::Remote).await.expect("echo");

    assert_eq!(
        host.mutations().await,
        vec![shared::protocol::Request::SetCurrentProgramScene {
            scene_name: notes.clone()
        }]
    );
    assert_eq!(selector.active().await, Some(notes));
}

#[tokio::test]
async fn repeated_observation_is_idempotent() {
    let host = FakeHost::new();
    let selector = seeded_selector(&host).await;
    let gallery = SceneName::new("Gallery");

    selector.switch(&gallery, Origin::Remote).await.expect("first");
    let first = selector.presentations().await;
    selector.switch(&gallery, Origin::Remote).await.expect("second");

    assert_eq!(selector.presentations().await, first);
    assert!(host.requests().await.is_empty());
}

#[tokio::test]
async fn safe_scenes_get_their_own_colour() {
    let host = FakeHost::new();
    let selector = seeded_selector(&host).await;

    selector
        .switch(&SceneName::new("Screenshare"), Origin::Remote)
        .await
        .expect("switch");
    let presented = selector.presentations().await;
    assert_eq!(color_of(&presented, "Screenshare"), ColorClass::Active);
    assert_eq!(color_of(&presented, "Title"), ColorClass::Neutral);

    selector
        .switch(&SceneName::new("Notes"), Origin::Remote)
        .await
        .expect("switch");
    let presented = selector.presentations().await;
    assert_eq!(color_of(&presented, "Notes"), ColorClass::Safe);
    assert_eq!(color_of(&presented, "Screenshare"), ColorClass::Neutral);
    assert_eq!(
        presented
            .iter()
            .filter(|p| p.value == PresentedValue::Flag(true))
            .count(),
        1
    );
}

#[tokio::test]
async fn failed_switch_restores_the_previous_scene() {
    let host = FakeHost::new();
    let selector = seeded_selector(&host).await;
    host.fail(
        "SetCurrentProgramScene",
        None,
        RemoteError::Unavailable("timed out".into()),
    )
    .await;

    let err = selector
        .switch(&SceneName::new("Gallery"), Origin::Local)
        .await
        .expect_err("host down");
    assert!(matches!(err, ControlError::Remote(RemoteError::Unavailable(_))));
    assert_eq!(selector.active().await, Some(SceneName::new("Title")));
}
