use std::sync::{Arc, Mutex};
use std::time::Duration;

use tabhost_common::{Color, Event, EventBus, SurfaceState, TabId, Topic, WindowId};
use tabhost_config::schema::FreezeConfig;
use tabhost_surface::{HeadlessHost, HeadlessSettings, LifecycleSettings, ViewLifecycleManager};

use super::{FreezeService, FreezeSettings};

const W1: WindowId = WindowId(1);
const GRACE: Duration = Duration::from_millis(30);

type Log = Arc<Mutex<Vec<Event>>>;

struct Rig {
    vlm: ViewLifecycleManager,
    host: HeadlessHost,
    freeze: FreezeService,
    log: Log,
}

fn rig(settings: FreezeSettings) -> Rig {
    let host = HeadlessHost::with_windows(
        HeadlessSettings {
            manual_loads: true,
            ..Default::default()
        },
        [W1],
    );
    let bus = EventBus::new();
    let log: Log = Arc::default();
    for topic in [Topic::TabFrozen, Topic::TabThawed] {
        let log = Arc::clone(&log);
        bus.subscribe(topic, move |e| log.lock().unwrap().push(e.clone()));
    }
    let vlm = ViewLifecycleManager::new(
        Arc::new(host.clone()),
        bus.clone(),
        LifecycleSettings::default(),
    );
    let freeze = FreezeService::new(vlm.clone(), bus, settings);
    Rig {
        vlm,
        host,
        freeze,
        log,
    }
}

fn quick() -> FreezeSettings {
    FreezeSettings {
        hidden_grace: GRACE,
        capture_timeout: Duration::from_millis(50),
        ..Default::default()
    }
}

async fn live_tab(rig: &Rig, name: &str) -> TabId {
    let tab = TabId::from(name);
    rig.vlm
        .create_surface(W1, &tab, &format!("https://{name}.test"))
        .await
        .unwrap();
    rig.host.complete_pending_loads();
    tab
}

fn frozen_events(log: &Log) -> usize {
    log.lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, Event::TabFrozen { .. }))
        .count()
}

fn thawed_events(log: &Log) -> usize {
    log.lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, Event::TabThawed { .. }))
        .count()
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..400 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[test]
fn settings_follow_config() {
    let config = FreezeConfig {
        hidden_grace_ms: 1500,
        placeholder_color: "#ff0000".into(),
        ..Default::default()
    };
    let settings = FreezeSettings::from(&config);
    assert_eq!(settings.hidden_grace, Duration::from_millis(1500));
    assert_eq!(settings.capture_timeout, Duration::from_millis(500));
    assert_eq!(settings.placeholder_color, Color::from_hex("#ff0000").unwrap());
}

#[test]
fn unparseable_color_falls_back() {
    let config = FreezeConfig {
        placeholder_color: "nope".into(),
        ..Default::default()
    };
    let settings = FreezeSettings::from(&config);
    assert_eq!(settings.placeholder_color, FreezeSettings::default().placeholder_color);
}

#[tokio::test]
async fn hidden_tab_freezes_after_grace() {
    let rig = rig(quick());
    let tab = live_tab(&rig, "a").await;
    rig.vlm.set_visible(&tab, true).await.unwrap();
    rig.vlm.set_visible(&tab, false).await.unwrap();

    wait_until(|| rig.freeze.is_frozen(&tab)).await;
    wait_until(|| rig.vlm.state(&tab) == Some(SurfaceState::Frozen)).await;
    assert_eq!(rig.host.surface_count(), 0);
    assert_eq!(frozen_events(&rig.log), 1);

    let snapshot = rig.freeze.snapshot(&tab).unwrap();
    assert!(!snapshot.placeholder);
    assert!(snapshot.data_uri.starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn showing_again_cancels_the_grace_timer() {
    let rig = rig(quick());
    let tab = live_tab(&rig, "a").await;
    rig.vlm.set_visible(&tab, true).await.unwrap();
    rig.vlm.set_visible(&tab, false).await.unwrap();
    rig.vlm.set_visible(&tab, true).await.unwrap();

    tokio::time::sleep(GRACE * 4).await;
    assert!(!rig.freeze.is_frozen(&tab));
    assert_eq!(rig.vlm.state(&tab), Some(SurfaceState::Live));
}

#[tokio::test]
async fn disabled_service_never_freezes_on_its_own() {
    let rig = rig(FreezeSettings {
        enabled: false,
        ..quick()
    });
    let tab = live_tab(&rig, "a").await;
    rig.vlm.set_visible(&tab, true).await.unwrap();
    rig.vlm.set_visible(&tab, false).await.unwrap();

    tokio::time::sleep(GRACE * 4).await;
    assert!(!rig.freeze.is_frozen(&tab));
}

#[tokio::test]
async fn failed_capture_uses_placeholder() {
    let rig = rig(FreezeSettings {
        placeholder_size: (8, 4),
        ..quick()
    });
    let tab = live_tab(&rig, "a").await;
    rig.host.set_capture_failure(true);

    rig.freeze.freeze_now(&tab).await.unwrap();

    let snapshot = rig.freeze.snapshot(&tab).unwrap();
    assert!(snapshot.placeholder);
    let png = rig.freeze.snapshot_png(&tab).unwrap();
    let img = image::load_from_memory(&png).unwrap();
    assert_eq!((img.width(), img.height()), (8, 4));
}

#[tokio::test]
async fn slow_capture_times_out_to_placeholder() {
    let rig = rig(quick());
    let tab = live_tab(&rig, "a").await;
    rig.host.set_capture_delay(Duration::from_millis(500));

    rig.freeze.freeze_now(&tab).await.unwrap();

    assert!(rig.freeze.snapshot(&tab).unwrap().placeholder);
    assert_eq!(rig.vlm.state(&tab), Some(SurfaceState::Frozen));
}

#[tokio::test]
async fn freezing_without_a_surface_fails() {
    let rig = rig(quick());
    let err = rig.freeze.freeze_now(&TabId::from("ghost")).await.unwrap_err();
    assert_eq!(err.kind(), "no_such_surface");
    assert_eq!(rig.freeze.frozen_count(), 0);
}

#[tokio::test]
async fn thaw_completes_only_after_load_finishes() {
    let rig = rig(quick());
    let tab = live_tab(&rig, "a").await;
    rig.freeze.freeze_now(&tab).await.unwrap();

    rig.freeze.thaw_now(&tab).await.unwrap();
    assert_eq!(rig.vlm.state(&tab), Some(SurfaceState::Live));
    assert!(rig.freeze.is_frozen(&tab));
    assert!(rig.freeze.is_thawing(&tab));
    assert_eq!(thawed_events(&rig.log), 0);

    assert_eq!(rig.host.complete_pending_loads(), 1);
    wait_until(|| !rig.freeze.is_frozen(&tab)).await;
    assert_eq!(thawed_events(&rig.log), 1);
    assert_eq!(rig.host.surface_count(), 1);
}

#[tokio::test]
async fn thaw_of_a_live_tab_is_not_found() {
    let rig = rig(quick());
    let tab = live_tab(&rig, "a").await;
    let err = rig.freeze.thaw_now(&tab).await.unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn showing_a_frozen_tab_thaws_it() {
    let rig = rig(quick());
    let tab = live_tab(&rig, "a").await;
    rig.freeze.freeze_now(&tab).await.unwrap();

    rig.vlm.set_visible(&tab, true).await.unwrap();
    wait_until(|| rig.vlm.state(&tab) == Some(SurfaceState::Live)).await;
    rig.host.complete_pending_loads();
    wait_until(|| !rig.freeze.is_frozen(&tab)).await;
}

#[tokio::test]
async fn closed_tab_drops_its_snapshot() {
    let rig = rig(quick());
    let tab = live_tab(&rig, "a").await;
    rig.freeze.freeze_now(&tab).await.unwrap();
    assert_eq!(rig.freeze.frozen_count(), 1);

    rig.vlm.bus().publish(Event::TabClosed {
        tab_id: tab.clone(),
        window_id: W1,
    });
    wait_until(|| rig.freeze.frozen_count() == 0).await;
}

#[tokio::test]
async fn shutdown_stops_requests() {
    let rig = rig(quick());
    let tab = live_tab(&rig, "a").await;
    rig.freeze.shutdown();
    tokio::task::yield_now().await;
    assert!(rig.freeze.freeze_now(&tab).await.is_err());
}
