use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tabhost_common::{
    DisplayMode, Event, EventBus, OrchestratorError, SnapshotRef, SurfaceState, TabId, Topic,
    WindowId,
};
use tabhost_surface::{HeadlessHost, HeadlessSettings, LifecycleSettings, ViewLifecycleManager};
use tokio::sync::mpsc;

use crate::protocol::UiEvent;

use super::{Applied, StateSynchronizer, TabCommand, WindowSnapshot};

const W1: WindowId = WindowId(1);
const W2: WindowId = WindowId(2);
const DEBOUNCE: Duration = Duration::from_millis(20);

struct Rig {
    sync: StateSynchronizer,
    vlm: ViewLifecycleManager,
    host: HeadlessHost,
    ui: mpsc::UnboundedReceiver<UiEvent>,
    bus: EventBus,
}

fn rig_with(max_live_surfaces: usize) -> Rig {
    let host = HeadlessHost::with_windows(
        HeadlessSettings {
            manual_loads: true,
            ..Default::default()
        },
        [W1, W2],
    );
    let bus = EventBus::new();
    let vlm = ViewLifecycleManager::new(
        Arc::new(host.clone()),
        bus.clone(),
        LifecycleSettings {
            destroy_debounce: DEBOUNCE,
            max_live_surfaces,
        },
    );
    let sync = StateSynchronizer::new(vlm.clone(), bus.clone());
    let (tx, ui) = mpsc::unbounded_channel();
    sync.attach_ui(tx);
    Rig {
        sync,
        vlm,
        host,
        ui,
        bus,
    }
}

fn rig() -> Rig {
    rig_with(0)
}

async fn create(rig: &Rig, window_id: WindowId, url: &str) -> TabId {
    match rig
        .sync
        .apply_command(TabCommand::CreateTab {
            window_id,
            url: url.into(),
        })
        .await
        .unwrap()
    {
        Applied::Created(tab_id) => tab_id,
        Applied::Done => panic!("create returned no tab"),
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

fn last_snapshot(events: &[UiEvent], window_id: WindowId) -> Option<WindowSnapshot> {
    events.iter().rev().find_map(|e| match e {
        UiEvent::WindowStateChanged { window_id: w, snapshot } if *w == window_id => {
            Some(snapshot.clone())
        }
        _ => None,
    })
}

fn record(bus: &EventBus, topic: Topic) -> Arc<Mutex<Vec<Event>>> {
    let log: Arc<Mutex<Vec<Event>>> = Arc::default();
    let sink = Arc::clone(&log);
    bus.subscribe(topic, move |e| sink.lock().unwrap().push(e.clone()));
    log
}

fn assert_active_is_member(snapshot: &WindowSnapshot) {
    if let Some(active) = &snapshot.active_tab_id {
        assert!(snapshot.tab_ids().contains(active));
    }
}

#[tokio::test]
async fn create_tab_pushes_state_and_goes_live() {
    let mut rig = rig();
    let a = create(&rig, W1, "https://a.test").await;

    let state = rig.sync.get_state(W1).unwrap();
    assert_eq!(state.tab_ids(), vec![a.clone()]);
    assert_eq!(state.active_tab_id.as_ref(), Some(&a));
    let tab = state.tab(&a).unwrap();
    assert_eq!(tab.lifecycle, SurfaceState::Live);
    assert!(tab.is_loading);
    assert!(rig.vlm.is_visible(&a));

    let events = drain(&mut rig.ui);
    assert!(events
        .iter()
        .any(|e| matches!(e, UiEvent::TabCreated { tab_id, .. } if *tab_id == a)));

    rig.host.complete_pending_loads();
    let tab = rig.sync.tab(&a).unwrap();
    assert!(!tab.is_loading);
    assert_eq!(tab.title, "a.test");
}

#[tokio::test]
async fn create_in_unknown_window_leaves_no_trace() {
    let rig = rig();
    let err = rig
        .sync
        .apply_command(TabCommand::CreateTab {
            window_id: WindowId(9),
            url: "https://a.test".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidWindow(WindowId(9))));
    assert!(rig.sync.get_state(WindowId(9)).is_none());
    assert_eq!(rig.sync.tab_count(), 0);
}

#[tokio::test]
async fn switch_active_tab_swaps_visibility() {
    let mut rig = rig();
    let a = create(&rig, W1, "https://a.test").await;
    let b = create(&rig, W1, "https://b.test").await;
    rig.sync
        .apply_command(TabCommand::SwitchActiveTab {
            window_id: W1,
            tab_id: a.clone(),
        })
        .await
        .unwrap();
    drain(&mut rig.ui);

    let b_loading = rig.sync.tab(&b).unwrap().is_loading;
    rig.sync
        .apply_command(TabCommand::SwitchActiveTab {
            window_id: W1,
            tab_id: b.clone(),
        })
        .await
        .unwrap();

    let events = drain(&mut rig.ui);
    let snapshot = last_snapshot(&events, W1).unwrap();
    assert_eq!(snapshot.active_tab_id.as_ref(), Some(&b));
    assert_eq!(snapshot.tab(&a).unwrap().display_mode, DisplayMode::Live);
    assert_eq!(snapshot.tab(&b).unwrap().is_loading, b_loading);
    assert!(rig.vlm.is_visible(&b));
    assert!(!rig.vlm.is_visible(&a));
    assert_eq!(rig.vlm.z_order(W1).last(), Some(&b));
}

#[tokio::test]
async fn switch_to_unknown_tab_is_not_found() {
    let rig = rig();
    create(&rig, W1, "https://a.test").await;
    let err = rig
        .sync
        .apply_command(TabCommand::SwitchActiveTab {
            window_id: W1,
            tab_id: TabId::from("ghost"),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");

    let err = rig
        .sync
        .apply_command(TabCommand::SwitchActiveTab {
            window_id: W2,
            tab_id: TabId::from("ghost"),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn closing_active_tab_activates_right_neighbour() {
    let rig = rig();
    let a = create(&rig, W1, "https://a.test").await;
    let b = create(&rig, W1, "https://b.test").await;
    let c = create(&rig, W1, "https://c.test").await;
    rig.sync
        .apply_command(TabCommand::SwitchActiveTab {
            window_id: W1,
            tab_id: b.clone(),
        })
        .await
        .unwrap();

    rig.sync
        .apply_command(TabCommand::CloseTab { tab_id: b.clone() })
        .await
        .unwrap();

    let state = rig.sync.get_state(W1).unwrap();
    assert_eq!(state.tab_ids(), vec![a, c.clone()]);
    assert_eq!(state.active_tab_id, Some(c.clone()));
    assert!(rig.vlm.is_visible(&c));
    assert!(rig.sync.window_of_tab(&b).is_none());
}

#[tokio::test]
async fn closing_last_tab_closes_the_window() {
    let mut rig = rig();
    let a = create(&rig, W1, "https://a.test").await;
    let closed = record(&rig.bus, Topic::WindowClosed);
    drain(&mut rig.ui);

    rig.sync
        .apply_command(TabCommand::CloseTab { tab_id: a.clone() })
        .await
        .unwrap();

    assert!(rig.sync.get_state(W1).is_none());
    assert!(rig.sync.window_ids().is_empty());
    let events = drain(&mut rig.ui);
    assert!(events
        .iter()
        .any(|e| matches!(e, UiEvent::WindowClosed { window_id } if *window_id == W1)));
    assert_eq!(closed.lock().unwrap().len(), 1);

    tokio::time::sleep(DEBOUNCE * 5).await;
    assert_eq!(rig.host.surface_count(), 0);
    assert_eq!(rig.vlm.state(&a), None);
}

#[tokio::test]
async fn closing_twice_is_not_found() {
    let rig = rig();
    let a = create(&rig, W1, "https://a.test").await;
    create(&rig, W1, "https://b.test").await;
    rig.sync
        .apply_command(TabCommand::CloseTab { tab_id: a.clone() })
        .await
        .unwrap();
    let err = rig
        .sync
        .apply_command(TabCommand::CloseTab { tab_id: a })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn reorder_moves_within_the_strip() {
    let rig = rig();
    let a = create(&rig, W1, "https://a.test").await;
    let b = create(&rig, W1, "https://b.test").await;
    let c = create(&rig, W1, "https://c.test").await;

    rig.sync
        .apply_command(TabCommand::ReorderTab {
            tab_id: c.clone(),
            index: 0,
        })
        .await
        .unwrap();

    let state = rig.sync.get_state(W1).unwrap();
    assert_eq!(state.tab_ids(), vec![c.clone(), a, b]);
    assert_eq!(state.active_tab_id, Some(c));
}

#[tokio::test]
async fn close_window_releases_every_tab() {
    let rig = rig();
    let a = create(&rig, W1, "https://a.test").await;
    let b = create(&rig, W1, "https://b.test").await;
    let other = create(&rig, W2, "https://c.test").await;
    let closed = record(&rig.bus, Topic::TabClosed);

    rig.sync
        .apply_command(TabCommand::CloseWindow { window_id: W1 })
        .await
        .unwrap();

    assert!(rig.sync.get_state(W1).is_none());
    assert!(rig.sync.window_of_tab(&a).is_none());
    assert!(rig.sync.window_of_tab(&b).is_none());
    assert_eq!(rig.sync.window_of_tab(&other), Some(W2));
    assert_eq!(closed.lock().unwrap().len(), 2);

    tokio::time::sleep(DEBOUNCE * 5).await;
    assert_eq!(rig.host.surfaces_in(W1), 0);
    assert_eq!(rig.host.surfaces_in(W2), 1);
}

#[tokio::test]
async fn exhausted_host_leaves_tab_in_error_state() {
    let rig = rig_with(1);
    let a = create(&rig, W1, "https://a.test").await;

    let err = rig
        .sync
        .apply_command(TabCommand::CreateTab {
            window_id: W1,
            url: "https://b.test".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::ResourceExhausted(_)));

    let state = rig.sync.get_state(W1).unwrap();
    assert_eq!(state.tabs.len(), 2);
    let failed = state.tabs.iter().find(|t| t.tab_id != a).unwrap();
    assert!(failed.error.is_some());
    assert!(!failed.is_loading);
    assert_eq!(state.active_tab_id.as_ref(), Some(&failed.tab_id));
    assert!(!rig.vlm.is_visible(&a));
    assert_eq!(rig.host.surface_count(), 1);
}

#[tokio::test]
async fn version_grows_with_every_push() {
    let mut rig = rig();
    create(&rig, W1, "https://a.test").await;
    create(&rig, W1, "https://b.test").await;
    rig.host.complete_pending_loads();

    let versions: Vec<u64> = drain(&mut rig.ui)
        .into_iter()
        .filter_map(|e| match e {
            UiEvent::WindowStateChanged { snapshot, .. } => Some(snapshot.version),
            _ => None,
        })
        .collect();
    assert!(versions.len() > 2);
    assert!(versions.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn every_push_keeps_active_tab_in_the_list() {
    let mut rig = rig();
    let a = create(&rig, W1, "https://a.test").await;
    let b = create(&rig, W1, "https://b.test").await;
    rig.sync
        .apply_command(TabCommand::CloseTab { tab_id: b })
        .await
        .unwrap();
    rig.sync
        .apply_command(TabCommand::ReorderTab { tab_id: a, index: 3 })
        .await
        .unwrap();

    for event in drain(&mut rig.ui) {
        if let UiEvent::WindowStateChanged { snapshot, .. } = event {
            assert_active_is_member(&snapshot);
        }
    }
}

#[tokio::test]
async fn listeners_receive_snapshots_and_survive_panics() {
    let rig = rig();
    let seen = Arc::new(Mutex::new(Vec::new()));
    rig.sync.subscribe(W1, |_| panic!("listener bug"));
    let sink = Arc::clone(&seen);
    let id = rig
        .sync
        .subscribe(W1, move |s| sink.lock().unwrap().push(s.version));

    create(&rig, W1, "https://a.test").await;
    let count = seen.lock().unwrap().len();
    assert!(count > 0);

    assert!(rig.sync.unsubscribe(W1, id));
    assert!(!rig.sync.unsubscribe(W1, id));
    create(&rig, W1, "https://b.test").await;
    assert_eq!(seen.lock().unwrap().len(), count);
}

#[tokio::test]
async fn frozen_and_thawed_events_flip_display_mode() {
    let rig = rig();
    let a = create(&rig, W1, "https://a.test").await;

    rig.bus.publish(Event::TabFrozen {
        tab_id: a.clone(),
        snapshot: SnapshotRef {
            captured_at: Utc::now(),
            placeholder: true,
            data_uri: "data:image/png;base64,AA==".into(),
        },
    });
    let tab = rig.sync.tab(&a).unwrap();
    assert_eq!(tab.display_mode, DisplayMode::Frozen);
    assert!(tab.snapshot.is_some());

    rig.bus.publish(Event::TabThawed { tab_id: a.clone() });
    let tab = rig.sync.tab(&a).unwrap();
    assert_eq!(tab.display_mode, DisplayMode::Live);
    assert!(tab.snapshot.is_none());
}

#[tokio::test]
async fn activating_a_frozen_tab_asks_for_its_surface() {
    let rig = rig();
    let a = create(&rig, W1, "https://a.test").await;
    create(&rig, W1, "https://b.test").await;
    rig.bus.publish(Event::TabFrozen {
        tab_id: a.clone(),
        snapshot: SnapshotRef {
            captured_at: Utc::now(),
            placeholder: false,
            data_uri: "data:image/png;base64,AA==".into(),
        },
    });
    let needed = record(&rig.bus, Topic::SurfaceNeeded);

    rig.sync
        .apply_command(TabCommand::SwitchActiveTab {
            window_id: W1,
            tab_id: a.clone(),
        })
        .await
        .unwrap();

    let needed = needed.lock().unwrap();
    assert_eq!(needed.len(), 1);
    assert!(matches!(
        &needed[0],
        Event::SurfaceNeeded { tab_id, window_id, url }
            if *tab_id == a && *window_id == W1 && url == "https://a.test"
    ));
}

#[tokio::test]
async fn commit_transfer_moves_record_atomically() {
    let rig = rig();
    let a = create(&rig, W1, "https://a.test").await;
    let b = create(&rig, W2, "https://b.test").await;
    let marked = record(&rig.bus, Topic::WindowMarkedForClosure);

    let (source, target) = rig.sync.lease_pair(W1, W2).await.unwrap();
    let commit = rig
        .sync
        .commit_transfer(&a, &source, &target, Some(0))
        .unwrap();
    drop((source, target));

    assert!(commit.source_was_active);
    assert!(commit.source_emptied);
    assert_eq!(commit.target_previous_active, Some(b.clone()));

    let w1 = rig.sync.get_state(W1).unwrap();
    assert!(w1.tabs.is_empty());
    assert!(w1.marked_for_closure);
    assert_eq!(w1.active_tab_id, None);

    let w2 = rig.sync.get_state(W2).unwrap();
    assert_eq!(w2.tab_ids(), vec![a.clone(), b]);
    assert_eq!(w2.active_tab_id, Some(a.clone()));
    assert_eq!(w2.tab(&a).unwrap().window_id, W2);
    assert_eq!(rig.sync.window_of_tab(&a), Some(W2));
    assert_eq!(marked.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn lease_pair_without_source_discards_fresh_target() {
    let rig = rig();
    assert!(rig.sync.lease_pair(W2, W1).await.is_none());
    assert!(rig.sync.get_state(W1).is_none());
}

#[tokio::test]
async fn creating_in_marked_window_clears_the_mark() {
    let rig = rig();
    let a = create(&rig, W1, "https://a.test").await;
    create(&rig, W2, "https://b.test").await;
    {
        let (source, target) = rig.sync.lease_pair(W1, W2).await.unwrap();
        rig.sync.commit_transfer(&a, &source, &target, None).unwrap();
    }
    assert!(rig.sync.get_state(W1).unwrap().marked_for_closure);

    create(&rig, W1, "https://c.test").await;
    assert!(!rig.sync.get_state(W1).unwrap().marked_for_closure);
}

#[tokio::test]
async fn shutdown_stops_folding() {
    let rig = rig();
    let a = create(&rig, W1, "https://a.test").await;
    rig.sync.shutdown();
    rig.host.complete_pending_loads();
    assert!(rig.sync.tab(&a).unwrap().is_loading);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_commands_leave_window_consistent() {
    let mut rig = rig();
    let mut tabs = Vec::new();
    for url in ["https://a.test", "https://b.test", "https://c.test", "https://d.test"] {
        tabs.push(create(&rig, W1, url).await);
    }
    drain(&mut rig.ui);

    let mut tasks = Vec::new();
    for round in 0..40usize {
        let sync = rig.sync.clone();
        let tab_id = tabs[round % tabs.len()].clone();
        tasks.push(tokio::spawn(async move {
            let command = if round % 3 == 0 {
                TabCommand::ReorderTab {
                    tab_id,
                    index: round % 5,
                }
            } else {
                TabCommand::SwitchActiveTab {
                    window_id: W1,
                    tab_id,
                }
            };
            sync.apply_command(command).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let state = rig.sync.get_state(W1).unwrap();
    let mut order = state.tab_ids();
    order.sort();
    let mut expected = tabs.clone();
    expected.sort();
    assert_eq!(order, expected, "no tab lost or duplicated");

    let active = state.active_tab_id.clone().unwrap();
    assert!(state.tab_ids().contains(&active));
    let visible: Vec<&TabId> = tabs.iter().filter(|t| rig.vlm.is_visible(t)).collect();
    assert_eq!(visible, vec![&active], "only the active tab is shown");

    let newest = drain(&mut rig.ui)
        .into_iter()
        .filter_map(|e| match e {
            UiEvent::WindowStateChanged { snapshot, .. } => Some(snapshot),
            _ => None,
        })
        .max_by_key(|s| s.version)
        .unwrap();
    assert_eq!(newest.version, state.version);
    assert_eq!(newest.active_tab_id, state.active_tab_id);
    assert_eq!(newest.tab_ids(), state.tab_ids());
}

#[tokio::test]
async fn queued_switches_resolve_last_writer_wins() {
    let rig = rig();
    let a = create(&rig, W1, "https://a.test").await;
    let b = create(&rig, W1, "https://b.test").await;
    let c = create(&rig, W1, "https://c.test").await;

    // Hold the window so every switch has to queue behind it.
    let lease = rig.sync.lease(W1).await.unwrap();
    let mut tasks = Vec::new();
    for target in [&a, &c, &b, &a, &c] {
        let sync = rig.sync.clone();
        let tab_id = target.clone();
        tasks.push(tokio::spawn(async move {
            sync.apply_command(TabCommand::SwitchActiveTab {
                window_id: W1,
                tab_id,
            })
            .await
        }));
        tokio::task::yield_now().await;
    }
    assert_eq!(rig.sync.get_state(W1).unwrap().active_tab_id, Some(c.clone()));
    drop(lease);

    for task in tasks {
        task.await.unwrap().unwrap();
    }
    let state = rig.sync.get_state(W1).unwrap();
    assert_eq!(state.active_tab_id, Some(c.clone()));
    assert_eq!(state.tab_ids(), vec![a.clone(), b.clone(), c.clone()]);
    assert!(rig.vlm.is_visible(&c));
    assert!(!rig.vlm.is_visible(&a));
    assert!(!rig.vlm.is_visible(&b));
}
