//! End-to-end behavior of the preference stores and the blur scheduler.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use homeplate::blur::{
    BlurError, BlurEvents, BlurSurface, FrameLoop, ManualFrameQueue, TokioFrames,
};
use homeplate::keys;
use homeplate::{
    AddedWidget, AddedWidgetStore, AppearancePreferences, BlurEvent, BlurScheduler, BlurState,
    ExtensionList, FileStore, InstalledExtension, KeyValueStore, MemoryStore, PermissionFlag,
    PlateColor, PlateStyle, PreferenceChangeBus, PreferenceChangeEvent, PrefsError, WidgetId,
    WidgetOrderStore,
};
use tempfile::TempDir;

fn id(s: &str) -> WidgetId {
    WidgetId::new(s).unwrap()
}

fn three_extensions() -> Arc<ExtensionList> {
    Arc::new(ExtensionList::new(vec![
        InstalledExtension::new("A", true),
        InstalledExtension::new("B", true),
        InstalledExtension::new("C", true),
    ]))
}

fn order_store(store: Arc<dyn KeyValueStore>) -> WidgetOrderStore {
    WidgetOrderStore::hydrate(store, three_extensions(), Arc::new(PreferenceChangeBus::new()))
}

#[test]
fn test_reorder_round_trips_every_permutation() {
    let orders = order_store(Arc::new(MemoryStore::new()));
    let permutations = [
        ["A", "B", "C"],
        ["A", "C", "B"],
        ["B", "A", "C"],
        ["B", "C", "A"],
        ["C", "A", "B"],
        ["C", "B", "A"],
    ];

    for permutation in permutations {
        let next: Vec<WidgetId> = permutation.iter().map(|s| id(s)).collect();
        orders.reorder(0, 2, next.clone()).unwrap();
        assert_eq!(orders.current_order(), next);
    }
}

#[test]
fn test_reorder_with_different_set_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let orders = order_store(store.clone());
    let before = orders.current_order();

    for bad in [
        vec![id("A"), id("B")],
        vec![id("A"), id("B"), id("D")],
        vec![id("A"), id("B"), id("C"), id("D")],
        vec![id("A"), id("A"), id("B")],
    ] {
        let result = orders.reorder(0, 1, bad);
        assert!(matches!(result, Err(PrefsError::InvalidOrder(_))));
        assert_eq!(orders.current_order(), before);
    }
    assert!(!store.contains(keys::WIDGET_ORDER));
}

#[test]
fn test_add_then_remove_restores_added_widgets() {
    let added = AddedWidgetStore::hydrate(
        Arc::new(MemoryStore::new()),
        three_extensions(),
        Arc::new(PreferenceChangeBus::new()),
    );
    let before = added.all();

    let provider = id("com.example/com.example.Clock");
    added.add_android_widget(provider.clone(), 42, None).unwrap();
    assert_eq!(added.len(), before.len() + 1);

    let removed = added.remove_android_widget(&provider).unwrap();
    assert_eq!(
        removed,
        vec![AddedWidget::Android {
            provider_id: provider,
            instance_id: 42
        }]
    );
    assert_eq!(added.all(), before);
}

#[test]
fn test_restart_rehydrates_identical_state() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("preferences.json");
    let provider = id("com.example/com.example.Clock");

    let (order_before, added_before) = {
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&path).unwrap());
        let orders = order_store(Arc::clone(&store));
        let added = AddedWidgetStore::hydrate(
            Arc::clone(&store),
            three_extensions(),
            Arc::new(PreferenceChangeBus::new()),
        );

        added.add_android_widget(provider.clone(), 7, None).unwrap();
        orders.append(provider.clone()).unwrap();
        orders.move_entry(3, 0).unwrap();
        (orders.current_order(), added.all())
    };

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&path).unwrap());
    let orders = order_store(Arc::clone(&store));
    let added = AddedWidgetStore::hydrate(
        store,
        three_extensions(),
        Arc::new(PreferenceChangeBus::new()),
    );

    assert_eq!(order_before[0], provider);
    assert_eq!(orders.current_order(), order_before);
    assert_eq!(added.all(), added_before);
}

#[test]
fn test_first_hydration_seeds_registry_order() {
    let orders = order_store(Arc::new(MemoryStore::new()));
    assert_eq!(orders.current_order(), vec![id("A"), id("B"), id("C")]);
}

#[test]
fn test_seed_does_not_override_customization() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    order_store(Arc::clone(&store))
        .reorder(0, 2, vec![id("C"), id("A"), id("B")])
        .unwrap();

    let registry = three_extensions();
    registry.install(InstalledExtension::new("D", true));
    let orders = WidgetOrderStore::hydrate(store, registry, Arc::new(PreferenceChangeBus::new()));
    assert_eq!(orders.current_order(), vec![id("C"), id("A"), id("B")]);
}

#[derive(Clone, Default)]
struct Surface {
    fills: Arc<Mutex<Vec<PlateColor>>>,
    blurs: Arc<AtomicUsize>,
}

impl BlurSurface for Surface {
    fn blur(&mut self, _radius: u32) -> Result<(), BlurError> {
        self.blurs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_color_filter(&mut self, _color: PlateColor) {}

    fn fill(&mut self, color: PlateColor) {
        self.fills.lock().unwrap().push(color);
    }

    fn set_rounded_corners(&mut self, _rounded: bool) {}
}

#[test]
fn test_blur_without_permission_writes_back_and_fills() {
    let store = Arc::new(MemoryStore::new());
    let appearance = Arc::new(AppearancePreferences::new(
        store.clone(),
        Arc::new(PermissionFlag::new(false)),
        Arc::new(PreferenceChangeBus::new()),
    ));
    let surface = Surface::default();
    let frames = ManualFrameQueue::new();
    let style = PlateStyle {
        color: PlateColor::from_argb(0xFF20_3040),
        blur_amount: 12,
        rounded_corners: true,
    };
    let mut scheduler = BlurScheduler::new(
        Arc::clone(&appearance),
        style,
        Box::new(surface.clone()),
        Box::new(frames.clone()),
    );
    scheduler.set_background_alpha(0x99);

    assert!(!appearance.set_blur_effect_enabled(true).unwrap());
    assert_eq!(store.get_bool(keys::BLUR_EFFECT_ENABLED).unwrap(), Some(false));

    scheduler.handle(BlurEvent::Attached);
    scheduler.handle(BlurEvent::PreferenceChanged);

    assert_eq!(scheduler.state(), BlurState::Disabled);
    assert_eq!(
        surface.fills.lock().unwrap().last(),
        Some(&PlateColor::from_argb(0x9920_3040))
    );
    assert_eq!(frames.pending(), 0);
    assert_eq!(surface.blurs.load(Ordering::SeqCst), 0);
}

#[test]
fn test_publish_reaches_every_listener_in_order() {
    let bus = PreferenceChangeBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    for n in 0..3 {
        let seen = Arc::clone(&seen);
        bus.subscribe(move |event| seen.lock().unwrap().push((n, event.clone())));
    }
    bus.try_subscribe(|_| Err("listener failed".into()));
    bus.subscribe(|_| panic!("listener panicked"));
    {
        let seen = Arc::clone(&seen);
        bus.subscribe(move |event| seen.lock().unwrap().push((3, event.clone())));
    }

    let event = PreferenceChangeEvent::WidgetOrderChanged { from: 0, to: 2 };
    let report = bus.publish(&event);

    assert_eq!(report.delivered, 4);
    assert_eq!(report.failed, 2);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            (0, event.clone()),
            (1, event.clone()),
            (2, event.clone()),
            (3, event.clone())
        ]
    );
}

#[tokio::test]
async fn test_no_ticks_after_detach() {
    let (events, rx) = BlurEvents::channel();
    let appearance = Arc::new(AppearancePreferences::new(
        Arc::new(MemoryStore::new()),
        Arc::new(PermissionFlag::new(true)),
        Arc::new(PreferenceChangeBus::new()),
    ));
    let surface = Surface::default();
    let scheduler = BlurScheduler::new(
        appearance,
        PlateStyle {
            color: PlateColor::from_argb(0x8000_0000),
            blur_amount: 20,
            rounded_corners: true,
        },
        Box::new(surface.clone()),
        Box::new(TokioFrames::new(&events)),
    );
    let frame_loop = FrameLoop::spawn(scheduler, events, rx);

    frame_loop.events().send(BlurEvent::Attached);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while surface.blurs.load(Ordering::SeqCst) < 2 {
        assert!(tokio::time::Instant::now() < deadline, "no blur ticks");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    frame_loop.events().send(BlurEvent::Detached);
    // At most one frame was in flight; give it time to arrive and be dropped
    tokio::time::sleep(Duration::from_millis(30)).await;
    let settled = surface.blurs.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(surface.blurs.load(Ordering::SeqCst), settled);

    let scheduler = frame_loop.shutdown().await.unwrap();
    assert_eq!(scheduler.state(), BlurState::Disabled);
}
