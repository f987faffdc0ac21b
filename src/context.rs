//! Per-process preference context.
//!
//! One [`PreferenceContext`] binds the preference objects to a single backing
//! store. The widget and appearance preferences are created on first use and
//! shared afterwards. Every key the store reports as changed is routed to
//! their re-sync hooks, so a write made by another component (a settings
//! surface, the CLI, a file reload) is picked up instead of being masked by
//! a stale cache.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use once_cell::sync::OnceCell;

use crate::appearance::AppearancePreferences;
use crate::blur::{BlurEvents, BlurScheduler, BlurSurface, FrameScheduler, PlateStyle};
use crate::bus::Subscription;
use crate::config::Config;
use crate::error::PrefsResult;
use crate::events::PreferenceChangeBus;
use crate::extensions::ExtensionRegistry;
use crate::permissions::{PermissionFlag, PermissionProbe, WallpaperFileAccess};
use crate::store::{FileStore, KeyValueStore};
use crate::widgets::WidgetPreferences;

pub struct PreferenceContext {
    store: Arc<dyn KeyValueStore>,
    registry: Arc<dyn ExtensionRegistry>,
    permissions: Arc<dyn PermissionProbe>,
    bus: Arc<PreferenceChangeBus>,
    widgets: OnceCell<Arc<WidgetPreferences>>,
    appearance: OnceCell<Arc<AppearancePreferences>>,
    subscriptions: Mutex<Vec<Subscription>>,
}

impl PreferenceContext {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        registry: Arc<dyn ExtensionRegistry>,
        permissions: Arc<dyn PermissionProbe>,
    ) -> Self {
        Self {
            store,
            registry,
            permissions,
            bus: Arc::new(PreferenceChangeBus::new()),
            widgets: OnceCell::new(),
            appearance: OnceCell::new(),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Open the preferences file named by `config`.
    ///
    /// Wallpaper access is probed from `[wallpaper] path`; without one the
    /// wallpaper is treated as unreadable.
    pub fn open(config: &Config, registry: Arc<dyn ExtensionRegistry>) -> PrefsResult<Self> {
        let path = config.preferences_path();
        let store = FileStore::open(&path)?;
        tracing::debug!(path = %path.display(), "opened preferences");

        let permissions: Arc<dyn PermissionProbe> = match &config.wallpaper.path {
            Some(wallpaper) => Arc::new(WallpaperFileAccess::new(wallpaper)),
            None => Arc::new(PermissionFlag::new(false)),
        };

        Ok(Self::new(Arc::new(store), registry, permissions))
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn bus(&self) -> &Arc<PreferenceChangeBus> {
        &self.bus
    }

    pub fn widgets(&self) -> Arc<WidgetPreferences> {
        Arc::clone(self.widgets.get_or_init(|| {
            let widgets = Arc::new(WidgetPreferences::hydrate(
                Arc::clone(&self.store),
                Arc::clone(&self.registry),
                Arc::clone(&self.bus),
            ));
            let weak: Weak<WidgetPreferences> = Arc::downgrade(&widgets);
            self.track(self.store.signal().subscribe(move |key: &String| {
                if let Some(widgets) = weak.upgrade() {
                    widgets.on_preference_key_changed(key);
                }
            }));
            widgets
        }))
    }

    pub fn appearance(&self) -> Arc<AppearancePreferences> {
        Arc::clone(self.appearance.get_or_init(|| {
            let appearance = Arc::new(AppearancePreferences::new(
                Arc::clone(&self.store),
                Arc::clone(&self.permissions),
                Arc::clone(&self.bus),
            ));
            let weak: Weak<AppearancePreferences> = Arc::downgrade(&appearance);
            self.track(self.store.signal().subscribe(move |key: &String| {
                if let Some(appearance) = weak.upgrade() {
                    appearance.on_preference_key_changed(key);
                }
            }));
            appearance
        }))
    }

    /// Create a blur scheduler for one plate, sharing this context's
    /// appearance preferences.
    pub fn blur_scheduler(
        &self,
        style: PlateStyle,
        surface: Box<dyn BlurSurface>,
        frames: Box<dyn FrameScheduler>,
    ) -> BlurScheduler {
        BlurScheduler::new(self.appearance(), style, surface, frames)
    }

    /// Send [`crate::blur::BlurEvent::PreferenceChanged`] to `events` whenever
    /// the blur preference changes in the backing store.
    pub fn follow_blur_preference(&self, events: &BlurEvents) {
        self.track(events.follow_preferences(self.store.signal()));
    }

    fn track(&self, subscription: Subscription) {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscription);
    }
}

impl Drop for PreferenceContext {
    fn drop(&mut self) {
        let subscriptions =
            std::mem::take(self.subscriptions.get_mut().unwrap_or_else(PoisonError::into_inner));
        for subscription in subscriptions {
            self.store.signal().unsubscribe(subscription);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blur::{BlurEvent, FrameLoopMessage, ManualFrameQueue};
    use crate::extensions::{ExtensionList, InstalledExtension};
    use crate::keys;
    use crate::store::{MemoryStore, WriteMode};
    use crate::widgets::WidgetId;
    use tempfile::TempDir;

    fn registry() -> Arc<ExtensionList> {
        Arc::new(ExtensionList::new(vec![
            InstalledExtension::new("weather", true),
            InstalledExtension::new("notes", true),
        ]))
    }

    fn id(s: &str) -> WidgetId {
        WidgetId::new(s).unwrap()
    }

    #[test]
    fn test_preferences_are_created_once() {
        let context = PreferenceContext::new(
            Arc::new(MemoryStore::new()),
            registry(),
            Arc::new(PermissionFlag::new(true)),
        );
        assert!(Arc::ptr_eq(&context.widgets(), &context.widgets()));
        assert!(Arc::ptr_eq(&context.appearance(), &context.appearance()));
        assert_eq!(context.store().signal().len(), 2);
    }

    #[test]
    fn test_external_write_resyncs_caches() {
        let store = Arc::new(MemoryStore::new());
        let context = PreferenceContext::new(
            store.clone(),
            registry(),
            Arc::new(PermissionFlag::new(true)),
        );
        let widgets = context.widgets();
        let appearance = context.appearance();
        assert_eq!(widgets.order().current_order(), vec![id("weather"), id("notes")]);

        store
            .put_string(keys::WIDGET_ORDER, "notes;weather", WriteMode::Commit)
            .unwrap();
        store
            .put_string(keys::ICON_PACK, "com.icons.round", WriteMode::Apply)
            .unwrap();

        assert_eq!(widgets.order().current_order(), vec![id("notes"), id("weather")]);
        assert_eq!(
            appearance.icon_pack(),
            crate::appearance::IconPack::Installed {
                package: "com.icons.round".to_string()
            }
        );
    }

    #[test]
    fn test_drop_unsubscribes() {
        let store = Arc::new(MemoryStore::new());
        let context = PreferenceContext::new(
            store.clone(),
            registry(),
            Arc::new(PermissionFlag::new(true)),
        );
        context.widgets();
        let (events, _rx) = BlurEvents::channel();
        context.follow_blur_preference(&events);
        assert_eq!(store.signal().len(), 2);

        drop(context);
        assert!(store.signal().is_empty());
    }

    #[test]
    fn test_blur_preference_reaches_scheduler() {
        let store = Arc::new(MemoryStore::new());
        let context = PreferenceContext::new(
            store.clone(),
            registry(),
            Arc::new(PermissionFlag::new(true)),
        );
        let (events, mut rx) = BlurEvents::channel();
        context.follow_blur_preference(&events);

        context.appearance().set_blur_effect_enabled(false).unwrap();
        assert_eq!(
            rx.try_recv().ok(),
            Some(FrameLoopMessage::Event(BlurEvent::PreferenceChanged))
        );

        // Unchanged value, no signal
        context.appearance().set_blur_effect_enabled(false).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_open_file_backed_context() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.path = Some(temp_dir.path().join("prefs.json"));

        {
            let context = PreferenceContext::open(&config, registry()).unwrap();
            context.widgets().order().move_entry(0, 1).unwrap();
            // No wallpaper configured
            assert!(!context.appearance().has_wallpaper_access());
        }

        let context = PreferenceContext::open(&config, registry()).unwrap();
        assert_eq!(
            context.widgets().order().current_order(),
            vec![id("notes"), id("weather")]
        );
    }

    #[test]
    fn test_scheduler_shares_appearance() {
        let context = PreferenceContext::new(
            Arc::new(MemoryStore::new()),
            registry(),
            Arc::new(PermissionFlag::new(false)),
        );
        let frames = ManualFrameQueue::new();

        struct NullSurface;
        impl BlurSurface for NullSurface {
            fn blur(&mut self, _radius: u32) -> Result<(), crate::blur::BlurError> {
                Ok(())
            }
            fn set_color_filter(&mut self, _color: crate::config::PlateColor) {}
            fn fill(&mut self, _color: crate::config::PlateColor) {}
            fn set_rounded_corners(&mut self, _rounded: bool) {}
        }

        let mut scheduler = context.blur_scheduler(
            PlateStyle::from_config(&Config::default().plate),
            Box::new(NullSurface),
            Box::new(frames.clone()),
        );
        scheduler.handle(BlurEvent::Attached);
        assert!(!context.appearance().is_blur_effect_enabled());
        assert_eq!(frames.pending(), 0);
    }
}
