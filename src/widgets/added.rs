//! Widgets added to the home surface.

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{seed_extension_ids, AddedWidget, ProviderInfo, WidgetId};
use crate::error::{PrefsError, PrefsResult};
use crate::events::{PreferenceChangeBus, PreferenceChangeEvent};
use crate::extensions::ExtensionRegistry;
use crate::keys;
use crate::store::{KeyValueStore, WriteMode};

/// Owns the set of widgets placed on the surface, host-level and
/// extension-level alike. No two entries share an identity.
pub struct AddedWidgetStore {
    store: Arc<dyn KeyValueStore>,
    registry: Arc<dyn ExtensionRegistry>,
    bus: Arc<PreferenceChangeBus>,
    widgets: RwLock<Vec<AddedWidget>>,
    mutation: Mutex<()>,
}

impl AddedWidgetStore {
    /// Load the persisted widgets, or seed one extension widget per installed
    /// extension exposing a widget. A persisted record that fails to decode
    /// is treated as absent and left in place.
    pub fn hydrate(
        store: Arc<dyn KeyValueStore>,
        registry: Arc<dyn ExtensionRegistry>,
        bus: Arc<PreferenceChangeBus>,
    ) -> Self {
        let widgets = load(store.as_ref(), registry.as_ref());
        Self {
            store,
            registry,
            bus,
            widgets: RwLock::new(widgets),
            mutation: Mutex::new(()),
        }
    }

    pub fn all(&self) -> Vec<AddedWidget> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// The widget ordered under `id`, if any.
    pub fn find(&self, id: &WidgetId) -> Option<AddedWidget> {
        self.read().iter().find(|widget| widget.id() == id).cloned()
    }

    /// Add a host widget bound to `provider_id`.
    ///
    /// The full set is committed, then
    /// [`PreferenceChangeEvent::WidgetAdded`] is published. The widget order
    /// is not touched.
    pub fn add_android_widget(
        &self,
        provider_id: WidgetId,
        instance_id: i32,
        meta: Option<ProviderInfo>,
    ) -> PrefsResult<AddedWidget> {
        let widget = AddedWidget::Android {
            provider_id,
            instance_id,
        };

        {
            let _guard = self.mutation.lock().unwrap_or_else(PoisonError::into_inner);
            let mut next = self.all();
            if next.iter().any(|existing| existing.same_identity(&widget)) {
                return Err(PrefsError::DuplicateWidget(widget.id().to_string()));
            }
            next.push(widget.clone());
            self.persist(&next)?;
            *self.write() = next;
        }

        tracing::debug!(provider = %widget.id(), instance_id, "host widget added");
        self.bus.publish(&PreferenceChangeEvent::WidgetAdded {
            widget: widget.clone(),
            meta,
        });
        Ok(widget)
    }

    /// Remove the host widget bound to `provider_id` and return what was
    /// removed.
    ///
    /// Publishes [`PreferenceChangeEvent::WidgetRemoved`] per removed entry.
    /// The widget order is not touched; a leftover order entry no longer
    /// resolves and is skipped on display.
    pub fn remove_android_widget(&self, provider_id: &WidgetId) -> PrefsResult<Vec<AddedWidget>> {
        let removed = {
            let _guard = self.mutation.lock().unwrap_or_else(PoisonError::into_inner);
            let (removed, kept): (Vec<AddedWidget>, Vec<AddedWidget>) = self
                .all()
                .into_iter()
                .partition(|widget| widget.is_android() && widget.id() == provider_id);
            if removed.is_empty() {
                return Ok(removed);
            }
            self.persist(&kept)?;
            *self.write() = kept;
            removed
        };

        tracing::debug!(provider = %provider_id, "host widget removed");
        for widget in &removed {
            self.bus.publish(&PreferenceChangeEvent::WidgetRemoved {
                widget: widget.clone(),
            });
        }
        Ok(removed)
    }

    /// Re-read the widgets from the store.
    pub fn resync(&self) {
        let widgets = load(self.store.as_ref(), self.registry.as_ref());
        tracing::debug!(widgets = widgets.len(), "added widgets re-hydrated");
        *self.write() = widgets;
    }

    fn persist(&self, widgets: &[AddedWidget]) -> PrefsResult<()> {
        let blob = serde_json::to_value(widgets)?;
        self.store
            .put_blob(keys::ADDED_WIDGETS, blob, WriteMode::Commit)
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<AddedWidget>> {
        self.widgets.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<AddedWidget>> {
        self.widgets.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn load(store: &dyn KeyValueStore, registry: &dyn ExtensionRegistry) -> Vec<AddedWidget> {
    let Some(blob) = store.get_blob(keys::ADDED_WIDGETS) else {
        let seeded = seed(registry);
        tracing::info!(widgets = seeded.len(), "seeding added widgets from installed extensions");
        return seeded;
    };

    match serde_json::from_value::<Vec<AddedWidget>>(blob) {
        Ok(decoded) => {
            let mut widgets: Vec<AddedWidget> = Vec::with_capacity(decoded.len());
            for widget in decoded {
                if widgets.iter().any(|existing| existing.same_identity(&widget)) {
                    tracing::warn!(id = %widget.id(), "dropping duplicate persisted widget");
                    continue;
                }
                widgets.push(widget);
            }
            widgets
        }
        Err(e) => {
            let error = PrefsError::Serialization {
                key: keys::ADDED_WIDGETS.to_string(),
                message: e.to_string(),
            };
            tracing::warn!(error = %error, "persisted widgets are corrupt, using defaults");
            seed(registry)
        }
    }
}

fn seed(registry: &dyn ExtensionRegistry) -> Vec<AddedWidget> {
    seed_extension_ids(registry)
        .into_iter()
        .map(|extension_name| AddedWidget::Extension { extension_name })
        .collect()
}
