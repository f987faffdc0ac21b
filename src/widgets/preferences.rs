use std::sync::Arc;

use super::{resolve_widgets, AddedWidget, AddedWidgetStore, ProviderInfo, WidgetId, WidgetOrderStore};
use crate::bus::Subscription;
use crate::error::PrefsResult;
use crate::events::{PreferenceChangeBus, PreferenceChangeEvent};
use crate::extensions::ExtensionRegistry;
use crate::keys;
use crate::store::KeyValueStore;

/// Widget order and added widgets, kept side by side.
///
/// The stores stay independent; the `*_to_surface` / `*_from_surface`
/// operations here keep the order in step with the added widgets.
pub struct WidgetPreferences {
    order: WidgetOrderStore,
    added: AddedWidgetStore,
    registry: Arc<dyn ExtensionRegistry>,
    bus: Arc<PreferenceChangeBus>,
}

impl WidgetPreferences {
    pub fn hydrate(
        store: Arc<dyn KeyValueStore>,
        registry: Arc<dyn ExtensionRegistry>,
        bus: Arc<PreferenceChangeBus>,
    ) -> Self {
        Self {
            order: WidgetOrderStore::hydrate(
                Arc::clone(&store),
                Arc::clone(&registry),
                Arc::clone(&bus),
            ),
            added: AddedWidgetStore::hydrate(store, Arc::clone(&registry), Arc::clone(&bus)),
            registry,
            bus,
        }
    }

    pub fn order(&self) -> &WidgetOrderStore {
        &self.order
    }

    pub fn added(&self) -> &AddedWidgetStore {
        &self.added
    }

    /// Listen for widget preference changes.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&PreferenceChangeEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(listener)
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.bus.unsubscribe(subscription)
    }

    /// Add a host widget and append it to the display order.
    ///
    /// The order is updated first so that observers of
    /// [`PreferenceChangeEvent::WidgetAdded`] already find it there.
    pub fn add_android_widget_to_surface(
        &self,
        info: ProviderInfo,
        instance_id: i32,
    ) -> PrefsResult<AddedWidget> {
        let id = info.provider.widget_id();
        let appended = self.order.append(id.clone())?;

        match self.added.add_android_widget(id.clone(), instance_id, Some(info)) {
            Ok(widget) => Ok(widget),
            Err(e) => {
                if appended {
                    if let Err(rollback) = self.order.remove(&id) {
                        tracing::warn!(id = %id, error = %rollback, "failed to roll back widget order");
                    }
                }
                Err(e)
            }
        }
    }

    /// Remove a host widget and drop it from the display order.
    ///
    /// The removal stands once the added widgets are committed. If the order
    /// then fails to commit, its entry is left dangling and skipped by
    /// [`WidgetPreferences::resolved`].
    pub fn remove_android_widget_from_surface(
        &self,
        provider_id: &WidgetId,
    ) -> PrefsResult<Vec<AddedWidget>> {
        let removed = self.added.remove_android_widget(provider_id)?;
        if !removed.is_empty() {
            if let Err(e) = self.order.remove(provider_id) {
                tracing::warn!(id = %provider_id, error = %e, "widget removed but order entry kept");
            }
        }
        Ok(removed)
    }

    /// The widgets to display, in order. Unresolved entries are skipped.
    pub fn resolved(&self) -> Vec<AddedWidget> {
        resolve_widgets(
            &self.order.current_order(),
            &self.added.all(),
            self.registry.as_ref(),
        )
    }

    /// Re-hydrate the store owning `key`, if any.
    pub fn on_preference_key_changed(&self, key: &str) {
        match key {
            keys::WIDGET_ORDER => self.order.resync(),
            keys::ADDED_WIDGETS => self.added.resync(),
            _ => {}
        }
    }
}
