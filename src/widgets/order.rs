//! Widget display order.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{seed_extension_ids, WidgetId, ORDER_SEPARATOR};
use crate::error::{PrefsError, PrefsResult};
use crate::events::{PreferenceChangeBus, PreferenceChangeEvent};
use crate::extensions::ExtensionRegistry;
use crate::keys;
use crate::store::{KeyValueStore, WriteMode};

/// Owns the ordered sequence of widget identifiers.
///
/// The order never holds the same identifier twice. It may reference widgets
/// that no longer resolve (an uninstalled extension, a removed host widget);
/// those are skipped when the order is resolved for display.
pub struct WidgetOrderStore {
    store: Arc<dyn KeyValueStore>,
    registry: Arc<dyn ExtensionRegistry>,
    bus: Arc<PreferenceChangeBus>,
    order: RwLock<Vec<WidgetId>>,
    /// Serializes mutations; never held by readers or [`Self::resync`].
    mutation: Mutex<()>,
}

impl WidgetOrderStore {
    /// Load the persisted order, or seed it from the installed extensions if
    /// none is persisted. The seed is not written back.
    pub fn hydrate(
        store: Arc<dyn KeyValueStore>,
        registry: Arc<dyn ExtensionRegistry>,
        bus: Arc<PreferenceChangeBus>,
    ) -> Self {
        let order = load(store.as_ref(), registry.as_ref());
        Self {
            store,
            registry,
            bus,
            order: RwLock::new(order),
            mutation: Mutex::new(()),
        }
    }

    /// Snapshot of the live order.
    pub fn current_order(&self) -> Vec<WidgetId> {
        self.read().clone()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn index_of(&self, id: &WidgetId) -> Option<usize> {
        self.read().iter().position(|entry| entry == id)
    }

    pub fn contains(&self, id: &WidgetId) -> bool {
        self.index_of(id).is_some()
    }

    /// Replace the order with `new_order`, a permutation of the current one.
    ///
    /// The new order is committed before it becomes visible, then
    /// [`PreferenceChangeEvent::WidgetOrderChanged`] is published. A
    /// `new_order` that adds, drops, or duplicates an identifier is rejected
    /// with [`PrefsError::InvalidOrder`] and nothing is written.
    pub fn reorder(&self, from: usize, to: usize, new_order: Vec<WidgetId>) -> PrefsResult<()> {
        {
            let _guard = self.mutation.lock().unwrap_or_else(PoisonError::into_inner);
            check_permutation(&self.read(), &new_order)?;
            self.persist(&new_order)?;
            *self.write() = new_order;
        }

        tracing::debug!(from, to, "widget order changed");
        self.bus
            .publish(&PreferenceChangeEvent::WidgetOrderChanged { from, to });
        Ok(())
    }

    /// Move the entry at `from` to position `to`, shifting the rest.
    pub fn move_entry(&self, from: usize, to: usize) -> PrefsResult<()> {
        let mut next = self.current_order();
        if from >= next.len() || to >= next.len() {
            return Err(PrefsError::InvalidOrder(format!(
                "cannot move position {} to {} in an order of {}",
                from,
                to,
                next.len()
            )));
        }
        let id = next.remove(from);
        next.insert(to, id);
        self.reorder(from, to, next)
    }

    /// Append `id` to the end of the order. Returns false if already present.
    pub fn append(&self, id: WidgetId) -> PrefsResult<bool> {
        let _guard = self.mutation.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = self.current_order();
        if next.contains(&id) {
            return Ok(false);
        }
        next.push(id);
        self.persist(&next)?;
        *self.write() = next;
        Ok(true)
    }

    /// Drop `id` from the order. Returns false if it was not present.
    pub fn remove(&self, id: &WidgetId) -> PrefsResult<bool> {
        let _guard = self.mutation.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = self.current_order();
        let before = next.len();
        next.retain(|entry| entry != id);
        if next.len() == before {
            return Ok(false);
        }
        self.persist(&next)?;
        *self.write() = next;
        Ok(true)
    }

    /// Re-read the order from the store, e.g. after another component wrote it.
    pub fn resync(&self) {
        let order = load(self.store.as_ref(), self.registry.as_ref());
        tracing::debug!(entries = order.len(), "widget order re-hydrated");
        *self.write() = order;
    }

    fn persist(&self, order: &[WidgetId]) -> PrefsResult<()> {
        self.store
            .put_string(keys::WIDGET_ORDER, &encode_order(order), WriteMode::Commit)
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<WidgetId>> {
        self.order.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<WidgetId>> {
        self.order.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn load(store: &dyn KeyValueStore, registry: &dyn ExtensionRegistry) -> Vec<WidgetId> {
    match store.get_string(keys::WIDGET_ORDER) {
        Ok(Some(joined)) => decode_order(&joined),
        Ok(None) => {
            let seeded = seed_extension_ids(registry);
            tracing::info!(entries = seeded.len(), "seeding widget order from installed extensions");
            seeded
        }
        Err(e) => {
            tracing::warn!(error = %e, "persisted widget order is unreadable, using defaults");
            seed_extension_ids(registry)
        }
    }
}

fn encode_order(order: &[WidgetId]) -> String {
    order
        .iter()
        .map(WidgetId::as_str)
        .collect::<Vec<_>>()
        .join(&ORDER_SEPARATOR.to_string())
}

fn decode_order(joined: &str) -> Vec<WidgetId> {
    let mut order: Vec<WidgetId> = Vec::new();
    for part in joined.split(ORDER_SEPARATOR).filter(|part| !part.is_empty()) {
        let Ok(id) = WidgetId::new(part) else {
            continue;
        };
        if order.contains(&id) {
            tracing::warn!(id = %id, "dropping duplicate entry from persisted widget order");
            continue;
        }
        order.push(id);
    }
    order
}

fn check_permutation(current: &[WidgetId], next: &[WidgetId]) -> PrefsResult<()> {
    let next_set: HashSet<&WidgetId> = next.iter().collect();
    if next_set.len() != next.len() {
        return Err(PrefsError::InvalidOrder(
            "new order contains duplicate identifiers".to_string(),
        ));
    }

    let current_set: HashSet<&WidgetId> = current.iter().collect();
    if next_set != current_set {
        let missing: Vec<&str> = current_set
            .difference(&next_set)
            .map(|id| id.as_str())
            .collect();
        let unknown: Vec<&str> = next_set
            .difference(&current_set)
            .map(|id| id.as_str())
            .collect();
        return Err(PrefsError::InvalidOrder(format!(
            "missing {:?}, unknown {:?}",
            missing, unknown
        )));
    }
    Ok(())
}
