//! Preference change events.

use crate::bus::ChangeBus;
use crate::widgets::{AddedWidget, ProviderInfo};

/// A change made through one of the preference stores.
///
/// New variants may be added; match with a wildcard arm.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum PreferenceChangeEvent {
    /// The widget at `from` moved to `to`.
    WidgetOrderChanged { from: usize, to: usize },

    /// A widget was added to the surface.
    WidgetAdded {
        widget: AddedWidget,
        meta: Option<ProviderInfo>,
    },

    /// A widget was removed from the surface.
    WidgetRemoved { widget: AddedWidget },

    /// The selected icon pack changed.
    IconPackChanged,

    /// The persisted blur preference was set.
    BlurEffectToggled { enabled: bool },
}

/// Bus carrying [`PreferenceChangeEvent`]s to in-process observers.
pub type PreferenceChangeBus = ChangeBus<PreferenceChangeEvent>;
