//! Preference keys.
//!
//! Keys are process-stable: they name the persisted records and are carried
//! by the key-change signal, so renaming one orphans existing user data.

/// Display order of widgets, `;`-joined identifiers.
pub const WIDGET_ORDER: &str = "widget_order";

/// JSON array of added widget records.
pub const ADDED_WIDGETS: &str = "added_widgets";

/// Whether the plate blur effect is enabled.
pub const BLUR_EFFECT_ENABLED: &str = "appearance_blur_effect_enabled";

/// Package name of the selected icon pack. Absent means the default icons.
pub const ICON_PACK: &str = "appearance_icon_pack";
