//! Widget identity and arrangement.
//!
//! # Architecture
//!
//! ```text
//! WidgetPreferences
//! ├── order: WidgetOrderStore   (display order, `;`-joined string)
//! ├── added: AddedWidgetStore   (added widgets, JSON array blob)
//! └── registry: ExtensionRegistry
//! ```
//!
//! Both stores are hydrated from the key-value store on creation, or seeded
//! from the extension registry when nothing is persisted yet. The two stores
//! are independent: adding a widget does not place it in the order, which is
//! what [`WidgetPreferences`] does on top of them.

mod added;
mod order;
mod preferences;
mod resolve;

pub use added::AddedWidgetStore;
pub use order::WidgetOrderStore;
pub use preferences::WidgetPreferences;
pub use resolve::resolve_widgets;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PrefsError, PrefsResult};
use crate::extensions::ExtensionRegistry;

/// Separator of the persisted widget order. Never valid inside an identifier.
pub const ORDER_SEPARATOR: char = ';';

/// Opaque key of a widget: an extension name or a flattened provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WidgetId(String);

impl WidgetId {
    /// Validate `id`: non-empty and free of the order separator.
    pub fn new(id: impl Into<String>) -> PrefsResult<Self> {
        let id = id.into();
        if id.is_empty() || id.contains(ORDER_SEPARATOR) {
            return Err(PrefsError::InvalidIdentifier(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for WidgetId {
    type Error = PrefsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WidgetId> for String {
    fn from(id: WidgetId) -> Self {
        id.0
    }
}

impl AsRef<str> for WidgetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Host widget provider, a package + class pair.
///
/// Flattens to `package/class`, which is the provider's [`WidgetId`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderId {
    package: String,
    class: String,
}

impl ProviderId {
    pub fn new(package: impl Into<String>, class: impl Into<String>) -> PrefsResult<Self> {
        let package = package.into();
        let class = class.into();
        let invalid = |s: &str| s.is_empty() || s.contains(ORDER_SEPARATOR);
        if invalid(&package) || package.contains('/') || invalid(&class) {
            return Err(PrefsError::InvalidIdentifier(format!("{}/{}", package, class)));
        }
        Ok(Self { package, class })
    }

    /// Parse a flattened `package/class` string. A class starting with `.` is
    /// relative to the package.
    pub fn parse(flat: &str) -> PrefsResult<Self> {
        let (package, class) = flat
            .split_once('/')
            .ok_or_else(|| PrefsError::InvalidIdentifier(flat.to_string()))?;
        let class = if class.starts_with('.') {
            format!("{}{}", package, class)
        } else {
            class.to_string()
        };
        Self::new(package, class)
    }

    pub fn package(&self) -> &str {
        &self.package
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn widget_id(&self) -> WidgetId {
        WidgetId(format!("{}/{}", self.package, self.class))
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.class)
    }
}

/// Descriptive metadata of a host widget provider, carried by
/// [`crate::PreferenceChangeEvent::WidgetAdded`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    pub provider: ProviderId,
    pub label: String,
    pub min_width: u32,
    pub min_height: u32,
}

/// A widget placed on the home surface.
///
/// Persisted as a tagged record:
/// `{"type": "android", "providerId": ..., "instanceId": ...}` or
/// `{"type": "extension", "extensionName": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AddedWidget {
    /// Host-level widget bound to a concrete provider.
    #[serde(rename_all = "camelCase")]
    Android {
        provider_id: WidgetId,
        instance_id: i32,
    },
    /// Widget owned by an installed extension.
    #[serde(rename_all = "camelCase")]
    Extension { extension_name: WidgetId },
}

/// Identity of an [`AddedWidget`]: its variant plus its key field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetKey<'a> {
    Android(&'a WidgetId),
    Extension(&'a WidgetId),
}

impl AddedWidget {
    /// The identifier this widget is ordered by.
    pub fn id(&self) -> &WidgetId {
        match self {
            AddedWidget::Android { provider_id, .. } => provider_id,
            AddedWidget::Extension { extension_name } => extension_name,
        }
    }

    pub fn key(&self) -> WidgetKey<'_> {
        match self {
            AddedWidget::Android { provider_id, .. } => WidgetKey::Android(provider_id),
            AddedWidget::Extension { extension_name } => WidgetKey::Extension(extension_name),
        }
    }

    /// Whether both widgets denote the same entry, ignoring instance data.
    pub fn same_identity(&self, other: &AddedWidget) -> bool {
        self.key() == other.key()
    }

    pub fn is_android(&self) -> bool {
        matches!(self, AddedWidget::Android { .. })
    }
}

/// Installed extensions exposing a widget, in registry enumeration order.
fn seed_extension_ids(registry: &dyn ExtensionRegistry) -> Vec<WidgetId> {
    registry
        .installed_extensions()
        .into_iter()
        .filter(|ext| ext.has_widget)
        .filter_map(|ext| match WidgetId::new(ext.name) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(error = %e, "skipping extension with unusable name");
                None
            }
        })
        .collect()
}
