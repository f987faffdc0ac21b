//! Installed extensions, as seen by the widget stores.
//!
//! Discovery and installation happen elsewhere; the stores only need the
//! enumeration order and whether each extension exposes a widget.

use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// An installed extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledExtension {
    /// Unique extension name. Doubles as its widget identifier.
    pub name: String,
    /// Whether the extension exposes a widget.
    #[serde(default)]
    pub has_widget: bool,
}

impl InstalledExtension {
    pub fn new(name: impl Into<String>, has_widget: bool) -> Self {
        Self {
            name: name.into(),
            has_widget,
        }
    }
}

/// Enumerates installed extensions.
pub trait ExtensionRegistry: Send + Sync {
    /// Installed extensions, in enumeration order.
    fn installed_extensions(&self) -> Vec<InstalledExtension>;

    /// Whether an installed extension named `name` exposes a widget.
    fn has_widget(&self, name: &str) -> bool {
        exposes_widget(&self.installed_extensions(), name)
    }
}

/// Whether `extensions` holds an extension named `name` that exposes a
/// widget. Shared by registry lookups and bulk resolution over one snapshot.
pub fn exposes_widget(extensions: &[InstalledExtension], name: &str) -> bool {
    extensions
        .iter()
        .any(|ext| ext.name == name && ext.has_widget)
}

/// Registry backed by a list kept in memory.
#[derive(Debug, Default)]
pub struct ExtensionList {
    extensions: RwLock<Vec<InstalledExtension>>,
}

impl ExtensionList {
    pub fn new(extensions: Vec<InstalledExtension>) -> Self {
        Self {
            extensions: RwLock::new(extensions),
        }
    }

    /// Add an extension, replacing any installed under the same name.
    pub fn install(&self, extension: InstalledExtension) {
        let mut extensions = self
            .extensions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match extensions.iter_mut().find(|ext| ext.name == extension.name) {
            Some(existing) => *existing = extension,
            None => extensions.push(extension),
        }
    }

    /// Remove the extension named `name`. Returns false if it was absent.
    pub fn uninstall(&self, name: &str) -> bool {
        let mut extensions = self
            .extensions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = extensions.len();
        extensions.retain(|ext| ext.name != name);
        extensions.len() != before
    }
}

impl ExtensionRegistry for ExtensionList {
    fn installed_extensions(&self) -> Vec<InstalledExtension> {
        self.extensions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
