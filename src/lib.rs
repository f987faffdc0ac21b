//! Homeplate - home surface preferences for a launcher.
//!
//! Homeplate keeps the persistent state behind a launcher's home surface:
//! which widgets are placed there and in what order, and how the plates
//! underneath them are drawn.
//!
//! # Architecture
//!
//! The library is organized into these main modules:
//!
//! - [`store`] - Key-value persistence with commit/apply durability
//! - [`bus`] - Synchronous, ordered publish/subscribe
//! - [`widgets`] - Widget order, added widgets, and their resolution
//! - [`appearance`] - Blur and icon pack preferences
//! - [`blur`] - The plate blur state machine and its frame drivers
//! - [`context`] - Lazily created per-process preference objects
//! - [`config`] - Configuration loading and management
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use homeplate::{Config, ExtensionList, InstalledExtension, PreferenceContext};
//!
//! let registry = Arc::new(ExtensionList::new(vec![
//!     InstalledExtension::new("weather", true),
//! ]));
//! let context = PreferenceContext::open(&Config::load(), registry)?;
//!
//! let widgets = context.widgets();
//! widgets.subscribe(|event| println!("{:?}", event));
//! widgets.order().move_entry(0, 1)?;
//! ```

pub mod appearance;
pub mod blur;
pub mod bus;
pub mod config;
pub mod context;
pub mod events;
pub mod extensions;
pub mod keys;
pub mod permissions;
pub mod store;
pub mod widgets;

mod error;

pub use appearance::{AppearancePreferences, IconPack};
pub use blur::{BlurEvent, BlurScheduler, BlurState, PlateStyle};
pub use bus::{ChangeBus, PublishReport, Subscription};
pub use config::{Config, PlateColor};
pub use context::PreferenceContext;
pub use error::{PrefsError, PrefsResult};
pub use events::{PreferenceChangeBus, PreferenceChangeEvent};
pub use extensions::{ExtensionList, ExtensionRegistry, InstalledExtension};
pub use permissions::{PermissionFlag, PermissionProbe};
pub use store::{FileStore, KeyValueStore, MemoryStore, WriteMode};
pub use widgets::{
    AddedWidget, AddedWidgetStore, ProviderId, ProviderInfo, WidgetId, WidgetOrderStore,
    WidgetPreferences,
};
