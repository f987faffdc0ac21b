//! Appearance preferences: the blur effect and the icon pack.

use std::sync::{Arc, PoisonError, RwLock};

use crate::error::PrefsResult;
use crate::events::{PreferenceChangeBus, PreferenceChangeEvent};
use crate::keys;
use crate::permissions::PermissionProbe;
use crate::store::{KeyValueStore, WriteMode};

/// Icon set used for app icons.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IconPack {
    #[default]
    Default,
    /// An installed icon pack, by package name.
    Installed { package: String },
}

/// Handles preferences for launcher appearance.
pub struct AppearancePreferences {
    store: Arc<dyn KeyValueStore>,
    permissions: Arc<dyn PermissionProbe>,
    bus: Arc<PreferenceChangeBus>,
    icon_pack: RwLock<IconPack>,
}

impl AppearancePreferences {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        permissions: Arc<dyn PermissionProbe>,
        bus: Arc<PreferenceChangeBus>,
    ) -> Self {
        let icon_pack = load_icon_pack(store.as_ref());
        Self {
            store,
            permissions,
            bus,
            icon_pack: RwLock::new(icon_pack),
        }
    }

    /// Whether the wallpaper can be read, which blurring requires.
    pub fn has_wallpaper_access(&self) -> bool {
        self.permissions.can_read_wallpaper()
    }

    /// Whether blur effect is enabled. If not set, the default is whether
    /// the wallpaper is readable.
    pub fn is_blur_effect_enabled(&self) -> bool {
        match self.store.get_bool(keys::BLUR_EFFECT_ENABLED) {
            Ok(Some(enabled)) => enabled,
            Ok(None) => self.has_wallpaper_access(),
            Err(e) => {
                tracing::warn!(error = %e, "blur preference is unreadable");
                self.has_wallpaper_access()
            }
        }
    }

    /// Whether the plate should currently blur: access granted and enabled.
    pub fn should_blur(&self) -> bool {
        self.has_wallpaper_access() && self.is_blur_effect_enabled()
    }

    /// Set whether blur effect should be enabled.
    ///
    /// Enabling without wallpaper access stores `false` instead. Returns the
    /// value that was stored.
    pub fn set_blur_effect_enabled(&self, enabled: bool) -> PrefsResult<bool> {
        let value = enabled && self.has_wallpaper_access();
        if enabled && !value {
            tracing::info!("blur requested without wallpaper access, storing disabled");
        }

        self.store
            .put_bool(keys::BLUR_EFFECT_ENABLED, value, WriteMode::Commit)?;
        self.bus
            .publish(&PreferenceChangeEvent::BlurEffectToggled { enabled: value });
        Ok(value)
    }

    /// Persist `false` unless it is already stored. Used when access was
    /// lost; returns whether a write happened.
    pub fn force_blur_disabled(&self) -> PrefsResult<bool> {
        if let Ok(Some(false)) = self.store.get_bool(keys::BLUR_EFFECT_ENABLED) {
            return Ok(false);
        }
        self.store
            .put_bool(keys::BLUR_EFFECT_ENABLED, false, WriteMode::Commit)?;
        self.bus
            .publish(&PreferenceChangeEvent::BlurEffectToggled { enabled: false });
        Ok(true)
    }

    /// The icon pack to use.
    pub fn icon_pack(&self) -> IconPack {
        self.icon_pack
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Switch to an installed icon pack. Written without waiting for disk.
    pub fn change_icon_pack(&self, package: &str) -> PrefsResult<()> {
        self.store
            .put_string(keys::ICON_PACK, package, WriteMode::Apply)?;
        self.set_icon_pack(IconPack::Installed {
            package: package.to_string(),
        });
        self.bus.publish(&PreferenceChangeEvent::IconPackChanged);
        Ok(())
    }

    /// Revert the applied icon pack and use default icons instead.
    pub fn use_default_icon_pack(&self) -> PrefsResult<()> {
        self.store.remove(keys::ICON_PACK, WriteMode::Apply)?;
        self.set_icon_pack(IconPack::Default);
        self.bus.publish(&PreferenceChangeEvent::IconPackChanged);
        Ok(())
    }

    /// Re-hydrate cached values if `key` is one of ours.
    pub fn on_preference_key_changed(&self, key: &str) {
        if key == keys::ICON_PACK {
            self.set_icon_pack(load_icon_pack(self.store.as_ref()));
        }
    }

    fn set_icon_pack(&self, icon_pack: IconPack) {
        *self
            .icon_pack
            .write()
            .unwrap_or_else(PoisonError::into_inner) = icon_pack;
    }
}

fn load_icon_pack(store: &dyn KeyValueStore) -> IconPack {
    match store.get_string(keys::ICON_PACK) {
        Ok(Some(package)) => IconPack::Installed { package },
        Ok(None) => IconPack::Default,
        Err(e) => {
            tracing::warn!(error = %e, "icon pack preference is unreadable, using default icons");
            IconPack::Default
        }
    }
}
