use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PrefsError, PrefsResult};

const DEFAULT_PLATE_COLOR: &str = "#80000000";
const DEFAULT_BLUR_AMOUNT: u32 = 20;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub plate: PlateConfig,
    pub wallpaper: WallpaperConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Preferences file. Defaults to `<data_dir>/homeplate/preferences.json`.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlateConfig {
    /// `#RRGGBB` or `#AARRGGBB`
    pub color: String,
    /// Overrides the alpha channel of `color`
    pub alpha: Option<u8>,
    pub blur_amount: u32,
    pub rounded_corners: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WallpaperConfig {
    /// Wallpaper image; blur is only possible while it is readable.
    pub path: Option<PathBuf>,
}

impl Default for PlateConfig {
    fn default() -> Self {
        Self {
            color: DEFAULT_PLATE_COLOR.to_string(),
            alpha: None,
            blur_amount: DEFAULT_BLUR_AMOUNT,
            rounded_corners: true,
        }
    }
}

impl PlateConfig {
    /// The configured color with the alpha override applied.
    pub fn plate_color(&self) -> PlateColor {
        let color = PlateColor::parse_hex(&self.color)
            .unwrap_or(PlateColor::from_argb(0x8000_0000));
        match self.alpha {
            Some(alpha) => color.with_alpha(alpha),
            None => color,
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .map(|h| h.join(".config"))
                    .unwrap_or_else(|| PathBuf::from("/tmp"))
            })
            .join("homeplate")
            .join("config.toml")
    }

    /// Load config from the default path, or return defaults if not found
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`. Unreadable or invalid files fall back to
    /// defaults.
    pub fn load_from(path: &Path) -> Self {
        let mut config = if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match Self::parse(&content) {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "failed to parse config");
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to read config");
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        config.validate();
        config
    }

    /// Parse config from TOML text, without validation.
    pub fn parse(content: &str) -> PrefsResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validate and clamp config values to acceptable ranges
    fn validate(&mut self) {
        if PlateColor::parse_hex(&self.plate.color).is_none() {
            tracing::warn!(color = %self.plate.color, "invalid plate color, using default");
            self.plate.color = DEFAULT_PLATE_COLOR.to_string();
        }

        // Blur radius range supported by the blur pass (1 - 25)
        self.plate.blur_amount = self.plate.blur_amount.clamp(1, 25);
    }

    /// Resolved preferences file path
    pub fn preferences_path(&self) -> PathBuf {
        self.storage.path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join("homeplate")
                .join("preferences.json")
        })
    }

    /// Save config to the default path
    pub fn save(&self) -> PrefsResult<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> PrefsResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| {
            PrefsError::Storage(format!("Failed to serialize config: {}", e))
        })?;
        fs::write(path, content)?;

        Ok(())
    }
}

/// A 32-bit ARGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlateColor(u32);

impl PlateColor {
    pub const fn from_argb(argb: u32) -> Self {
        Self(argb)
    }

    /// Parse `#RRGGBB` (opaque) or `#AARRGGBB`.
    pub fn parse_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        match hex.len() {
            6 => u32::from_str_radix(hex, 16).ok().map(|rgb| Self(0xFF00_0000 | rgb)),
            8 => u32::from_str_radix(hex, 16).ok().map(Self),
            _ => None,
        }
    }

    pub const fn argb(self) -> u32 {
        self.0
    }

    pub const fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Same color with the alpha channel replaced.
    pub const fn with_alpha(self, alpha: u8) -> Self {
        Self((self.0 & 0x00FF_FFFF) | ((alpha as u32) << 24))
    }
}

impl fmt::Display for PlateColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(
            PlateColor::parse_hex("#cba6f7"),
            Some(PlateColor::from_argb(0xFFCB_A6F7))
        );
        assert_eq!(
            PlateColor::parse_hex("#80112233"),
            Some(PlateColor::from_argb(0x8011_2233))
        );
        assert_eq!(PlateColor::parse_hex("#12345"), None);
        assert_eq!(PlateColor::parse_hex("#zzzzzz"), None);
    }

    #[test]
    fn test_with_alpha() {
        let color = PlateColor::from_argb(0xFF11_2233).with_alpha(0x40);
        assert_eq!(color.argb(), 0x4011_2233);
        assert_eq!(color.alpha(), 0x40);
        assert_eq!(color.to_string(), "#40112233");
    }

    #[test]
    fn test_defaults_when_missing() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("config.toml"));
        assert_eq!(config.plate.blur_amount, 20);
        assert!(config.plate.rounded_corners);
        assert_eq!(config.plate.plate_color().argb(), 0x8000_0000);
    }

    #[test]
    fn test_load_clamps_and_repairs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "[plate]\ncolor = \"not-a-color\"\nalpha = 16\nblur_amount = 90\n",
        )
        .unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.plate.blur_amount, 25);
        assert_eq!(config.plate.color, DEFAULT_PLATE_COLOR);
        assert_eq!(config.plate.plate_color().alpha(), 16);
    }

    #[test]
    fn test_invalid_toml_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[plate\nthis is not toml").unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.plate.blur_amount, DEFAULT_BLUR_AMOUNT);
    }

    #[test]
    fn test_parse_reports_toml_errors() {
        assert!(matches!(
            Config::parse("blur_amount = ["),
            Err(PrefsError::TomlParse(_))
        ));
        let config = Config::parse("[plate]\nrounded_corners = false\n").unwrap();
        assert!(!config.plate.rounded_corners);
        assert_eq!(config.plate.blur_amount, DEFAULT_BLUR_AMOUNT);
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.storage.path = Some(temp_dir.path().join("prefs.json"));
        config.plate.blur_amount = 12;

        config.save_to(&path).unwrap();
        let reloaded = Config::load_from(&path);
        assert_eq!(reloaded.plate.blur_amount, 12);
        assert_eq!(reloaded.preferences_path(), temp_dir.path().join("prefs.json"));
    }
}
