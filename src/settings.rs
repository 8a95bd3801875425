//! Persisted reader settings
//!
//! Stored as YAML under the user's config directory. Unknown keys are
//! ignored and missing keys take their defaults, so files written by older
//! versions keep loading; `version` drives explicit migrations.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::pdf::{
    CoverPage, FilterSet, LayoutMode, PageLayout, ReadingDirection, ResolutionTier, ScrollAxis,
};

pub const CURRENT_VERSION: u32 = 1;
const SETTINGS_FILENAME: &str = "config.yaml";
const APP_NAME: &str = "duopage";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot access settings file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed settings file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unknown setting `{0}`")]
    UnknownKey(String),

    #[error("invalid value `{value}` for `{key}`")]
    InvalidValue { key: String, value: String },

    #[error("could not determine the config directory")]
    NoConfigDir,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_true")]
    pub left_to_right: bool,

    #[serde(default = "default_true")]
    pub one_page_mode: bool,

    #[serde(default = "default_true")]
    pub cover_page_separate: bool,

    #[serde(default)]
    pub vertical_scroll: bool,

    #[serde(default)]
    pub landscape_orientation: bool,

    #[serde(default)]
    pub resolution: ResolutionTier,

    #[serde(default)]
    pub grayscale: bool,

    #[serde(default)]
    pub invert: bool,

    #[serde(default)]
    pub sepia: bool,

    #[serde(default)]
    pub sharpen: bool,

    /// Fingerprint of the document read last
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_document: Option<String>,

    /// 1-based page shown when the last document was closed, 0 if none
    #[serde(default)]
    pub last_page_number: usize,
}

fn default_true() -> bool {
    true
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            left_to_right: true,
            one_page_mode: true,
            cover_page_separate: true,
            vertical_scroll: false,
            landscape_orientation: false,
            resolution: ResolutionTier::Low,
            grayscale: false,
            invert: false,
            sepia: false,
            sharpen: false,
            last_document: None,
            last_page_number: 0,
        }
    }
}

impl Settings {
    /// Layout mode described by these settings
    #[must_use]
    pub fn layout_mode(&self) -> LayoutMode {
        let layout = if self.one_page_mode {
            PageLayout::Single
        } else if self.cover_page_separate {
            PageLayout::Spread(CoverPage::Separate)
        } else {
            PageLayout::Spread(CoverPage::Paired)
        };

        LayoutMode {
            layout,
            direction: if self.left_to_right {
                ReadingDirection::LeftToRight
            } else {
                ReadingDirection::RightToLeft
            },
            scroll: if self.vertical_scroll {
                ScrollAxis::Vertical
            } else {
                ScrollAxis::Horizontal
            },
            tier: self.resolution,
            filters: FilterSet {
                grayscale: self.grayscale,
                invert: self.invert,
                sepia: self.sepia,
                sharpen: self.sharpen,
            },
            landscape_rotated: self.landscape_orientation,
        }
    }

    /// Per-document state goes back to defaults when a new document is
    /// opened. Reading direction, resolution and sharpening are kept.
    pub fn reset_document_defaults(&mut self) {
        self.one_page_mode = true;
        self.last_page_number = 0;
        self.grayscale = false;
        self.invert = false;
        self.sepia = false;
        self.landscape_orientation = false;
    }

    /// Set a key by its YAML name from a string value
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let invalid = || SettingsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let flag = || parse_bool(value).ok_or_else(invalid);

        match key {
            "left_to_right" => self.left_to_right = flag()?,
            "one_page_mode" => self.one_page_mode = flag()?,
            "cover_page_separate" => self.cover_page_separate = flag()?,
            "vertical_scroll" => self.vertical_scroll = flag()?,
            "landscape_orientation" => self.landscape_orientation = flag()?,
            "grayscale" => self.grayscale = flag()?,
            "invert" => self.invert = flag()?,
            "sepia" => self.sepia = flag()?,
            "sharpen" => self.sharpen = flag()?,
            "resolution" => self.resolution = value.parse().map_err(|_| invalid())?,
            "last_page_number" => self.last_page_number = value.parse().map_err(|_| invalid())?,
            _ => return Err(SettingsError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Settings file location plus load/save
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/duopage/config.yaml`
    pub fn default_location() -> Result<Self, SettingsError> {
        dirs::config_dir()
            .map(|config| Self::new(config.join(APP_NAME).join(SETTINGS_FILENAME)))
            .ok_or(SettingsError::NoConfigDir)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, creating the file with defaults when it is missing
    pub fn load(&self) -> Result<Settings, SettingsError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("Settings file not found, creating with defaults at {:?}", self.path);
                let settings = Settings::default();
                self.save(&settings)?;
                return Ok(settings);
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        // An empty file deserializes to unit, not to a struct
        if content.trim().is_empty() {
            warn!("Settings file {:?} is empty, using defaults", self.path);
            return Ok(Settings::default());
        }

        let mut settings: Settings =
            serde_yaml::from_str(&content).map_err(|source| SettingsError::Parse {
                path: self.path.clone(),
                source,
            })?;
        debug!("Loaded settings from {:?}", self.path);

        if settings.version < CURRENT_VERSION {
            migrate_settings(&mut settings);
            self.save(&settings)?;
        }
        Ok(settings)
    }

    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let body = serde_yaml::to_string(settings).map_err(|source| SettingsError::Parse {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, format!("{SETTINGS_HEADER}{body}")).map_err(io_err)?;
        debug!("Saved settings to {:?}", self.path);
        Ok(())
    }
}

fn migrate_settings(settings: &mut Settings) {
    info!(
        "Migrating settings from v{} to v{}",
        settings.version, CURRENT_VERSION
    );

    // Future migrations go here:
    // if settings.version < 2 {
    //     migrate_v1_to_v2(settings);
    // }

    settings.version = CURRENT_VERSION;
}

const SETTINGS_HEADER: &str = r"# duopage settings
# resolution: LOW | MEDIUM | HIGH
# last_document / last_page_number are managed by the reader
";
