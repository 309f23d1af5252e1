//! Illusory configuration system
//!
//! Loads the global options tier from `illusory.toml`, with environment
//! variables as overrides.
//!
//! ```toml
//! [transition]
//! duration = "450ms"
//! easing = "cubic-bezier(0.4, 0, 0.2, 1)"
//! z_index = 10
//!
//! [clone]
//! ignore_transparency = ["img", "video"]
//! preserve_data_attributes = ["data-testid"]
//! ```

use std::path::{Path, PathBuf};

use illusory_core::options::{DEFAULT_DURATION, DEFAULT_EASING, DEFAULT_Z_INDEX};
use illusory_core::{DataAttributes, IgnoreTransparency, Options};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE: &str = "illusory.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct IllusoryConfig {
    /// Timing and stacking of the animated clones
    pub transition: TransitionConfig,
    /// How clones are built from natural elements
    pub clone: CloneConfig,
    /// Demo binary settings
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransitionConfig {
    /// CSS time, e.g. "300ms" or "0.3s"
    pub duration: String,
    /// CSS timing function
    pub easing: String,
    /// Stacking of the "from" clone; the "to" clone sits one above
    pub z_index: i32,
    /// Only animate transform and opacity
    pub composite_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CloneConfig {
    /// Deep clone (true) or the element alone (false)
    pub include_children: bool,
    /// `true`, `false`, or a list of tag names that never cross-fade
    pub ignore_transparency: Toggle,
    /// `true`, `false`, or a list of `data-*` attribute names to keep
    pub preserve_data_attributes: Toggle,
    /// Compensating scale for transformed ancestors
    pub natural_to_clone_scale: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct DemoConfig {
    /// Scene to run (card-to-modal, list-to-detail)
    pub scene: Option<String>,
}

/// A switch that can also be narrowed to a list of names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Toggle {
    Flag(bool),
    Names(Vec<String>),
}

impl Default for Toggle {
    fn default() -> Self {
        Self::Flag(false)
    }
}

impl Toggle {
    fn from_env(value: &str) -> Self {
        match parse_flag(value) {
            Some(flag) => Self::Flag(flag),
            None => Self::Names(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
        }
    }

    pub fn to_ignore_transparency(&self) -> IgnoreTransparency {
        match self {
            Self::Flag(flag) => IgnoreTransparency::from(*flag),
            Self::Names(tags) => IgnoreTransparency::Tags(tags.clone()),
        }
    }

    pub fn to_data_attributes(&self) -> DataAttributes {
        match self {
            Self::Flag(flag) => DataAttributes::from(*flag),
            Self::Names(names) => {
                let names = names.clone();
                DataAttributes::filter(move |name| names.iter().any(|keep| keep == name))
            }
        }
    }
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            duration: DEFAULT_DURATION.to_string(),
            easing: DEFAULT_EASING.to_string(),
            z_index: DEFAULT_Z_INDEX,
            composite_only: false,
        }
    }
}

impl Default for CloneConfig {
    fn default() -> Self {
        Self {
            include_children: true,
            ignore_transparency: Toggle::default(),
            preserve_data_attributes: Toggle::default(),
            natural_to_clone_scale: 1.0,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim() {
        "1" => Some(true),
        "0" => Some(false),
        v if v.eq_ignore_ascii_case("true") => Some(true),
        v if v.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

fn env_flag(key: &str, target: &mut bool) {
    if let Ok(val) = std::env::var(key) {
        match parse_flag(&val) {
            Some(flag) => *target = flag,
            None => warn!(key, value = %val, "ignoring non-boolean environment override"),
        }
    }
}

impl IllusoryConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `illusory.toml` from the current directory, or defaults if it is
    /// missing or invalid
    pub fn load_or_default() -> Self {
        match Self::load_from_file(CONFIG_FILE) {
            Ok(config) => config,
            Err(ConfigError::Read { .. }) => Self::default(),
            Err(err) => {
                warn!(error = %err, "using default configuration");
                Self::default()
            }
        }
    }

    /// Merge configuration with environment variables
    ///
    /// Environment variables take precedence over configuration file values.
    pub fn merge_with_env(&mut self) {
        // Transition settings
        if let Ok(duration) = std::env::var("ILLUSORY_DURATION") {
            self.transition.duration = duration;
        }
        if let Ok(easing) = std::env::var("ILLUSORY_EASING") {
            self.transition.easing = easing;
        }
        if let Ok(val) = std::env::var("ILLUSORY_Z_INDEX") {
            match val.trim().parse::<i32>() {
                Ok(z_index) => self.transition.z_index = z_index,
                Err(_) => warn!(value = %val, "ignoring invalid ILLUSORY_Z_INDEX"),
            }
        }
        env_flag("ILLUSORY_COMPOSITE_ONLY", &mut self.transition.composite_only);

        // Clone settings
        env_flag("ILLUSORY_INCLUDE_CHILDREN", &mut self.clone.include_children);
        if let Ok(val) = std::env::var("ILLUSORY_IGNORE_TRANSPARENCY") {
            self.clone.ignore_transparency = Toggle::from_env(&val);
        }
        if let Ok(val) = std::env::var("ILLUSORY_PRESERVE_DATA_ATTRIBUTES") {
            self.clone.preserve_data_attributes = Toggle::from_env(&val);
        }
        if let Ok(val) = std::env::var("ILLUSORY_NATURAL_TO_CLONE_SCALE") {
            match val.trim().parse::<f64>() {
                Ok(scale) if scale.is_finite() && scale > 0.0 => {
                    self.clone.natural_to_clone_scale = scale;
                }
                _ => warn!(value = %val, "ignoring invalid ILLUSORY_NATURAL_TO_CLONE_SCALE"),
            }
        }

        // Demo settings
        if let Ok(scene) = std::env::var("ILLUSORY_DEMO_SCENE") {
            self.demo.scene = Some(scene);
        }
    }

    /// Load configuration with environment variable overrides
    ///
    /// 1. Load from illusory.toml (or use defaults if not found)
    /// 2. Override with environment variables if present
    pub fn load() -> Self {
        let mut config = Self::load_or_default();
        config.merge_with_env();
        config
    }

    /// The global options tier described by this configuration.
    pub fn to_options(&self) -> Options {
        Options::new()
            .with_duration(self.transition.duration.clone())
            .with_easing(self.transition.easing.clone())
            .with_z_index(self.transition.z_index)
            .with_composite_only(self.transition.composite_only)
            .with_include_children(self.clone.include_children)
            .with_ignore_transparency(self.clone.ignore_transparency.to_ignore_transparency())
            .with_preserve_data_attributes(self.clone.preserve_data_attributes.to_data_attributes())
            .with_natural_to_clone_scale(self.clone.natural_to_clone_scale)
    }
}
