// Keytap Configuration - TOML Parser
// Turns the config file into an ordered grab rule list

use super::KeyActionMap;
use crate::device::INPUT_DIR;
use crate::exit;
use crate::grab::{GrabRule, GrabRuleError, GrabRules};
use crate::registry::DEFAULT_CAPACITY;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the map used by the built-in default rules
pub const DEFAULT_KEYMAP: &str = "default";

/// Errors that can occur when loading the configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("grab rule {index}: {source}")]
    Pattern {
        index: usize,
        #[source]
        source: GrabRuleError,
    },

    #[error("grab rule {index} ('{pattern}') grabs but names no keymap")]
    MissingKeymap { index: usize, pattern: String },

    #[error("grab rule {index} ('{pattern}') refers to unknown keymap '{keymap}'")]
    UnknownKeymap {
        index: usize,
        pattern: String,
        keymap: String,
    },

    #[error("keymap '{keymap}': '{code}' is not a key code")]
    InvalidKeyCode { keymap: String, code: String },

    #[error("daemon.capacity must be at least 1")]
    ZeroCapacity,
}

impl ConfigError {
    pub fn exit_code(&self) -> i32 {
        exit::STARTUP_FAILED
    }
}

/// `[daemon]` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonSettings {
    /// Maximum number of captured keyboards
    pub capacity: usize,
    /// Directory scanned and watched for event nodes
    pub input_dir: PathBuf,
    /// Whether newly attached devices are picked up while running
    pub hotplug: bool,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            input_dir: PathBuf::from(INPUT_DIR),
            hotplug: true,
        }
    }
}

/// Loaded configuration: settings, root maps and the ordered grab rules
#[derive(Debug, Clone)]
pub struct Config {
    pub daemon: DaemonSettings,
    pub keymaps: IndexMap<String, Arc<KeyActionMap>>,
    pub rules: GrabRules<KeyActionMap>,
    source_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    #[serde(default)]
    daemon: DaemonToml,
    #[serde(default)]
    grab: Vec<GrabToml>,
    #[serde(default)]
    keymaps: IndexMap<String, IndexMap<String, u16>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DaemonToml {
    capacity: Option<usize>,
    input_dir: Option<PathBuf>,
    hotplug: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GrabToml {
    pattern: String,
    #[serde(default)]
    ignore: bool,
    keymap: Option<String>,
}

impl Config {
    /// Load the configuration from a TOML file
    pub fn from_toml_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Load the configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: ConfigToml =
            toml::from_str(content).map_err(|e| ConfigError::TomlParse(e.to_string()))?;

        let defaults = DaemonSettings::default();
        let daemon = DaemonSettings {
            capacity: raw.daemon.capacity.unwrap_or(defaults.capacity),
            input_dir: raw.daemon.input_dir.unwrap_or(defaults.input_dir),
            hotplug: raw.daemon.hotplug.unwrap_or(defaults.hotplug),
        };
        if daemon.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }

        let mut keymaps = IndexMap::new();
        for (name, entries) in raw.keymaps {
            let mut remaps = IndexMap::new();
            for (code, target) in entries {
                let from: u16 = code.trim().parse().map_err(|_| ConfigError::InvalidKeyCode {
                    keymap: name.clone(),
                    code: code.clone(),
                })?;
                remaps.insert(from, target);
            }
            keymaps.insert(name.clone(), Arc::new(KeyActionMap::with_remaps(name, remaps)));
        }

        let mut rules = Vec::with_capacity(raw.grab.len());
        for (index, grab) in raw.grab.into_iter().enumerate() {
            let compiled = if grab.ignore {
                if grab.keymap.is_some() {
                    log::warn!(
                        "grab rule {} ('{}') ignores devices, its keymap is unused",
                        index,
                        grab.pattern
                    );
                }
                GrabRule::ignore(&grab.pattern)
            } else {
                let keymap_name = grab.keymap.ok_or_else(|| ConfigError::MissingKeymap {
                    index,
                    pattern: grab.pattern.clone(),
                })?;
                let root = keymaps
                    .get(&keymap_name)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownKeymap {
                        index,
                        pattern: grab.pattern.clone(),
                        keymap: keymap_name.clone(),
                    })?;
                GrabRule::grab(&grab.pattern, root)
            };
            rules.push(compiled.map_err(|source| ConfigError::Pattern { index, source })?);
        }

        Ok(Self {
            daemon,
            keymaps,
            rules: GrabRules::new(rules),
            source_path: None,
        })
    }

    /// Built-in rules used when no config file exists: skip our own virtual
    /// device, grab anything calling itself a keyboard, remap nothing.
    pub fn builtin() -> Self {
        let root = Arc::new(KeyActionMap::new(DEFAULT_KEYMAP));
        let mut keymaps = IndexMap::new();
        keymaps.insert(DEFAULT_KEYMAP.to_string(), Arc::clone(&root));

        let mut rules = Vec::new();
        if let Ok(rule) = GrabRule::ignore("^keytap$") {
            rules.push(rule);
        }
        if let Ok(rule) = GrabRule::grab("(?i)keyboard", root) {
            rules.push(rule);
        }

        Self {
            daemon: DaemonSettings::default(),
            keymaps,
            rules: GrabRules::new(rules),
            source_path: None,
        }
    }

    /// Load from `path` if given, else from the default path if it exists,
    /// else fall back to [`Config::builtin`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::from_toml_path(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_toml_path(path),
            _ => Ok(Self::builtin()),
        }
    }

    /// Get the default config path (~/.config/keytap/config.toml)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("keytap").join("config.toml"))
    }

    /// File this config was read from, if any
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }
}
