// Keytap Configuration
// TOML loading of daemon settings, root key-action maps and grab rules

mod keymap;
pub mod parser;

pub use keymap::KeyActionMap;
pub use parser::{Config, ConfigError, DaemonSettings};
