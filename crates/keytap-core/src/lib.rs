// Keytap Core Library
// Device discovery, exclusive capture, hotplug tracking and virtual output

pub mod config;
pub mod device;
pub mod event;
pub mod exit;
pub mod grab;
pub mod hotplug;
pub mod manager;
pub mod output;
pub mod registry;

pub use config::{Config, ConfigError, KeyActionMap};
pub use device::{DeviceError, InputBackend, InputDevice};
pub use event::KeyEvent;
pub use grab::{GrabDecision, GrabRule, GrabRuleError, GrabRules};
pub use hotplug::{HotplugError, WatchSource};
pub use manager::{DeviceManager, ResolverInit};
pub use output::{
    create_output, Emitter, OutputBackend, OutputCapabilities, OutputError, OutputIdentity,
    OutputSink,
};
pub use registry::{KeyboardEntry, KeyboardId, KeyboardRegistry};

#[cfg(feature = "evdev")]
pub use device::evdev::{EvdevBackend, EvdevDevice};
#[cfg(feature = "evdev")]
pub use output::uinput::UinputBackend;
