// Keytap Device Layer
// Platform abstraction over input device nodes, plus exclusive capture

#[cfg(feature = "evdev")]
pub mod evdev;
mod grabber;

pub use grabber::{try_grab, Grabbed};

use crate::event::KeyEvent;
use std::ffi::{OsStr, OsString};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

/// Directory holding the evdev device nodes
pub const INPUT_DIR: &str = "/dev/input";

/// Only nodes whose file name starts with this are considered
pub const EVENT_NODE_PREFIX: &str = "event";

/// Size of the buffer the kernel copies a device name into, NUL included.
///
/// Longer names are cut to `NAME_BUFFER_LEN - 1` bytes before arbitration,
/// so two devices sharing a long prefix can be told apart only by a pattern
/// that matches within it.
pub const NAME_BUFFER_LEN: usize = 256;

/// Errors from the device layer
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Failed to list input devices in {dir}: {source}")]
    ListNodes {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// An opened input device node.
///
/// Dropping the value closes the descriptor, which also releases any grab.
pub trait InputDevice {
    /// Human-readable device name, or `None` if the kernel reports none
    fn name(&self) -> Option<String>;

    /// Request exclusive capture of the device
    fn grab(&mut self) -> io::Result<()>;

    /// Drain the key events currently queued on the device
    fn read_events(&mut self) -> io::Result<Vec<KeyEvent>>;
}

/// Access to the input device directory
pub trait InputBackend {
    type Device: InputDevice;

    /// Directory the device nodes live in
    fn input_dir(&self) -> &Path;

    /// File names currently present in the input directory, unfiltered
    fn list_nodes(&self) -> io::Result<Vec<OsString>>;

    /// Open a device node for reading and writing
    fn open(&self, path: &Path) -> io::Result<Self::Device>;
}

/// Check whether a directory entry is an evdev event node (`event0`, `event12`, ...)
pub fn is_event_node(file_name: &OsStr) -> bool {
    file_name.as_bytes().starts_with(EVENT_NODE_PREFIX.as_bytes())
}

/// Cut a device name the way the fixed-size kernel name buffer does.
///
/// The cut lands on a UTF-8 boundary at or below `NAME_BUFFER_LEN - 1` bytes.
pub fn truncate_device_name(name: &str) -> &str {
    let limit = NAME_BUFFER_LEN - 1;
    if name.len() <= limit {
        return name;
    }
    let mut end = limit;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}
