// Keytap Device Layer - evdev Backend
// Real device nodes under /dev/input, via the evdev crate

use super::{InputBackend, InputDevice, INPUT_DIR};
use crate::event::{is_key_event, KeyEvent};
use evdev::Device;
use std::ffi::OsString;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

/// Backend over a directory of evdev nodes
#[derive(Debug, Clone)]
pub struct EvdevBackend {
    input_dir: PathBuf,
}

impl EvdevBackend {
    pub fn new<P: Into<PathBuf>>(input_dir: P) -> Self {
        Self {
            input_dir: input_dir.into(),
        }
    }
}

impl Default for EvdevBackend {
    fn default() -> Self {
        Self::new(INPUT_DIR)
    }
}

impl InputBackend for EvdevBackend {
    type Device = EvdevDevice;

    fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    fn list_nodes(&self) -> io::Result<Vec<OsString>> {
        std::fs::read_dir(&self.input_dir)?
            .map(|entry| entry.map(|e| e.file_name()))
            .collect()
    }

    fn open(&self, path: &Path) -> io::Result<EvdevDevice> {
        Device::open(path).map(|device| EvdevDevice { device })
    }
}

/// An open evdev node
pub struct EvdevDevice {
    device: Device,
}

impl InputDevice for EvdevDevice {
    fn name(&self) -> Option<String> {
        self.device.name().map(str::to_string)
    }

    fn grab(&mut self) -> io::Result<()> {
        self.device.grab()
    }

    fn read_events(&mut self) -> io::Result<Vec<KeyEvent>> {
        let events = self
            .device
            .fetch_events()?
            .filter(|event| is_key_event(event.event_type().0))
            .map(|event| KeyEvent::new(event.code(), event.value()))
            .collect();
        Ok(events)
    }
}

impl AsRawFd for EvdevDevice {
    fn as_raw_fd(&self) -> RawFd {
        self.device.as_raw_fd()
    }
}
