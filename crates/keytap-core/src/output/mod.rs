// Keytap Output Layer
// The single virtual keyboard every resolver injects events through

#[cfg(feature = "evdev")]
pub mod uinput;

use crate::event::{KeyEvent, EV_KEY, EV_SYN, KEY_CODE_COUNT};
use crate::exit;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::io;
use std::sync::Arc;

/// BUS_USB from linux/input.h
pub const BUS_USB: u16 = 0x03;

/// Errors for output device operations
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("Failed to create virtual device through /dev/uinput: {0}")]
    Unavailable(#[source] io::Error),

    #[error("Failed to write event: {0}")]
    Write(#[source] io::Error),
}

impl OutputError {
    /// Process exit status for this failure
    pub fn exit_code(&self) -> i32 {
        exit::OUTPUT_UNAVAILABLE
    }
}

/// Identity the virtual device is registered with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputIdentity {
    pub name: String,
    pub bus_type: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

impl Default for OutputIdentity {
    fn default() -> Self {
        Self {
            name: "keytap".to_string(),
            bus_type: BUS_USB,
            vendor: 0x1111,
            product: 0x0001,
            version: 1,
        }
    }
}

/// Event types and key codes the virtual device declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputCapabilities {
    event_types: BTreeSet<u16>,
    keys: BTreeSet<u16>,
}

impl OutputCapabilities {
    /// Key and synchronization events, every key code from 0 to 255
    pub fn full_keyboard() -> Self {
        Self {
            event_types: [EV_SYN, EV_KEY].into_iter().collect(),
            keys: (0..KEY_CODE_COUNT).collect(),
        }
    }

    pub fn supports_event_type(&self, event_type: u16) -> bool {
        self.event_types.contains(&event_type)
    }

    pub fn supports_key(&self, code: u16) -> bool {
        self.keys.contains(&code)
    }

    pub fn keys(&self) -> impl Iterator<Item = u16> + '_ {
        self.keys.iter().copied()
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }
}

impl Default for OutputCapabilities {
    fn default() -> Self {
        Self::full_keyboard()
    }
}

/// A registered virtual device that accepts key events
pub trait OutputSink: Send {
    /// Write one key event as its own report
    fn write_key(&mut self, event: KeyEvent) -> io::Result<()>;
}

/// Something that can register a virtual device with the kernel
pub trait OutputBackend {
    fn create(
        &self,
        identity: &OutputIdentity,
        capabilities: &OutputCapabilities,
    ) -> io::Result<Box<dyn OutputSink>>;
}

/// Shared handle to the one output device.
///
/// Cloning shares the same device; writes are serialized by the lock so
/// resolvers may hold clones freely.
#[derive(Clone)]
pub struct Emitter {
    sink: Arc<Mutex<Box<dyn OutputSink>>>,
    identity: Arc<OutputIdentity>,
    capabilities: Arc<OutputCapabilities>,
}

impl Emitter {
    pub fn emit(&self, event: KeyEvent) -> Result<(), OutputError> {
        self.sink.lock().write_key(event).map_err(OutputError::Write)
    }

    /// Emit a sequence while holding the device, so no other writer interleaves
    pub fn emit_all(&self, events: &[KeyEvent]) -> Result<(), OutputError> {
        let mut sink = self.sink.lock();
        for event in events {
            sink.write_key(*event).map_err(OutputError::Write)?;
        }
        Ok(())
    }

    /// Capability set the device was registered with
    pub fn capabilities(&self) -> &OutputCapabilities {
        &self.capabilities
    }
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("identity", &self.identity)
            .field("keys", &self.capabilities.key_count())
            .finish()
    }
}

/// Register the keytap virtual keyboard.
///
/// Failure is fatal for the daemon; see [`OutputError::exit_code`].
pub fn create_output<B: OutputBackend>(backend: &B) -> Result<Emitter, OutputError> {
    let identity = OutputIdentity::default();
    let capabilities = OutputCapabilities::full_keyboard();
    let sink = backend
        .create(&identity, &capabilities)
        .map_err(OutputError::Unavailable)?;
    log::info!(
        "Created virtual device '{}' ({:04x}:{:04x}, {} keys)",
        identity.name,
        identity.vendor,
        identity.product,
        capabilities.key_count()
    );
    Ok(Emitter {
        sink: Arc::new(Mutex::new(sink)),
        identity: Arc::new(identity),
        capabilities: Arc::new(capabilities),
    })
}
