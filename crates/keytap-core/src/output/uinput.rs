// Keytap Output Layer - uinput Backend
// Virtual device registration through the evdev crate

use super::{OutputBackend, OutputCapabilities, OutputIdentity, OutputSink};
use crate::event::{KeyEvent, EV_KEY};
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, BusType, EventType, InputEvent, InputId, Key};
use std::io;

/// Registers the output device through /dev/uinput
#[derive(Debug, Default, Clone, Copy)]
pub struct UinputBackend;

impl OutputBackend for UinputBackend {
    fn create(
        &self,
        identity: &OutputIdentity,
        capabilities: &OutputCapabilities,
    ) -> io::Result<Box<dyn OutputSink>> {
        // EV_SYN is always enabled by uinput; EV_KEY comes with the key set
        if !capabilities.supports_event_type(EV_KEY) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "output device must declare key events",
            ));
        }

        let mut keys = AttributeSet::<Key>::new();
        for code in capabilities.keys() {
            keys.insert(Key::new(code));
        }

        let device = VirtualDeviceBuilder::new()?
            .name(identity.name.as_str())
            .input_id(InputId::new(
                BusType(identity.bus_type),
                identity.vendor,
                identity.product,
                identity.version,
            ))
            .with_keys(&keys)?
            .build()?;

        Ok(Box::new(UinputSink { device }))
    }
}

struct UinputSink {
    device: VirtualDevice,
}

impl OutputSink for UinputSink {
    fn write_key(&mut self, event: KeyEvent) -> io::Result<()> {
        self.device.emit(&key_report(event))
    }
}

/// Events written for one key; emit() terminates the batch with its own SYN_REPORT
fn key_report(event: KeyEvent) -> [InputEvent; 1] {
    [InputEvent::new(EventType::KEY, event.code, event.value)]
}
