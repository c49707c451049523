// Keytap Event Types
// Raw key events exchanged between devices, resolvers and the output device

/// EV_SYN event type code from linux/input-event-codes.h
pub const EV_SYN: u16 = 0x00;

/// EV_KEY event type code from linux/input-event-codes.h
pub const EV_KEY: u16 = 0x01;

/// Number of key codes the output device advertises (0..=255)
pub const KEY_CODE_COUNT: u16 = 256;

/// A single EV_KEY event as read from a captured device.
///
/// `value` follows the kernel convention: 0 = release, 1 = press, 2 = repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: u16,
    pub value: i32,
}

impl KeyEvent {
    pub const RELEASE: i32 = 0;
    pub const PRESS: i32 = 1;
    pub const REPEAT: i32 = 2;

    pub fn new(code: u16, value: i32) -> Self {
        Self { code, value }
    }

    pub fn press(code: u16) -> Self {
        Self::new(code, Self::PRESS)
    }

    pub fn release(code: u16) -> Self {
        Self::new(code, Self::RELEASE)
    }

    /// Same event with a different key code, used when remapping.
    pub fn with_code(self, code: u16) -> Self {
        Self { code, ..self }
    }
}

/// Whether a raw event of `event_type` is forwarded to resolvers.
///
/// Everything else a keyboard reports (EV_SYN, EV_MSC scancodes, EV_LED)
/// is dropped at the device.
pub fn is_key_event(event_type: u16) -> bool {
    event_type == EV_KEY
}
