// Keytap Exit Statuses
// Process exit codes for unrecoverable conditions

/// Configuration could not be loaded, or the startup scan failed.
pub const STARTUP_FAILED: i32 = 1;

/// The virtual output device could not be opened or registered
/// (missing uinput support or insufficient privilege).
pub const OUTPUT_UNAVAILABLE: i32 = 2;

/// The hotplug watch could not be registered or returned a read error;
/// newly attached devices would no longer be seen.
pub const HOTPLUG_LOST: i32 = 3;
