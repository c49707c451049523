// Keytap Hotplug Layer
// Watches the input directory for newly created device nodes

pub mod inotify;
pub mod record;

pub use inotify::InotifyWatch;
pub use record::{RecordError, Records, WatchRecord};

use crate::device::is_event_node;
use crate::exit;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

/// Size of the buffer one batch of records is read into
pub const BATCH_BUFFER_LEN: usize = 4096;

/// Unrecoverable hotplug failures; see [`HotplugError::exit_code`]
#[derive(Debug, thiserror::Error)]
pub enum HotplugError {
    #[error("Failed to watch {dir}: {source}")]
    Setup {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read hotplug events: {0}")]
    WatchRead(#[source] io::Error),
}

impl HotplugError {
    /// Process exit status: hotplug visibility is gone for good
    pub fn exit_code(&self) -> i32 {
        exit::HOTPLUG_LOST
    }
}

/// A non-blocking source of directory-change record batches
pub trait WatchSource {
    /// Read one batch into `buf`, returning the number of bytes filled.
    ///
    /// `WouldBlock` means no records are pending right now.
    fn read_batch(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Read one batch from `source` and return the names of newly created
/// event nodes, in record order.
///
/// An empty queue (or an interrupted read) yields no names. Any other read
/// error is fatal. A malformed record is logged and ends the batch; names
/// parsed before it are still returned.
pub fn read_created_nodes<W>(source: &mut W, buf: &mut [u8]) -> Result<Vec<OsString>, HotplugError>
where
    W: WatchSource + ?Sized,
{
    let len = match source.read_batch(buf) {
        Ok(len) => len,
        Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
            return Ok(Vec::new());
        }
        Err(e) => return Err(HotplugError::WatchRead(e)),
    };

    let mut names = Vec::new();
    for record in Records::new(&buf[..len]) {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Discarding rest of hotplug batch: {}", e);
                break;
            }
        };

        if record.is_overflow() {
            log::warn!("Hotplug queue overflowed, some new devices were missed");
            continue;
        }
        if !record.is_file_creation() || !is_event_node(record.name) {
            log::debug!("Skipping hotplug record {:?} (mask {:#x})", record.name, record.mask);
            continue;
        }
        names.push(record.name.to_os_string());
    }
    Ok(names)
}
