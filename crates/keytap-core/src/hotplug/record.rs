// Keytap Hotplug Layer - Record Parsing
// Walks a batch of variable-length inotify records

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;

/// Size of the fixed record header: wd, mask, cookie, len (4 bytes each)
pub const RECORD_HEADER_LEN: usize = 16;

/// IN_CREATE from sys/inotify.h
pub const IN_CREATE: u32 = 0x0000_0100;

/// IN_Q_OVERFLOW: the kernel queue overflowed and events were lost
pub const IN_Q_OVERFLOW: u32 = 0x0000_4000;

/// IN_ISDIR: the subject of the event is a directory
pub const IN_ISDIR: u32 = 0x4000_0000;

/// Malformed batch errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("record header at offset {offset} truncated ({remaining} bytes left)")]
    TruncatedHeader { offset: usize, remaining: usize },

    #[error("record name at offset {offset} declares {declared} bytes, only {remaining} left")]
    TruncatedName {
        offset: usize,
        declared: usize,
        remaining: usize,
    },
}

/// One directory-change record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchRecord<'a> {
    pub watch: i32,
    pub mask: u32,
    pub cookie: u32,
    /// File name relative to the watched directory; empty for records
    /// about the directory itself
    pub name: &'a OsStr,
}

impl WatchRecord<'_> {
    /// A new non-directory entry appeared in the watched directory
    pub fn is_file_creation(&self) -> bool {
        self.mask & IN_CREATE != 0 && self.mask & IN_ISDIR == 0
    }

    pub fn is_overflow(&self) -> bool {
        self.mask & IN_Q_OVERFLOW != 0
    }
}

/// Iterator over the records of one read batch.
///
/// Each record starts right after the previous record's padded name. A
/// malformed record yields one error and ends the iteration, since nothing
/// after it can be located.
#[derive(Debug, Clone)]
pub struct Records<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Records<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    fn field(&self, at: usize) -> [u8; 4] {
        let start = self.offset + at;
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.buf[start..start + 4]);
        bytes
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = Result<WatchRecord<'a>, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        let buf = self.buf;
        let remaining = buf.len() - self.offset;
        if remaining == 0 {
            return None;
        }
        if remaining < RECORD_HEADER_LEN {
            let offset = self.offset;
            self.offset = self.buf.len();
            return Some(Err(RecordError::TruncatedHeader { offset, remaining }));
        }

        let watch = i32::from_ne_bytes(self.field(0));
        let mask = u32::from_ne_bytes(self.field(4));
        let cookie = u32::from_ne_bytes(self.field(8));
        let declared = u32::from_ne_bytes(self.field(12)) as usize;

        let name_start = self.offset + RECORD_HEADER_LEN;
        let name_left = self.buf.len() - name_start;
        if declared > name_left {
            let offset = self.offset;
            self.offset = self.buf.len();
            return Some(Err(RecordError::TruncatedName {
                offset,
                declared,
                remaining: name_left,
            }));
        }

        let raw_name = &buf[name_start..name_start + declared];
        // Name is NUL-terminated and NUL-padded up to `declared`
        let name_len = raw_name.iter().position(|&b| b == 0).unwrap_or(declared);
        self.offset = name_start + declared;

        Some(Ok(WatchRecord {
            watch,
            mask,
            cookie,
            name: OsStr::from_bytes(&raw_name[..name_len]),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(mask: u32, name: &str, padded_len: usize) -> Vec<u8> {
        let mut record = Vec::new();
        record.extend_from_slice(&1i32.to_ne_bytes());
        record.extend_from_slice(&mask.to_ne_bytes());
        record.extend_from_slice(&0u32.to_ne_bytes());
        record.extend_from_slice(&(padded_len as u32).to_ne_bytes());
        let mut name_bytes = name.as_bytes().to_vec();
        name_bytes.resize(padded_len, 0);
        record.extend_from_slice(&name_bytes);
        record
    }

    #[test]
    fn test_two_consecutive_records() {
        let mut batch = encode(IN_CREATE, "event10", 16);
        batch.extend(encode(IN_CREATE, "event11", 32));

        let names: Vec<_> = Records::new(&batch)
            .map(|r| r.unwrap().name.to_os_string())
            .collect();
        assert_eq!(names, vec!["event10", "event11"]);
    }

    #[test]
    fn test_record_without_name() {
        let batch = encode(IN_Q_OVERFLOW, "", 0);
        let record = Records::new(&batch).next().unwrap().unwrap();
        assert!(record.name.is_empty());
        assert!(record.is_overflow());
        assert!(!record.is_file_creation());
    }

    #[test]
    fn test_directory_creation_is_not_file_creation() {
        let batch = encode(IN_CREATE | IN_ISDIR, "by-id", 16);
        let record = Records::new(&batch).next().unwrap().unwrap();
        assert!(!record.is_file_creation());
    }

    #[test]
    fn test_truncated_header() {
        let mut batch = encode(IN_CREATE, "event3", 16);
        batch.extend_from_slice(&[0u8; 7]);

        let results: Vec<_> = Records::new(&batch).collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().name, "event3");
        assert_eq!(
            results[1],
            Err(RecordError::TruncatedHeader {
                offset: 32,
                remaining: 7
            })
        );
    }

    #[test]
    fn test_name_longer_than_batch() {
        let mut batch = encode(IN_CREATE, "event3", 16);
        batch.truncate(RECORD_HEADER_LEN + 4);

        let mut records = Records::new(&batch);
        assert_eq!(
            records.next(),
            Some(Err(RecordError::TruncatedName {
                offset: 0,
                declared: 16,
                remaining: 4
            }))
        );
        assert_eq!(records.next(), None);
    }

    #[test]
    fn test_empty_batch() {
        assert_eq!(Records::new(&[]).next(), None);
    }
}
