// Shared fakes for the integration tests: an in-memory input directory,
// a recording output backend and a scripted hotplug watch.

#![allow(dead_code)]

use keytap_core::{
    InputBackend, InputDevice, KeyEvent, OutputBackend, OutputCapabilities, OutputIdentity,
    OutputSink, WatchSource,
};
use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

pub const FAKE_INPUT_DIR: &str = "/fake/input";

/// Something the fake backend was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Open(PathBuf),
    Grab(PathBuf),
    Close(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct FakeNode {
    pub name: Option<String>,
    pub open_error: Option<io::ErrorKind>,
    pub grab_busy: bool,
    pub events: Vec<KeyEvent>,
}

impl FakeNode {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn busy(mut self) -> Self {
        self.grab_busy = true;
        self
    }

    pub fn unopenable(mut self, kind: io::ErrorKind) -> Self {
        self.open_error = Some(kind);
        self
    }

    pub fn with_events(mut self, events: Vec<KeyEvent>) -> Self {
        self.events = events;
        self
    }
}

#[derive(Clone)]
pub struct FakeBackend {
    dir: PathBuf,
    nodes: Rc<RefCell<BTreeMap<OsString, FakeNode>>>,
    ops: Rc<RefCell<Vec<Op>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            dir: PathBuf::from(FAKE_INPUT_DIR),
            nodes: Rc::default(),
            ops: Rc::default(),
        }
    }

    pub fn with_node(self, file_name: &str, node: FakeNode) -> Self {
        self.add_node(file_name, node);
        self
    }

    /// Make a node appear, as if just plugged in
    pub fn add_node(&self, file_name: &str, node: FakeNode) {
        self.nodes.borrow_mut().insert(OsString::from(file_name), node);
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.borrow().clone()
    }

    pub fn opened(&self) -> Vec<PathBuf> {
        self.ops
            .borrow()
            .iter()
            .filter_map(|op| match op {
                Op::Open(path) => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn closed(&self) -> Vec<PathBuf> {
        self.ops
            .borrow()
            .iter()
            .filter_map(|op| match op {
                Op::Close(path) => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn node_path(file_name: &str) -> PathBuf {
        Path::new(FAKE_INPUT_DIR).join(file_name)
    }
}

impl InputBackend for FakeBackend {
    type Device = FakeDevice;

    fn input_dir(&self) -> &Path {
        &self.dir
    }

    fn list_nodes(&self) -> io::Result<Vec<OsString>> {
        Ok(self.nodes.borrow().keys().cloned().collect())
    }

    fn open(&self, path: &Path) -> io::Result<FakeDevice> {
        self.ops.borrow_mut().push(Op::Open(path.to_path_buf()));
        let file_name = path
            .file_name()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        let node = self
            .nodes
            .borrow()
            .get(file_name)
            .cloned()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))?;
        if let Some(kind) = node.open_error {
            return Err(io::Error::from(kind));
        }
        Ok(FakeDevice {
            path: path.to_path_buf(),
            node,
            ops: Rc::clone(&self.ops),
        })
    }
}

pub struct FakeDevice {
    pub path: PathBuf,
    node: FakeNode,
    ops: Rc<RefCell<Vec<Op>>>,
}

impl InputDevice for FakeDevice {
    fn name(&self) -> Option<String> {
        self.node.name.clone()
    }

    fn grab(&mut self) -> io::Result<()> {
        self.ops.borrow_mut().push(Op::Grab(self.path.clone()));
        if self.node.grab_busy {
            return Err(io::Error::from_raw_os_error(16)); // EBUSY
        }
        Ok(())
    }

    fn read_events(&mut self) -> io::Result<Vec<KeyEvent>> {
        Ok(std::mem::take(&mut self.node.events))
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.ops.borrow_mut().push(Op::Close(self.path.clone()));
    }
}

/// Output backend that records what it was asked to register and what is written
#[derive(Clone, Default)]
pub struct RecordingOutput {
    pub registered: Arc<Mutex<Vec<(OutputIdentity, OutputCapabilities)>>>,
    pub written: Arc<Mutex<Vec<KeyEvent>>>,
}

struct RecordingSink {
    written: Arc<Mutex<Vec<KeyEvent>>>,
}

impl OutputSink for RecordingSink {
    fn write_key(&mut self, event: KeyEvent) -> io::Result<()> {
        self.written.lock().push(event);
        Ok(())
    }
}

impl OutputBackend for RecordingOutput {
    fn create(
        &self,
        identity: &OutputIdentity,
        capabilities: &OutputCapabilities,
    ) -> io::Result<Box<dyn OutputSink>> {
        self.registered
            .lock()
            .push((identity.clone(), capabilities.clone()));
        Ok(Box::new(RecordingSink {
            written: Arc::clone(&self.written),
        }))
    }
}

/// Watch source that replays scripted read results
#[derive(Default)]
pub struct ScriptedWatch {
    reads: VecDeque<io::Result<Vec<u8>>>,
}

impl ScriptedWatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_batch(&mut self, batch: Vec<u8>) {
        self.reads.push_back(Ok(batch));
    }

    pub fn push_error(&mut self, kind: io::ErrorKind) {
        self.reads.push_back(Err(io::Error::from(kind)));
    }
}

impl WatchSource for ScriptedWatch {
    fn read_batch(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reads.pop_front() {
            Some(Ok(batch)) => {
                let len = batch.len().min(buf.len());
                buf[..len].copy_from_slice(&batch[..len]);
                Ok(len)
            }
            Some(Err(e)) => Err(e),
            None => Err(io::Error::from(io::ErrorKind::WouldBlock)),
        }
    }
}

/// IN_CREATE from sys/inotify.h
pub const IN_CREATE: u32 = 0x100;

/// Encode one record the way the kernel lays it out: 16-byte header, then
/// the name NUL-padded to `name_len` bytes.
pub fn encode_record(mask: u32, name: &str, name_len: usize) -> Vec<u8> {
    assert!(name_len > name.len() || (name.is_empty() && name_len == 0));
    let mut record = Vec::with_capacity(16 + name_len);
    record.extend_from_slice(&1i32.to_ne_bytes());
    record.extend_from_slice(&mask.to_ne_bytes());
    record.extend_from_slice(&0u32.to_ne_bytes());
    record.extend_from_slice(&(name_len as u32).to_ne_bytes());
    record.extend_from_slice(name.as_bytes());
    record.resize(16 + name_len, 0);
    record
}

/// Kernel-style creation record with the name padded to a 16-byte boundary
pub fn creation_record(name: &str) -> Vec<u8> {
    let padded = (name.len() + 1).div_ceil(16) * 16;
    encode_record(IN_CREATE, name, padded)
}
