// Keytap Device Manager
// Startup enumeration and hotplug handling feeding the keyboard registry

use crate::device::{is_event_node, try_grab, DeviceError, Grabbed, InputBackend};
use crate::grab::GrabRules;
use crate::hotplug::{read_created_nodes, HotplugError, WatchSource, BATCH_BUFFER_LEN};
use crate::output::Emitter;
use crate::registry::{KeyboardEntry, KeyboardRegistry};
use std::path::Path;
use std::sync::Arc;

/// Builds the resolver bound to a freshly grabbed device.
///
/// Called exactly once per successful grab, with the root map of the rule
/// that grabbed the device and a handle to the shared output device.
pub trait ResolverInit<M> {
    type Resolver;

    fn init(&mut self, root: Arc<M>, emitter: Emitter) -> Self::Resolver;
}

impl<M, R, F> ResolverInit<M> for F
where
    F: FnMut(Arc<M>, Emitter) -> R,
{
    type Resolver = R;

    fn init(&mut self, root: Arc<M>, emitter: Emitter) -> R {
        self(root, emitter)
    }
}

/// Owns the registry and everything needed to add devices to it
pub struct DeviceManager<B, M, I>
where
    B: InputBackend,
    I: ResolverInit<M>,
{
    backend: B,
    rules: GrabRules<M>,
    emitter: Emitter,
    resolvers: I,
    registry: KeyboardRegistry<B::Device, I::Resolver>,
    batch: Box<[u8]>,
}

impl<B, M, I> DeviceManager<B, M, I>
where
    B: InputBackend,
    I: ResolverInit<M>,
{
    pub fn new(backend: B, rules: GrabRules<M>, emitter: Emitter, resolvers: I, capacity: usize) -> Self {
        Self {
            backend,
            rules,
            emitter,
            resolvers,
            registry: KeyboardRegistry::new(capacity),
            batch: vec![0u8; BATCH_BUFFER_LEN].into_boxed_slice(),
        }
    }

    /// Scan the input directory and capture every matching event node.
    ///
    /// Returns how many devices were added. Nodes already in the registry
    /// are not reopened, so a second scan only picks up what is new.
    pub fn scan(&mut self) -> Result<usize, DeviceError> {
        let mut nodes = self
            .backend
            .list_nodes()
            .map_err(|source| DeviceError::ListNodes {
                dir: self.backend.input_dir().to_path_buf(),
                source,
            })?;
        nodes.retain(|name| is_event_node(name));
        // read_dir order is arbitrary; sorted order keeps capacity truncation predictable
        nodes.sort();

        let mut added = 0;
        for name in nodes {
            let path = self.backend.input_dir().join(&name);
            if self.registry.contains_path(&path) {
                log::debug!("{}: already captured", path.display());
                continue;
            }
            if self.attach(&path) {
                added += 1;
            }
        }
        log::info!(
            "Scan added {} device(s), {} of {} registry slots used",
            added,
            self.registry.len(),
            self.registry.capacity()
        );
        Ok(added)
    }

    /// Handle readability of the hotplug watch.
    ///
    /// Returns how many devices were added. An empty queue adds nothing; a
    /// read error is fatal. A creation record is always attempted, even for a
    /// path already in the registry: the kernel reuses node names, so such an
    /// entry belongs to a device that has since been unplugged.
    pub fn poll_hotplug<W>(&mut self, watch: &mut W) -> Result<usize, HotplugError>
    where
        W: WatchSource + ?Sized,
    {
        let names = read_created_nodes(watch, &mut self.batch)?;
        let mut added = 0;
        for name in names {
            let path = self.backend.input_dir().join(&name);
            log::debug!("New device node {}", path.display());
            if self.attach(&path) {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Grab one node and register it. Returns whether it was added.
    fn attach(&mut self, path: &Path) -> bool {
        if self.registry.is_full() {
            log::warn!(
                "{}: keyboard registry full ({} devices), not capturing",
                path.display(),
                self.registry.capacity()
            );
            return false;
        }

        let Some(Grabbed {
            path,
            name,
            device,
            root,
        }) = try_grab(&self.backend, path, &self.rules)
        else {
            return false;
        };

        let resolver = self.resolvers.init(root, self.emitter.clone());
        self.registry.insert(KeyboardEntry {
            path,
            name,
            device,
            resolver,
        })
    }

    pub fn registry(&self) -> &KeyboardRegistry<B::Device, I::Resolver> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut KeyboardRegistry<B::Device, I::Resolver> {
        &mut self.registry
    }
}
