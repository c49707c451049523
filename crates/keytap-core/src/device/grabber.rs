// Keytap Device Layer - Exclusive Grabber
// open -> read name -> arbitrate -> grab, for one device node

use super::{truncate_device_name, InputBackend, InputDevice};
use crate::grab::{GrabDecision, GrabRules};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A device that was opened and exclusively captured
pub struct Grabbed<D, M> {
    pub path: PathBuf,
    pub name: String,
    pub device: D,
    pub root: Arc<M>,
}

/// Try to take exclusive capture of the device at `path`.
///
/// Every failure is non-fatal and leaves the device unmanaged: open errors
/// and grab errors are logged, an ignore or no-match decision closes the
/// descriptor quietly. Nothing is retried.
pub fn try_grab<B, M>(backend: &B, path: &Path, rules: &GrabRules<M>) -> Option<Grabbed<B::Device, M>>
where
    B: InputBackend,
{
    let mut device = match backend.open(path) {
        Ok(device) => device,
        Err(e) => {
            log::warn!("{}: {}", path.display(), e);
            return None;
        }
    };

    let full_name = device.name().unwrap_or_default();
    let name = truncate_device_name(&full_name).to_string();

    let root = match rules.decide(&name) {
        GrabDecision::Grab { rule, root } => {
            log::debug!("{}: '{}' matched grab rule {}", path.display(), name, rule);
            root
        }
        GrabDecision::Ignore { rule } => {
            log::debug!("{}: '{}' ignored by rule {}", path.display(), name, rule);
            return None;
        }
        GrabDecision::NoMatch => {
            log::debug!("{}: '{}' matched no grab rule", path.display(), name);
            return None;
        }
    };

    if let Err(e) = device.grab() {
        log::warn!("{}: failed to grab '{}': {}", path.display(), name, e);
        return None;
    }

    log::info!("Grabbed {} ('{}')", path.display(), name);
    Some(Grabbed {
        path: path.to_path_buf(),
        name,
        device,
        root,
    })
}
