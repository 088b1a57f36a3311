//! Node lookup and property access
//!
//! Thin, total wrappers over [`DeviceTree`]: failures are logged at trace
//! level and turned into "absent" values. A node that cannot be located is
//! simply not connected right now.

use crate::error::HostError;
use crate::host::{DeviceProperty, DeviceTree, NodeHandle};
use tracing::trace;

/// Result of resolving a stable path against the live tree.
#[derive(Debug)]
pub struct Located {
    /// Node reports a fully started state
    pub connected: bool,
    /// `None` when the path did not resolve
    pub handle: Option<NodeHandle>,
}

/// Resolve `stable_path` to its live node and report whether it is started.
pub fn locate(tree: &dyn DeviceTree, stable_path: &str) -> Located {
    let handle = match tree.locate(stable_path) {
        Ok(handle) => handle,
        Err(e) => {
            trace!("{} not present: {}", stable_path, e);
            return Located {
                connected: false,
                handle: None,
            };
        }
    };

    let connected = match tree.status(&handle) {
        Ok(status) => {
            trace!(
                "{} status: started={} problem={}",
                stable_path, status.started, status.problem
            );
            status.started
        }
        Err(e) => {
            trace!("{} status query failed: {}", stable_path, e);
            false
        }
    };

    Located {
        connected,
        handle: Some(handle),
    }
}

/// Read a string property, empty when absent or the handle went stale.
pub fn property(tree: &dyn DeviceTree, node: &NodeHandle, key: DeviceProperty) -> String {
    // First call only sizes the buffer
    let required = match tree.property(node, key, &mut []) {
        // Fits in zero bytes: the value is empty
        Ok(_) => return String::new(),
        Err(HostError::BufferTooSmall { required }) => required,
        Err(e) => {
            trace!("node {} has no {:?}: {}", node.raw(), key, e);
            return String::new();
        }
    };

    let mut buf = vec![0u8; required];
    match tree.property(node, key, &mut buf) {
        Ok(len) => decode_utf16(&buf[..len.min(buf.len())]),
        Err(e) => {
            trace!("node {} {:?} read failed: {}", node.raw(), key, e);
            String::new()
        }
    }
}

/// Immediate ancestor of `node`, `None` at the root or on failure.
pub fn parent(tree: &dyn DeviceTree, node: &NodeHandle) -> Option<NodeHandle> {
    match tree.parent(node) {
        Ok(parent) => parent,
        Err(e) => {
            trace!("node {} parent lookup failed: {}", node.raw(), e);
            None
        }
    }
}

/// Decode a NUL-terminated UTF-16LE byte buffer.
pub fn decode_utf16(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

/// Encode a string as NUL-terminated UTF-16LE bytes.
pub fn encode_utf16(value: &str) -> Vec<u8> {
    value
        .encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(|unit| unit.to_le_bytes())
        .collect()
}
