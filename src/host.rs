//! Host capability interface
//!
//! The device tree and the per-device parameter store are external state
//! owned by the OS. The core talks to them only through these traits so the
//! enumeration and lifecycle logic can run against an in-memory tree in tests.
//!
//! Components:
//! - `DeviceTree`: live device nodes (locate, status, parent, properties, disable/enable)
//! - `ParameterStore`: the persisted key/value tree under the enumeration root

use crate::error::HostError;

/// Transient reference to a live device node.
///
/// Neither `Clone` nor `Copy`. Instance numbers can be reassigned between
/// enumerations, so a handle lives for one operation only; records keep the
/// stable path instead.
#[derive(Debug, PartialEq, Eq)]
pub struct NodeHandle(u32);

impl NodeHandle {
    /// Wrap a raw instance number. Only `DeviceTree` implementations should call this.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u32 {
        self.0
    }
}

/// Status flags reported for a located node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStatus {
    /// Driver loaded and device running (not merely present or disabled)
    pub started: bool,
    /// Problem code, 0 when healthy
    pub problem: u32,
}

/// Node properties the core reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceProperty {
    FriendlyName,
}

/// Live device tree
pub trait DeviceTree {
    /// Resolve a stable path to the node currently bound to it.
    fn locate(&self, stable_path: &str) -> Result<NodeHandle, HostError>;

    fn status(&self, node: &NodeHandle) -> Result<NodeStatus, HostError>;

    /// Immediate ancestor, `None` for a root node.
    fn parent(&self, node: &NodeHandle) -> Result<Option<NodeHandle>, HostError>;

    /// Copy a property value (UTF-16LE, NUL-terminated) into `buf`.
    ///
    /// Returns the number of bytes written. When `buf` is too small the call
    /// fails with [`HostError::BufferTooSmall`] carrying the required size, so
    /// callers probe with an empty buffer first.
    fn property(
        &self,
        node: &NodeHandle,
        key: DeviceProperty,
        buf: &mut [u8],
    ) -> Result<usize, HostError>;

    fn disable(&self, node: &NodeHandle) -> Result<(), HostError>;

    fn enable(&self, node: &NodeHandle) -> Result<(), HostError>;
}

/// Persisted per-device parameters
///
/// Keys are backslash-separated paths relative to the enumeration root
/// (e.g. `HID\VID_046D&PID_C52B\7&1a2b&0&0000\Device Parameters`).
pub trait ParameterStore {
    /// Names of the direct child keys, in enumeration order.
    fn subkeys(&self, key: &str) -> Result<Vec<String>, HostError>;

    fn read_string(&self, key: &str, value: &str) -> Result<Option<String>, HostError>;

    /// Whether `value` exists under `key`, regardless of its type or contents.
    fn value_exists(&self, key: &str, value: &str) -> Result<bool, HostError>;

    fn read_u32(&self, key: &str, value: &str) -> Result<Option<u32>, HostError>;

    fn write_u32(&self, key: &str, value: &str, data: u32) -> Result<(), HostError>;
}

/// Both halves of the host, as the service needs them.
pub trait Host: DeviceTree + ParameterStore {}

impl<T: DeviceTree + ParameterStore> Host for T {}

/// Join registry-style path segments with backslashes.
pub fn join_key(parts: &[&str]) -> String {
    parts.join("\\")
}
