//! In-memory host
//!
//! A fake device tree plus parameter store for the test suite. Lookups are
//! case-insensitive like the OS registry and device tree. Failure injection
//! knobs cover the write and lifecycle error paths.

use crate::error::HostError;
use crate::host::{DeviceProperty, DeviceTree, NodeHandle, NodeStatus, ParameterStore};
use crate::flag::FLAG_VALUE;
use crate::node::encode_utf16;
use crate::scan::{MOUSE_CLASS_GUID, PARAMETERS_KEY};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::time::Instant;

/// Builder for a node in the fake tree
#[derive(Debug, Clone)]
pub struct NodeSpec {
    path: String,
    started: bool,
    friendly_name: Option<String>,
    parent: Option<String>,
}

impl NodeSpec {
    /// A started node with no name and no parent
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            started: true,
            friendly_name: None,
            parent: None,
        }
    }

    pub fn started(mut self, started: bool) -> Self {
        self.started = started;
        self
    }

    pub fn friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }

    pub fn parent(mut self, path: impl Into<String>) -> Self {
        self.parent = Some(path.into());
        self
    }
}

/// Stored parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegValue {
    Str(String),
    Dword(u32),
}

/// State transition recorded by the fake tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    Disabled(String),
    Enabled(String),
}

#[derive(Debug)]
struct Node {
    spec: NodeSpec,
    present: bool,
}

#[derive(Debug)]
struct Key {
    path: String,
    values: Vec<(String, RegValue)>,
}

/// Fake device tree and parameter store
#[derive(Debug, Default)]
pub struct MemoryHost {
    nodes: RefCell<Vec<Node>>,
    keys: RefCell<Vec<Key>>,
    events: RefCell<Vec<(NodeEvent, Instant)>>,
    locate_calls: Cell<usize>,
    transition_calls: Cell<usize>,
    broken_keys: HashSet<String>,
    failing_status: HashSet<String>,
    deny_writes: bool,
    fail_disable: Option<u32>,
    fail_enable: Option<u32>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, spec: NodeSpec) {
        self.nodes.get_mut().push(Node {
            spec,
            present: true,
        });
    }

    /// Make a node disappear from the live tree, as if unplugged.
    pub fn unplug(&self, path: &str) {
        for node in self.nodes.borrow_mut().iter_mut() {
            if node.spec.path.eq_ignore_ascii_case(path) {
                node.present = false;
            }
        }
    }

    /// Create `key` (and every ancestor key) if missing.
    pub fn create_key(&mut self, key: &str) {
        let keys = self.keys.get_mut();
        let mut prefix = String::new();
        for segment in key.split('\\') {
            if !prefix.is_empty() {
                prefix.push('\\');
            }
            prefix.push_str(segment);
            if !keys.iter().any(|k| k.path.eq_ignore_ascii_case(&prefix)) {
                keys.push(Key {
                    path: prefix.clone(),
                    values: Vec::new(),
                });
            }
        }
    }

    pub fn set_value(&mut self, key: &str, name: &str, value: RegValue) {
        self.create_key(key);
        let keys = self.keys.get_mut();
        if let Some(entry) = keys.iter_mut().find(|k| k.path.eq_ignore_ascii_case(key)) {
            upsert(&mut entry.values, name, value);
        }
    }

    /// Register a started pointing device: live node plus its parameter block.
    ///
    /// `flag` of `None` leaves the parameter block without the direction
    /// value, which makes the device ineligible.
    pub fn add_pointing_device(
        &mut self,
        stable_path: &str,
        description: &str,
        flag: Option<u32>,
    ) {
        self.add_pointing_node(NodeSpec::new(stable_path), description, flag);
    }

    /// Like [`add_pointing_device`](Self::add_pointing_device) for a node
    /// with a parent or a friendly name.
    pub fn add_pointing_node(&mut self, spec: NodeSpec, description: &str, flag: Option<u32>) {
        let stable_path = spec.path.clone();
        self.add_node(spec);
        self.set_value(&stable_path, "ClassGUID", RegValue::Str(MOUSE_CLASS_GUID.into()));
        self.set_value(&stable_path, "DeviceDesc", RegValue::Str(description.into()));

        let params = format!("{}\\{}", stable_path, PARAMETERS_KEY);
        self.create_key(&params);
        if let Some(flag) = flag {
            self.set_value(&params, FLAG_VALUE, RegValue::Dword(flag));
        }
    }

    /// Every subkey listing of `key` fails from now on.
    pub fn break_key(&mut self, key: &str) {
        self.broken_keys.insert(key.to_ascii_uppercase());
    }

    /// Status queries for the node at `path` fail, although it still locates.
    pub fn fail_status(&mut self, path: &str) {
        self.failing_status.insert(path.to_ascii_uppercase());
    }

    /// Writes fail with `AccessDenied`, like an unelevated process.
    pub fn deny_writes(&mut self) {
        self.deny_writes = true;
    }

    pub fn fail_disable(&mut self, code: u32) {
        self.fail_disable = Some(code);
    }

    pub fn fail_enable(&mut self, code: u32) {
        self.fail_enable = Some(code);
    }

    /// Disable/enable transitions in call order
    pub fn events(&self) -> Vec<(NodeEvent, Instant)> {
        self.events.borrow().clone()
    }

    pub fn locate_calls(&self) -> usize {
        self.locate_calls.get()
    }

    /// Disable and enable attempts, successful or not
    pub fn transition_calls(&self) -> usize {
        self.transition_calls.get()
    }

    pub fn value(&self, key: &str, name: &str) -> Option<RegValue> {
        let keys = self.keys.borrow();
        let entry = keys.iter().find(|k| k.path.eq_ignore_ascii_case(key))?;
        entry
            .values
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    }

    fn index_of(&self, path: &str) -> Option<usize> {
        self.nodes
            .borrow()
            .iter()
            .position(|n| n.present && n.spec.path.eq_ignore_ascii_case(path))
    }

    fn with_node<T>(
        &self,
        handle: &NodeHandle,
        f: impl FnOnce(&mut Node) -> T,
    ) -> Result<T, HostError> {
        let index = (handle.raw() as usize)
            .checked_sub(1)
            .ok_or(HostError::NotFound)?;
        let mut nodes = self.nodes.borrow_mut();
        match nodes.get_mut(index) {
            Some(node) if node.present => Ok(f(node)),
            _ => Err(HostError::NotFound),
        }
    }

    fn open(&self, key: &str) -> Result<(), HostError> {
        if self
            .keys
            .borrow()
            .iter()
            .any(|k| k.path.eq_ignore_ascii_case(key))
        {
            Ok(())
        } else {
            Err(HostError::NotFound)
        }
    }

    fn handle(index: usize) -> NodeHandle {
        NodeHandle::from_raw(index as u32 + 1)
    }

    fn record(&self, event: NodeEvent) {
        self.events.borrow_mut().push((event, Instant::now()));
    }
}

fn upsert(values: &mut Vec<(String, RegValue)>, name: &str, value: RegValue) {
    match values.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
        Some(slot) => slot.1 = value,
        None => values.push((name.to_string(), value)),
    }
}

impl DeviceTree for MemoryHost {
    fn locate(&self, stable_path: &str) -> Result<NodeHandle, HostError> {
        self.locate_calls.set(self.locate_calls.get() + 1);
        self.index_of(stable_path)
            .map(Self::handle)
            .ok_or(HostError::NotFound)
    }

    fn status(&self, node: &NodeHandle) -> Result<NodeStatus, HostError> {
        let (path, started) =
            self.with_node(node, |n| (n.spec.path.to_ascii_uppercase(), n.spec.started))?;
        if self.failing_status.contains(&path) {
            return Err(HostError::Os { code: 0x1d });
        }
        Ok(NodeStatus {
            started,
            problem: if started { 0 } else { 22 },
        })
    }

    fn parent(&self, node: &NodeHandle) -> Result<Option<NodeHandle>, HostError> {
        let parent = self.with_node(node, |n| n.spec.parent.clone())?;
        Ok(parent
            .and_then(|path| self.index_of(&path))
            .map(Self::handle))
    }

    fn property(
        &self,
        node: &NodeHandle,
        key: DeviceProperty,
        buf: &mut [u8],
    ) -> Result<usize, HostError> {
        let value = self.with_node(node, |n| match key {
            DeviceProperty::FriendlyName => n.spec.friendly_name.clone(),
        })?;
        let bytes = encode_utf16(&value.ok_or(HostError::NotFound)?);
        if buf.len() < bytes.len() {
            return Err(HostError::BufferTooSmall {
                required: bytes.len(),
            });
        }
        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    fn disable(&self, node: &NodeHandle) -> Result<(), HostError> {
        self.transition_calls.set(self.transition_calls.get() + 1);
        if let Some(code) = self.fail_disable {
            return Err(HostError::Os { code });
        }
        let path = self.with_node(node, |n| {
            n.spec.started = false;
            n.spec.path.clone()
        })?;
        self.record(NodeEvent::Disabled(path));
        Ok(())
    }

    fn enable(&self, node: &NodeHandle) -> Result<(), HostError> {
        self.transition_calls.set(self.transition_calls.get() + 1);
        if let Some(code) = self.fail_enable {
            return Err(HostError::Os { code });
        }
        let path = self.with_node(node, |n| {
            n.spec.started = true;
            n.spec.path.clone()
        })?;
        self.record(NodeEvent::Enabled(path));
        Ok(())
    }
}

impl ParameterStore for MemoryHost {
    fn subkeys(&self, key: &str) -> Result<Vec<String>, HostError> {
        if self.broken_keys.contains(&key.to_ascii_uppercase()) {
            return Err(HostError::Os { code: 0x3f2 });
        }
        let keys = self.keys.borrow();
        if !keys.iter().any(|k| k.path.eq_ignore_ascii_case(key)) {
            return Err(HostError::NotFound);
        }

        let prefix = format!("{}\\", key.to_ascii_uppercase());
        Ok(keys
            .iter()
            .filter_map(|k| {
                let upper = k.path.to_ascii_uppercase();
                if !upper.starts_with(&prefix) {
                    return None;
                }
                let rest = &k.path[prefix.len()..];
                (!rest.contains('\\')).then(|| rest.to_string())
            })
            .collect())
    }

    fn read_string(&self, key: &str, value: &str) -> Result<Option<String>, HostError> {
        self.open(key)?;
        Ok(match self.value(key, value) {
            Some(RegValue::Str(s)) => Some(s),
            _ => None,
        })
    }

    fn value_exists(&self, key: &str, value: &str) -> Result<bool, HostError> {
        self.open(key)?;
        Ok(self.value(key, value).is_some())
    }

    fn read_u32(&self, key: &str, value: &str) -> Result<Option<u32>, HostError> {
        self.open(key)?;
        Ok(match self.value(key, value) {
            Some(RegValue::Dword(v)) => Some(v),
            _ => None,
        })
    }

    fn write_u32(&self, key: &str, value: &str, data: u32) -> Result<(), HostError> {
        if self.deny_writes {
            return Err(HostError::AccessDenied);
        }
        let mut keys = self.keys.borrow_mut();
        let entry = keys
            .iter_mut()
            .find(|k| k.path.eq_ignore_ascii_case(key))
            .ok_or(HostError::NotFound)?;
        upsert(&mut entry.values, value, RegValue::Dword(data));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subkeys_lists_direct_children() {
        let mut host = MemoryHost::new();
        host.create_key("HID\\VID_1\\a\\Device Parameters");
        host.create_key("HID\\VID_1\\b");
        host.create_key("HID\\VID_2\\c");

        assert_eq!(host.subkeys("HID").unwrap(), vec!["VID_1", "VID_2"]);
        assert_eq!(host.subkeys("hid\\vid_1").unwrap(), vec!["a", "b"]);
        assert_eq!(host.subkeys("BTH"), Err(HostError::NotFound));
    }

    #[test]
    fn test_values() {
        let mut host = MemoryHost::new();
        host.set_value("K", "Name", RegValue::Str("x".into()));
        host.set_value("K", "Num", RegValue::Dword(7));

        assert_eq!(host.read_string("K", "name").unwrap(), Some("x".to_string()));
        assert_eq!(host.read_u32("K", "Num").unwrap(), Some(7));
        assert_eq!(host.read_u32("K", "Name").unwrap(), None);
        assert!(host.value_exists("K", "NUM").unwrap());
        assert!(!host.value_exists("K", "Other").unwrap());
        assert_eq!(host.read_u32("Missing", "Num"), Err(HostError::NotFound));
    }

    #[test]
    fn test_write_requires_existing_key() {
        let mut host = MemoryHost::new();
        host.create_key("K");
        host.write_u32("K", "V", 1).unwrap();
        assert_eq!(host.value("K", "V"), Some(RegValue::Dword(1)));
        assert_eq!(host.write_u32("Nope", "V", 1), Err(HostError::NotFound));

        host.deny_writes();
        assert_eq!(host.write_u32("K", "V", 0), Err(HostError::AccessDenied));
    }

    #[test]
    fn test_unplugged_node_is_gone() {
        let mut host = MemoryHost::new();
        host.add_node(NodeSpec::new("HID\\VID_1\\a"));
        let handle = host.locate("HID\\VID_1\\a").unwrap();

        host.unplug("HID\\VID_1\\a");
        assert_eq!(host.locate("HID\\VID_1\\a"), Err(HostError::NotFound));
        assert_eq!(host.status(&handle), Err(HostError::NotFound));
        assert_eq!(host.locate_calls(), 2);
    }

    #[test]
    fn test_disable_enable_toggle_started() {
        let mut host = MemoryHost::new();
        host.add_node(NodeSpec::new("HID\\VID_1\\a"));
        let handle = host.locate("HID\\VID_1\\a").unwrap();

        host.disable(&handle).unwrap();
        assert!(!host.status(&handle).unwrap().started);
        host.enable(&handle).unwrap();
        assert!(host.status(&handle).unwrap().started);

        let events: Vec<NodeEvent> = host.events().into_iter().map(|(e, _)| e).collect();
        assert_eq!(
            events,
            vec![
                NodeEvent::Disabled("HID\\VID_1\\a".into()),
                NodeEvent::Enabled("HID\\VID_1\\a".into()),
            ]
        );
    }
}
