//! Pointing device discovery
//!
//! Walks the `HID`, `BTH` and `BTHENUM` namespaces of the enumeration tree
//! (vendor key, then instance key) and runs every instance through the
//! eligibility pipeline:
//!
//! 1. node is located and started
//! 2. `ClassGUID` is the mouse class
//! 3. `Device Parameters` already holds the direction value
//! 4. resolved name is not a remote-session device
//! 5. stable path not seen before in this scan
//!
//! Anything that fails a step is dropped silently (logged at debug level).
//! Failing to list a namespace or vendor key only ends that branch.

use crate::flag::FLAG_VALUE;
use crate::host::{DeviceTree, ParameterStore, join_key};
use crate::names::{DEFAULT_ANCESTOR_DEPTH, NameResolver};
use crate::node;
use crate::path::{BusNamespace, SCANNED_NAMESPACES, StablePath};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

/// Setup class of mice and other pointing devices
pub const MOUSE_CLASS_GUID: &str = "{4D36E96F-E325-11CE-BFC1-08002BE10318}";

/// Driver-private parameter block below each instance key
pub const PARAMETERS_KEY: &str = "Device Parameters";

/// Names containing these belong to software-emulated session devices.
pub const DEFAULT_REMOTE_MARKERS: [&str; 2] = ["Terminal Server", "Remote Desktop"];

const CLASS_VALUE: &str = "ClassGUID";
const FRIENDLY_NAME_VALUE: &str = "FriendlyName";
const DESCRIPTION_VALUE: &str = "DeviceDesc";

/// One eligible device, rebuilt on every scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRecord {
    /// `namespace\vendor\instance`, unique within a scan
    pub stable_path: String,
    /// Resolved human readable name, never empty
    pub display_name: String,
    /// Compact vendor/product tag, e.g. `VID_046D PID_C52B`
    pub short_id: String,
    /// Parameter block holding the direction flag
    pub config_path: String,
}

/// Knobs for a scan
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub ancestor_depth: usize,
    pub remote_markers: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            ancestor_depth: DEFAULT_ANCESTOR_DEPTH,
            remote_markers: DEFAULT_REMOTE_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Where along the pipeline a candidate was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotConnected,
    NotPointingDevice,
    NoDirectionFlag,
    RemoteSession,
    Duplicate,
}

/// Per-candidate decision, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub stable_path: String,
    /// `None` when accepted
    pub rejected: Option<Rejection>,
}

/// Builds the device inventory from the host.
pub struct DeviceEnumerator<'a> {
    tree: &'a dyn DeviceTree,
    store: &'a dyn ParameterStore,
    options: ScanOptions,
}

impl<'a> DeviceEnumerator<'a> {
    pub fn new(
        tree: &'a dyn DeviceTree,
        store: &'a dyn ParameterStore,
        options: ScanOptions,
    ) -> Self {
        Self {
            tree,
            store,
            options,
        }
    }

    /// Eligible devices, longest display name first.
    pub fn scan(&self) -> Vec<DeviceRecord> {
        self.scan_with_debug().0
    }

    /// Like [`scan`](Self::scan), also returning the decision for every instance visited.
    pub fn scan_with_debug(&self) -> (Vec<DeviceRecord>, Vec<Candidate>) {
        let resolver = NameResolver::new(self.options.ancestor_depth);
        let mut devices = Vec::new();
        let mut candidates = Vec::new();
        let mut seen = HashSet::new();

        for namespace in SCANNED_NAMESPACES.iter() {
            for path in self.instances(namespace) {
                let stable_path = path.to_string();
                let rejected = match self.evaluate(&path, &resolver) {
                    Ok(record) => {
                        if seen.insert(stable_path.to_ascii_uppercase()) {
                            debug!("{}: accepted as '{}'", stable_path, record.display_name);
                            devices.push(record);
                            None
                        } else {
                            debug!("{}: duplicate, keeping first occurrence", stable_path);
                            Some(Rejection::Duplicate)
                        }
                    }
                    Err(rejection) => {
                        debug!("{}: rejected ({:?})", stable_path, rejection);
                        Some(rejection)
                    }
                };
                candidates.push(Candidate {
                    stable_path,
                    rejected,
                });
            }
        }

        // Specific product names are long, "HID-compliant mouse" sinks to the bottom
        devices.sort_by(|a, b| {
            b.display_name
                .chars()
                .count()
                .cmp(&a.display_name.chars().count())
        });

        info!(
            "Scan found {} eligible device(s) among {} instance(s)",
            devices.len(),
            candidates.len()
        );
        (devices, candidates)
    }

    /// All `namespace\vendor\instance` leaves, skipping branches that fail to open.
    fn instances(&self, namespace: &BusNamespace) -> Vec<StablePath> {
        let vendors = match self.store.subkeys(namespace.as_str()) {
            Ok(vendors) => vendors,
            Err(e) => {
                debug!("Skipping namespace {}: {}", namespace, e);
                return Vec::new();
            }
        };

        let mut out = Vec::new();
        for vendor in vendors {
            match self.store.subkeys(&join_key(&[namespace.as_str(), &vendor])) {
                Ok(instances) => out.extend(
                    instances
                        .iter()
                        .map(|instance| StablePath::new(namespace.clone(), &vendor, instance)),
                ),
                Err(e) => debug!("Skipping {}\\{}: {}", namespace, vendor, e),
            }
        }
        out
    }

    fn evaluate(
        &self,
        path: &StablePath,
        resolver: &NameResolver,
    ) -> Result<DeviceRecord, Rejection> {
        let stable_path = path.to_string();

        let located = node::locate(self.tree, &stable_path);
        let handle = match located.handle {
            Some(handle) if located.connected => handle,
            _ => return Err(Rejection::NotConnected),
        };

        let class = self
            .store
            .read_string(&stable_path, CLASS_VALUE)
            .ok()
            .flatten()
            .unwrap_or_default();
        if !class.eq_ignore_ascii_case(MOUSE_CLASS_GUID) {
            return Err(Rejection::NotPointingDevice);
        }

        let config_path = join_key(&[&stable_path, PARAMETERS_KEY]);
        if !matches!(self.store.value_exists(&config_path, FLAG_VALUE), Ok(true)) {
            return Err(Rejection::NoDirectionFlag);
        }

        let short_id = path.short_id();
        let mut base_name = self.base_name(&stable_path);
        if base_name.is_empty() {
            base_name = short_id.clone();
        }
        let display_name = resolver.resolve(self.tree, &handle, path, &base_name);

        if self
            .options
            .remote_markers
            .iter()
            .any(|marker| display_name.contains(marker.as_str()))
        {
            return Err(Rejection::RemoteSession);
        }

        Ok(DeviceRecord {
            stable_path,
            display_name,
            short_id,
            config_path,
        })
    }

    /// Stored friendly name, else the description, reduced to its last `;` segment.
    fn base_name(&self, stable_path: &str) -> String {
        let read = |value| {
            self.store
                .read_string(stable_path, value)
                .ok()
                .flatten()
                .filter(|s| !s.is_empty())
        };
        read(FRIENDLY_NAME_VALUE)
            .or_else(|| read(DESCRIPTION_VALUE))
            .map(|name| last_segment(&name).to_string())
            .unwrap_or_default()
    }
}

/// Tail of a compound `@driver.inf,%desc%;Readable Name` string.
fn last_segment(value: &str) -> &str {
    value.rsplit(';').next().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryHost, NodeSpec, RegValue};
    use crate::error::HostError;

    fn scan(host: &MemoryHost) -> Vec<DeviceRecord> {
        DeviceEnumerator::new(host, host, ScanOptions::default()).scan()
    }

    #[test]
    fn test_eligible_device_is_listed() {
        let mut host = MemoryHost::new();
        host.add_pointing_device("HID\\VID_1234&PID_5678\\7&abc", "HID-compliant mouse", Some(0));

        let devices = scan(&host);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].stable_path, "HID\\VID_1234&PID_5678\\7&abc");
        assert_eq!(devices[0].display_name, "HID-compliant mouse");
        assert_eq!(devices[0].short_id, "VID_1234 PID_5678");
        assert_eq!(
            devices[0].config_path,
            "HID\\VID_1234&PID_5678\\7&abc\\Device Parameters"
        );
    }

    #[test]
    fn test_wrong_class_is_excluded() {
        let mut host = MemoryHost::new();
        host.add_pointing_device("HID\\VID_1\\a", "Keyboard", Some(0));
        host.set_value(
            "HID\\VID_1\\a",
            "ClassGUID",
            RegValue::Str("{4D36E96B-E325-11CE-BFC1-08002BE10318}".into()),
        );

        assert!(scan(&host).is_empty());
    }

    #[test]
    fn test_class_match_is_case_insensitive() {
        let mut host = MemoryHost::new();
        host.add_pointing_device("HID\\VID_1\\a", "Mouse", Some(0));
        host.set_value(
            "HID\\VID_1\\a",
            "ClassGUID",
            RegValue::Str(MOUSE_CLASS_GUID.to_ascii_lowercase()),
        );

        assert_eq!(scan(&host).len(), 1);
    }

    #[test]
    fn test_missing_flag_is_excluded() {
        let mut host = MemoryHost::new();
        host.add_pointing_device("HID\\VID_1\\a", "Touchpad", None);

        let (devices, candidates) = DeviceEnumerator::new(&host, &host, ScanOptions::default())
            .scan_with_debug();
        assert!(devices.is_empty());
        assert_eq!(candidates[0].rejected, Some(Rejection::NoDirectionFlag));
    }

    #[test]
    fn test_flag_value_is_not_inspected() {
        let mut host = MemoryHost::new();
        host.add_pointing_device("HID\\VID_1\\a", "Mouse", None);
        host.set_value(
            "HID\\VID_1\\a\\Device Parameters",
            FLAG_VALUE,
            RegValue::Str("garbage".into()),
        );

        assert_eq!(scan(&host).len(), 1);
    }

    #[test]
    fn test_disconnected_device_is_excluded() {
        let mut host = MemoryHost::new();
        // Parameter block left behind by a device that is no longer attached
        host.set_value("HID\\VID_9\\old", "ClassGUID", RegValue::Str(MOUSE_CLASS_GUID.into()));
        host.set_value("HID\\VID_9\\old\\Device Parameters", FLAG_VALUE, RegValue::Dword(1));
        // Present but disabled
        host.add_pointing_device("HID\\VID_2\\b", "Mouse", Some(0));
        host.unplug("HID\\VID_2\\b");
        host.add_node(NodeSpec::new("HID\\VID_2\\b").started(false));

        let (devices, candidates) = DeviceEnumerator::new(&host, &host, ScanOptions::default())
            .scan_with_debug();
        assert!(devices.is_empty());
        assert!(
            candidates
                .iter()
                .all(|c| c.rejected == Some(Rejection::NotConnected))
        );
    }

    #[test]
    fn test_status_failure_is_not_connected() {
        let mut host = MemoryHost::new();
        host.add_pointing_device("HID\\VID_1\\a", "Flaky mouse", Some(0));
        host.add_pointing_device("HID\\VID_2\\b", "Mouse", Some(0));
        host.fail_status("HID\\VID_1\\a");

        let (devices, candidates) = DeviceEnumerator::new(&host, &host, ScanOptions::default())
            .scan_with_debug();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].stable_path, "HID\\VID_2\\b");
        assert_eq!(candidates[0].stable_path, "HID\\VID_1\\a");
        assert_eq!(candidates[0].rejected, Some(Rejection::NotConnected));
    }

    #[test]
    fn test_remote_session_devices_are_excluded() {
        let mut host = MemoryHost::new();
        host.add_pointing_device("HID\\RDP_MOU\\1", "Terminal Server Mouse Driver", Some(0));
        host.add_pointing_device("BTHENUM\\VID_2\\2", "Remote Desktop Mouse Device", Some(0));
        host.add_pointing_device("HID\\VID_3\\3", "Mouse", Some(0));

        let devices = scan(&host);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].stable_path, "HID\\VID_3\\3");
    }

    #[test]
    fn test_compound_description_keeps_tail() {
        let mut host = MemoryHost::new();
        host.add_pointing_device(
            "HID\\VID_1\\a",
            "@msmouse.inf,%hid.mousedevice%;HID-compliant mouse",
            Some(0),
        );
        host.set_value("HID\\VID_2\\b", "FriendlyName", RegValue::Str("Trackball".into()));
        host.add_pointing_device("HID\\VID_2\\b", "ignored;Description", Some(0));

        let devices = scan(&host);
        let names: Vec<&str> = devices.iter().map(|d| d.display_name.as_str()).collect();
        assert_eq!(names, vec!["HID-compliant mouse", "Trackball"]);
    }

    #[test]
    fn test_ancestor_name_used_for_composite() {
        let mut host = MemoryHost::new();
        host.add_node(
            NodeSpec::new("USB\\VID_046D&PID_C548\\5").friendly_name("Logi Bolt Receiver"),
        );
        host.add_pointing_node(
            NodeSpec::new("HID\\VID_046D&PID_C548&MI_01\\8&1")
                .friendly_name("HID-compliant mouse")
                .parent("USB\\VID_046D&PID_C548\\5"),
            "HID-compliant mouse",
            Some(1),
        );

        let devices = scan(&host);
        assert_eq!(devices[0].display_name, "Logi Bolt Receiver");
    }

    #[test]
    fn test_sorted_by_name_length_descending() {
        let mut host = MemoryHost::new();
        host.add_pointing_device("HID\\VID_1\\a", "HID-compliant mouse", Some(0));
        host.add_pointing_device("HID\\VID_2\\b", "MX Master 3S", Some(0));
        host.add_pointing_device("BTH\\VID_3\\c", "Logitech Pebble M350 Wireless", Some(0));
        host.add_pointing_device("BTHENUM\\VID_4\\d", "Mouse", Some(0));

        let devices = scan(&host);
        let lengths: Vec<usize> = devices.iter().map(|d| d.display_name.chars().count()).collect();
        assert!(lengths.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(devices[0].display_name, "Logitech Pebble M350 Wireless");
        assert_eq!(devices[3].display_name, "Mouse");
    }

    /// Lists every subkey twice, as when one instance is reachable through two keys.
    struct Doubled<'a>(&'a MemoryHost);

    impl ParameterStore for Doubled<'_> {
        fn subkeys(&self, key: &str) -> Result<Vec<String>, HostError> {
            let keys = self.0.subkeys(key)?;
            Ok(keys.iter().chain(keys.iter()).cloned().collect())
        }

        fn read_string(&self, key: &str, value: &str) -> Result<Option<String>, HostError> {
            self.0.read_string(key, value)
        }

        fn value_exists(&self, key: &str, value: &str) -> Result<bool, HostError> {
            self.0.value_exists(key, value)
        }

        fn read_u32(&self, key: &str, value: &str) -> Result<Option<u32>, HostError> {
            self.0.read_u32(key, value)
        }

        fn write_u32(&self, key: &str, value: &str, data: u32) -> Result<(), HostError> {
            self.0.write_u32(key, value, data)
        }
    }

    #[test]
    fn test_stable_paths_are_unique() {
        let mut host = MemoryHost::new();
        host.add_pointing_device("HID\\VID_1\\a", "Mouse", Some(0));
        host.add_pointing_device("HID\\VID_2\\b", "Other Mouse", Some(1));
        let store = Doubled(&host);

        let (devices, candidates) =
            DeviceEnumerator::new(&host, &store, ScanOptions::default()).scan_with_debug();
        assert_eq!(devices.len(), 2);
        let unique: HashSet<&str> = devices.iter().map(|d| d.stable_path.as_str()).collect();
        assert_eq!(unique.len(), devices.len());

        let duplicates = candidates
            .iter()
            .filter(|c| c.rejected == Some(Rejection::Duplicate))
            .count();
        assert_eq!(duplicates, 6);
    }

    #[test]
    fn test_broken_branch_does_not_abort_scan() {
        let mut host = MemoryHost::new();
        host.add_pointing_device("HID\\VID_1\\a", "Broken branch mouse", Some(0));
        host.add_pointing_device("HID\\VID_2\\b", "Mouse", Some(0));
        host.add_pointing_device("BTHENUM\\VID_3\\c", "Bluetooth Mouse", Some(0));
        host.break_key("HID\\VID_1");

        let devices = scan(&host);
        let paths: Vec<&str> = devices.iter().map(|d| d.stable_path.as_str()).collect();
        assert_eq!(paths, vec!["BTHENUM\\VID_3\\c", "HID\\VID_2\\b"]);
    }

    #[test]
    fn test_empty_names_fall_back_to_short_id() {
        let mut host = MemoryHost::new();
        host.add_pointing_device("HID\\VID_1&PID_2\\a", "", Some(0));

        assert_eq!(scan(&host)[0].display_name, "VID_1 PID_2");
    }

    #[test]
    fn test_last_segment() {
        assert_eq!(last_segment("a;b;c"), "c");
        assert_eq!(last_segment("plain"), "plain");
        assert_eq!(last_segment("trailing;"), "");
    }
}
