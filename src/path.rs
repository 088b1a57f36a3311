//! Stable device paths
//!
//! A stable path is `namespace\vendor-key\instance-key`, e.g.
//! `HID\VID_046D&PID_C52B&MI_01\7&1a2b&0&0000`. It is parsed once into a
//! [`StablePath`] whose [`Transport`] tells the name resolver whether the
//! product name lives on an ancestor node.

use std::fmt;

/// Bus namespaces walked during a scan, in order.
pub const SCANNED_NAMESPACES: [BusNamespace; 3] =
    [BusNamespace::Hid, BusNamespace::Bth, BusNamespace::BthEnum];

/// Top-level category of the enumeration tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BusNamespace {
    /// Generic HID (USB receivers, composite devices)
    Hid,
    /// Generic Bluetooth
    Bth,
    /// Bluetooth enumerator (classic Bluetooth HID profile)
    BthEnum,
    Other(String),
}

impl BusNamespace {
    pub fn parse(segment: &str) -> Self {
        match segment.to_ascii_uppercase().as_str() {
            "HID" => BusNamespace::Hid,
            "BTH" => BusNamespace::Bth,
            "BTHENUM" => BusNamespace::BthEnum,
            _ => BusNamespace::Other(segment.to_string()),
        }
    }

    /// Key name under the enumeration root
    pub fn as_str(&self) -> &str {
        match self {
            BusNamespace::Hid => "HID",
            BusNamespace::Bth => "BTH",
            BusNamespace::BthEnum => "BTHENUM",
            BusNamespace::Other(name) => name,
        }
    }

    pub fn transport(&self) -> Transport {
        let upper = self.as_str().to_ascii_uppercase();
        if upper.contains("BTH") {
            Transport::Bluetooth
        } else if upper.contains("HID") {
            Transport::CompositeHid
        } else {
            Transport::Wired
        }
    }
}

impl fmt::Display for BusNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport kind derived from the namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    CompositeHid,
    Bluetooth,
    Wired,
}

impl Transport {
    /// Composite and Bluetooth leaf nodes carry a generic name; the product
    /// name is registered on a parent node.
    pub fn names_on_ancestor(self) -> bool {
        matches!(self, Transport::CompositeHid | Transport::Bluetooth)
    }
}

/// Parsed `namespace\vendor\instance` triplet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StablePath {
    namespace: BusNamespace,
    vendor_key: String,
    instance_key: String,
}

impl StablePath {
    pub fn new(namespace: BusNamespace, vendor_key: &str, instance_key: &str) -> Self {
        Self {
            namespace,
            vendor_key: vendor_key.to_string(),
            instance_key: instance_key.to_string(),
        }
    }

    /// Parse a path string. Returns `None` unless it has exactly three
    /// non-empty segments.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split('\\');
        let namespace = parts.next().filter(|s| !s.is_empty())?;
        let vendor = parts.next().filter(|s| !s.is_empty())?;
        let instance = parts.next().filter(|s| !s.is_empty())?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(BusNamespace::parse(namespace), vendor, instance))
    }

    pub fn namespace(&self) -> &BusNamespace {
        &self.namespace
    }

    pub fn vendor_key(&self) -> &str {
        &self.vendor_key
    }

    pub fn instance_key(&self) -> &str {
        &self.instance_key
    }

    pub fn transport(&self) -> Transport {
        self.namespace.transport()
    }

    /// Compact vendor/product tag for display.
    ///
    /// `VID_046D&PID_C52B&MI_01` becomes `VID_046D PID_C52B`; anything
    /// without both markers is returned as-is.
    pub fn short_id(&self) -> String {
        let block = self.vendor_key.as_str();
        if !(block.contains("VID") && block.contains("PID")) {
            return block.to_string();
        }
        let tokens: Vec<&str> = block.split('&').collect();
        let vid = tokens.iter().find(|t| t.contains("VID"));
        let pid = tokens.iter().find(|t| t.contains("PID"));
        match (vid, pid) {
            (Some(vid), Some(pid)) => format!("{} {}", vid, pid),
            _ => block.to_string(),
        }
    }
}

impl fmt::Display for StablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\\{}\\{}",
            self.namespace, self.vendor_key, self.instance_key
        )
    }
}
