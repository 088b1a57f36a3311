//! Display name resolution
//!
//! Composite HID and Bluetooth mice register the product name ("MX Master 3S")
//! on a parent node; the leaf HID node only says "HID-compliant mouse". The
//! resolver walks a bounded number of ancestors looking for a name that is
//! not a generic bus enumerator label.

use crate::host::{DeviceProperty, DeviceTree, NodeHandle};
use crate::node;
use crate::path::StablePath;
use tracing::debug;

/// Ancestor levels inspected by default. Empirical; tune against real hardware.
pub const DEFAULT_ANCESTOR_DEPTH: usize = 3;

/// Case-insensitive marker of generic transport enumerator names
/// ("Microsoft Bluetooth Enumerator", "Bluetooth LE Generic Attribute Enumerator").
const ENUMERATOR_MARKER: &str = "ENUMERATOR";

/// Produces a display name for a located node.
#[derive(Debug, Clone, Copy)]
pub struct NameResolver {
    max_depth: usize,
}

impl Default for NameResolver {
    fn default() -> Self {
        Self::new(DEFAULT_ANCESTOR_DEPTH)
    }
}

impl NameResolver {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Resolve the name shown for `handle`.
    ///
    /// Order: first non-generic ancestor name (composite/Bluetooth only), then
    /// the node's own friendly name, then `fallback` unchanged.
    pub fn resolve(
        &self,
        tree: &dyn DeviceTree,
        handle: &NodeHandle,
        path: &StablePath,
        fallback: &str,
    ) -> String {
        let own = node::property(tree, handle, DeviceProperty::FriendlyName);

        if path.transport().names_on_ancestor() {
            if let Some(name) = self.ancestor_name(tree, handle) {
                debug!("{}: using ancestor name '{}'", path, name);
                return name;
            }
        }

        if !own.is_empty() {
            return own;
        }
        fallback.to_string()
    }

    fn ancestor_name(&self, tree: &dyn DeviceTree, handle: &NodeHandle) -> Option<String> {
        let mut next = node::parent(tree, handle);

        for level in 1..=self.max_depth {
            // Reached the root before exhausting the levels
            let ancestor = next.take()?;

            let name = node::property(tree, &ancestor, DeviceProperty::FriendlyName);
            if is_product_name(&name) {
                return Some(name);
            }

            if level < self.max_depth {
                next = node::parent(tree, &ancestor);
            }
        }

        None
    }
}

fn is_product_name(name: &str) -> bool {
    !name.is_empty() && !name.to_ascii_uppercase().contains(ENUMERATOR_MARKER)
}
