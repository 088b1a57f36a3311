//! Soft restart of a device node
//!
//! Disable, wait, enable. The driver re-reads its parameters when the node
//! starts again, so a changed direction flag takes effect without unplugging
//! the device.
//!
//! `Located -> Disabled -> Settling -> Enabled`, aborting to `Failed` from any
//! step. The handle is always re-resolved from the stable path; handles from
//! an earlier scan may point at a renumbered node.
//!
//! Not safe to run concurrently against the same device. Callers serialize
//! restarts per stable path.

use crate::error::RestartFailure;
use crate::host::DeviceTree;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pause between disable and enable. Empirical; enabling too early can be a
/// silent no-op while the disable is still unwinding.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(1000);

/// Step of a restart in progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartState {
    Located,
    Disabled,
    Settling,
    Enabled,
    Failed(RestartFailure),
}

/// Final result of a restart
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartOutcome {
    Success,
    Failed(RestartFailure),
}

impl RestartOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RestartOutcome::Success)
    }

    /// What the user should be told. A failed restart never undoes a saved flag.
    pub fn message(&self) -> &'static str {
        match self {
            RestartOutcome::Success => {
                "Setting saved and applied: the device was restarted automatically."
            }
            RestartOutcome::Failed(_) => {
                "Setting saved, but the device could not be restarted automatically. \
                 Unplug and reconnect it (or its receiver) to apply."
            }
        }
    }
}

/// Drives the disable/settle/enable sequence.
pub struct LifecycleController<'a> {
    tree: &'a dyn DeviceTree,
    settle: Duration,
}

impl<'a> LifecycleController<'a> {
    pub fn new(tree: &'a dyn DeviceTree, settle: Duration) -> Self {
        Self { tree, settle }
    }

    /// Restart the node behind `stable_path`. Blocks for at least the settle time on success.
    pub fn restart(&self, stable_path: &str) -> RestartOutcome {
        self.restart_with(stable_path, |_| {})
    }

    /// Like [`restart`](Self::restart), reporting every state entered to `observe`.
    pub fn restart_with(
        &self,
        stable_path: &str,
        mut observe: impl FnMut(&RestartState),
    ) -> RestartOutcome {
        let mut enter = |state: RestartState| {
            match &state {
                RestartState::Failed(reason) => {
                    warn!("Restart of {} failed: {}", stable_path, reason)
                }
                other => debug!("Restart of {}: {:?}", stable_path, other),
            }
            observe(&state);
        };
        let handle = match self.tree.locate(stable_path) {
            Ok(handle) => handle,
            Err(e) => {
                debug!("Locating {} failed: {}", stable_path, e);
                return abort(&mut enter, RestartFailure::NotFound);
            }
        };
        enter(RestartState::Located);

        if let Err(e) = self.tree.disable(&handle) {
            return abort(&mut enter, RestartFailure::DisableFailed { code: e.code() });
        }
        enter(RestartState::Disabled);

        enter(RestartState::Settling);
        thread::sleep(self.settle);

        if let Err(e) = self.tree.enable(&handle) {
            return abort(&mut enter, RestartFailure::EnableFailed { code: e.code() });
        }
        enter(RestartState::Enabled);

        info!("Restarted {}", stable_path);
        RestartOutcome::Success
    }
}

fn abort(enter: &mut impl FnMut(RestartState), reason: RestartFailure) -> RestartOutcome {
    enter(RestartState::Failed(reason.clone()));
    RestartOutcome::Failed(reason)
}
