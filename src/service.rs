//! Entry points for front ends
//!
//! [`WheelService`] bundles a host with the loaded settings and exposes the
//! four operations a front end needs: scan, read flag, write flag, restart.
//! Everything is synchronous; `restart` blocks for the settle time, so an
//! interactive caller runs it off its UI thread and keeps the user from
//! starting a second restart of the same device meanwhile.

use crate::error::FlagWriteError;
use crate::flag::{self, DirectionFlag};
use crate::host::Host;
use crate::lifecycle::{LifecycleController, RestartOutcome, RestartState};
use crate::scan::{Candidate, DeviceEnumerator, DeviceRecord};
use crate::settings::AppSettings;
use tracing::info;

/// Result of [`WheelService::apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub flag: DirectionFlag,
    /// `None` when restarting was skipped
    pub restart: Option<RestartOutcome>,
}

pub struct WheelService<H: Host> {
    host: H,
    settings: AppSettings,
}

impl<H: Host> WheelService<H> {
    pub fn new(host: H, settings: AppSettings) -> Self {
        Self { host, settings }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    fn enumerator(&self) -> DeviceEnumerator<'_> {
        DeviceEnumerator::new(&self.host, &self.host, self.settings.scan_options())
    }

    fn controller(&self) -> LifecycleController<'_> {
        LifecycleController::new(&self.host, self.settings.settle())
    }

    /// Current inventory of eligible devices.
    pub fn scan(&self) -> Vec<DeviceRecord> {
        self.enumerator().scan()
    }

    /// Inventory plus the decision taken for every instance visited.
    pub fn scan_with_debug(&self) -> (Vec<DeviceRecord>, Vec<Candidate>) {
        self.enumerator().scan_with_debug()
    }

    /// Fresh lookup of one inventory entry by stable path (case-insensitive).
    pub fn find(&self, stable_path: &str) -> Option<DeviceRecord> {
        self.scan()
            .into_iter()
            .find(|d| d.stable_path.eq_ignore_ascii_case(stable_path))
    }

    pub fn get_flag(&self, config_path: &str) -> DirectionFlag {
        flag::get_flag(&self.host, config_path)
    }

    pub fn set_flag(&self, config_path: &str, flag: DirectionFlag) -> Result<(), FlagWriteError> {
        flag::set_flag(&self.host, config_path, flag)
    }

    pub fn restart(&self, stable_path: &str) -> RestartOutcome {
        self.controller().restart(stable_path)
    }

    pub fn restart_with(
        &self,
        stable_path: &str,
        observe: impl FnMut(&RestartState),
    ) -> RestartOutcome {
        self.controller().restart_with(stable_path, observe)
    }

    /// Write `flag` for `device`, then restart it unless disabled in settings.
    ///
    /// A failed restart leaves the written flag in place; it is reported in
    /// [`Applied::restart`], not as an error.
    pub fn apply(
        &self,
        device: &DeviceRecord,
        flag: DirectionFlag,
    ) -> Result<Applied, FlagWriteError> {
        self.set_flag(&device.config_path, flag)?;

        let restart = if self.settings.auto_restart {
            Some(self.restart(&device.stable_path))
        } else {
            info!(
                "Automatic restart disabled, {} keeps its old setting until reconnected",
                device.display_name
            );
            None
        };

        Ok(Applied { flag, restart })
    }
}
