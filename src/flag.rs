//! Scroll direction flag
//!
//! One DWORD per device, stored in the device's own parameter block under
//! [`FLAG_VALUE`]. The driver reads it when it initializes: `0` is the
//! standard direction, `1` inverts the wheel.

use crate::error::FlagWriteError;
use crate::host::ParameterStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Value name the mouse class driver consults
pub const FLAG_VALUE: &str = "FlipFlopWheel";

/// Wheel direction persisted for a device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectionFlag {
    #[default]
    Standard,
    Inverted,
}

impl DirectionFlag {
    pub fn as_u32(self) -> u32 {
        match self {
            DirectionFlag::Standard => 0,
            DirectionFlag::Inverted => 1,
        }
    }

    /// Stored values other than 1 read as the default direction.
    pub fn from_u32(value: u32) -> Self {
        if value == 1 {
            DirectionFlag::Inverted
        } else {
            DirectionFlag::Standard
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            DirectionFlag::Standard => DirectionFlag::Inverted,
            DirectionFlag::Inverted => DirectionFlag::Standard,
        }
    }
}

impl fmt::Display for DirectionFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectionFlag::Standard => f.write_str("standard"),
            DirectionFlag::Inverted => f.write_str("inverted"),
        }
    }
}

impl FromStr for DirectionFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" | "default" | "0" => Ok(DirectionFlag::Standard),
            "inverted" | "natural" | "1" => Ok(DirectionFlag::Inverted),
            other => Err(format!(
                "unknown direction '{}', expected 'standard' or 'inverted'",
                other
            )),
        }
    }
}

/// Current flag for a device's parameter block.
///
/// Missing key, missing value and read errors all mean `Standard`.
pub fn get_flag(store: &dyn ParameterStore, config_path: &str) -> DirectionFlag {
    match store.read_u32(config_path, FLAG_VALUE) {
        Ok(Some(value)) => DirectionFlag::from_u32(value),
        Ok(None) => DirectionFlag::Standard,
        Err(e) => {
            debug!("Reading {} under {} failed: {}", FLAG_VALUE, config_path, e);
            DirectionFlag::Standard
        }
    }
}

/// Persist `flag` into an existing parameter block.
///
/// Needs an elevated process on a real host; lack of privilege comes back
/// as [`FlagWriteError::PermissionDenied`].
pub fn set_flag(
    store: &dyn ParameterStore,
    config_path: &str,
    flag: DirectionFlag,
) -> Result<(), FlagWriteError> {
    match store.write_u32(config_path, FLAG_VALUE, flag.as_u32()) {
        Ok(()) => {
            info!("Set {} = {} ({}) under {}", FLAG_VALUE, flag.as_u32(), flag, config_path);
            Ok(())
        }
        Err(e) => {
            warn!("Failed to write {} under {}: {}", FLAG_VALUE, config_path, e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryHost, RegValue};

    const PARAMS: &str = "HID\\VID_1234&PID_5678\\7&abc\\Device Parameters";

    #[test]
    fn test_absent_value_is_standard() {
        let mut host = MemoryHost::new();
        assert_eq!(get_flag(&host, PARAMS), DirectionFlag::Standard);

        host.create_key(PARAMS);
        assert_eq!(get_flag(&host, PARAMS), DirectionFlag::Standard);
    }

    #[test]
    fn test_round_trip() {
        let mut host = MemoryHost::new();
        host.create_key(PARAMS);

        set_flag(&host, PARAMS, DirectionFlag::Inverted).unwrap();
        assert_eq!(get_flag(&host, PARAMS), DirectionFlag::Inverted);
        assert_eq!(host.value(PARAMS, FLAG_VALUE), Some(RegValue::Dword(1)));

        set_flag(&host, PARAMS, DirectionFlag::Standard).unwrap();
        assert_eq!(get_flag(&host, PARAMS), DirectionFlag::Standard);
    }

    #[test]
    fn test_write_without_privilege() {
        let mut host = MemoryHost::new();
        host.create_key(PARAMS);
        host.deny_writes();

        assert_eq!(
            set_flag(&host, PARAMS, DirectionFlag::Inverted),
            Err(FlagWriteError::PermissionDenied)
        );
        assert_eq!(get_flag(&host, PARAMS), DirectionFlag::Standard);
    }

    #[test]
    fn test_write_to_missing_block_fails() {
        let host = MemoryHost::new();
        assert!(matches!(
            set_flag(&host, PARAMS, DirectionFlag::Inverted),
            Err(FlagWriteError::WriteFailed(_))
        ));
    }

    #[test]
    fn test_parse_and_toggle() {
        assert_eq!("Inverted".parse::<DirectionFlag>(), Ok(DirectionFlag::Inverted));
        assert_eq!("0".parse::<DirectionFlag>(), Ok(DirectionFlag::Standard));
        assert!("sideways".parse::<DirectionFlag>().is_err());
        assert_eq!(DirectionFlag::Standard.toggled(), DirectionFlag::Inverted);
        assert_eq!(DirectionFlag::from_u32(7), DirectionFlag::Standard);
    }
}
