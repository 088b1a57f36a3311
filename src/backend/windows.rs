//! Windows host
//!
//! Device tree through CfgMgr32 (`CM_*`) and parameter store through the
//! registry below `HKLM\SYSTEM\CurrentControlSet\Enum`. Writing values and
//! disabling/enabling nodes need an elevated process; without it the calls
//! fail with access denied, which the core reports as a write or restart
//! failure.

#![cfg(windows)]

use crate::error::HostError;
use crate::host::{DeviceProperty, DeviceTree, NodeHandle, NodeStatus, ParameterStore, join_key};
use crate::node::decode_utf16;
use std::ptr::{null, null_mut};
use tracing::trace;
use windows_sys::Win32::Devices::DeviceAndDriverInstallation::{
    CM_Disable_DevNode, CM_Enable_DevNode, CM_Get_DevNode_PropertyW, CM_Get_DevNode_Status,
    CM_Get_Parent, CM_Locate_DevNodeW, CR_ACCESS_DENIED, CR_BUFFER_SMALL,
    CR_NO_SUCH_DEVNODE, CR_NO_SUCH_VALUE, CR_SUCCESS, DN_STARTED,
};
use windows_sys::Win32::Devices::Properties::DEVPKEY_Device_FriendlyName;
use windows_sys::Win32::Foundation::{
    ERROR_ACCESS_DENIED, ERROR_FILE_NOT_FOUND, ERROR_NO_MORE_ITEMS, ERROR_SUCCESS,
};
use windows_sys::Win32::System::Registry::{
    HKEY, HKEY_LOCAL_MACHINE, KEY_READ, KEY_SET_VALUE, REG_DWORD, REG_EXPAND_SZ, REG_SZ,
    RegCloseKey, RegEnumKeyExW, RegOpenKeyExW, RegQueryValueExW, RegSetValueExW,
};

/// Registry root of the device enumeration tree
pub const ENUM_ROOT: &str = "SYSTEM\\CurrentControlSet\\Enum";

/// Registry key names are at most 255 characters
const MAX_KEY_NAME: usize = 256;

/// The live Windows device tree and registry
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsHost;

impl WindowsHost {
    pub fn new() -> Self {
        Self
    }
}

fn wide(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(std::iter::once(0)).collect()
}

fn config_error(code: u32) -> HostError {
    match code {
        CR_NO_SUCH_DEVNODE | CR_NO_SUCH_VALUE => HostError::NotFound,
        CR_ACCESS_DENIED => HostError::AccessDenied,
        code => HostError::Os { code },
    }
}

fn check_config(code: u32) -> Result<(), HostError> {
    if code == CR_SUCCESS {
        Ok(())
    } else {
        Err(config_error(code))
    }
}

fn check_registry(code: u32) -> Result<(), HostError> {
    match code {
        ERROR_SUCCESS => Ok(()),
        ERROR_FILE_NOT_FOUND => Err(HostError::NotFound),
        ERROR_ACCESS_DENIED => Err(HostError::AccessDenied),
        code => Err(HostError::Os { code }),
    }
}

impl DeviceTree for WindowsHost {
    fn locate(&self, stable_path: &str) -> Result<NodeHandle, HostError> {
        let id = wide(stable_path);
        let mut inst: u32 = 0;
        check_config(unsafe { CM_Locate_DevNodeW(&mut inst, id.as_ptr(), 0) })?;
        Ok(NodeHandle::from_raw(inst))
    }

    fn status(&self, node: &NodeHandle) -> Result<NodeStatus, HostError> {
        let mut status: u32 = 0;
        let mut problem: u32 = 0;
        check_config(unsafe {
            CM_Get_DevNode_Status(&mut status, &mut problem, node.raw(), 0)
        })?;
        Ok(NodeStatus {
            started: status & DN_STARTED != 0,
            problem,
        })
    }

    fn parent(&self, node: &NodeHandle) -> Result<Option<NodeHandle>, HostError> {
        let mut parent: u32 = 0;
        match unsafe { CM_Get_Parent(&mut parent, node.raw(), 0) } {
            CR_SUCCESS if parent != 0 => Ok(Some(NodeHandle::from_raw(parent))),
            CR_SUCCESS | CR_NO_SUCH_DEVNODE => Ok(None),
            code => Err(config_error(code)),
        }
    }

    fn property(
        &self,
        node: &NodeHandle,
        key: DeviceProperty,
        buf: &mut [u8],
    ) -> Result<usize, HostError> {
        let key = match key {
            DeviceProperty::FriendlyName => &DEVPKEY_Device_FriendlyName,
        };
        let mut prop_type: u32 = 0;
        let mut size = buf.len() as u32;
        let data = if buf.is_empty() {
            null_mut()
        } else {
            buf.as_mut_ptr()
        };

        let code = unsafe {
            CM_Get_DevNode_PropertyW(node.raw(), key, &mut prop_type, data, &mut size, 0)
        };
        match code {
            CR_SUCCESS => Ok(size as usize),
            CR_BUFFER_SMALL => Err(HostError::BufferTooSmall {
                required: size as usize,
            }),
            code => Err(config_error(code)),
        }
    }

    fn disable(&self, node: &NodeHandle) -> Result<(), HostError> {
        check_config(unsafe { CM_Disable_DevNode(node.raw(), 0) })
    }

    fn enable(&self, node: &NodeHandle) -> Result<(), HostError> {
        check_config(unsafe { CM_Enable_DevNode(node.raw(), 0) })
    }
}

/// Open registry key, closed on drop
struct RegKey(HKEY);

impl RegKey {
    fn open(subkey: &str, access: u32) -> Result<Self, HostError> {
        let path = wide(&join_key(&[ENUM_ROOT, subkey]));
        let mut key: HKEY = null_mut();
        check_registry(unsafe {
            RegOpenKeyExW(HKEY_LOCAL_MACHINE, path.as_ptr(), 0, access, &mut key)
        })?;
        Ok(Self(key))
    }

    /// Raw type and bytes of a value, `None` when it does not exist.
    fn query(&self, name: &str) -> Result<Option<(u32, Vec<u8>)>, HostError> {
        let name = wide(name);
        let mut value_type: u32 = 0;
        let mut size: u32 = 0;

        // Sizing call
        let code = unsafe {
            RegQueryValueExW(self.0, name.as_ptr(), null(), &mut value_type, null_mut(), &mut size)
        };
        match check_registry(code) {
            Ok(()) => {}
            Err(HostError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        }

        let mut data = vec![0u8; size as usize];
        check_registry(unsafe {
            RegQueryValueExW(
                self.0,
                name.as_ptr(),
                null(),
                &mut value_type,
                data.as_mut_ptr(),
                &mut size,
            )
        })?;
        data.truncate(size as usize);
        Ok(Some((value_type, data)))
    }
}

impl Drop for RegKey {
    fn drop(&mut self) {
        unsafe {
            RegCloseKey(self.0);
        }
    }
}

impl ParameterStore for WindowsHost {
    fn subkeys(&self, key: &str) -> Result<Vec<String>, HostError> {
        let reg = RegKey::open(key, KEY_READ)?;
        let mut names = Vec::new();
        let mut buf = [0u16; MAX_KEY_NAME];

        for index in 0.. {
            let mut len = buf.len() as u32;
            let code = unsafe {
                RegEnumKeyExW(
                    reg.0,
                    index,
                    buf.as_mut_ptr(),
                    &mut len,
                    null(),
                    null_mut(),
                    null_mut(),
                    null_mut(),
                )
            };
            match code {
                ERROR_SUCCESS => names.push(String::from_utf16_lossy(&buf[..len as usize])),
                ERROR_NO_MORE_ITEMS => break,
                code => {
                    // Keep what was listed so far; the rest of this branch is skipped
                    trace!("Enumerating {} stopped at index {}: {:#x}", key, index, code);
                    break;
                }
            }
        }

        Ok(names)
    }

    fn read_string(&self, key: &str, value: &str) -> Result<Option<String>, HostError> {
        let reg = RegKey::open(key, KEY_READ)?;
        Ok(match reg.query(value)? {
            Some((REG_SZ | REG_EXPAND_SZ, data)) => Some(decode_utf16(&data)),
            _ => None,
        })
    }

    fn value_exists(&self, key: &str, value: &str) -> Result<bool, HostError> {
        let reg = RegKey::open(key, KEY_READ)?;
        Ok(reg.query(value)?.is_some())
    }

    fn read_u32(&self, key: &str, value: &str) -> Result<Option<u32>, HostError> {
        let reg = RegKey::open(key, KEY_READ)?;
        Ok(match reg.query(value)? {
            Some((REG_DWORD, data)) if data.len() >= 4 => {
                Some(u32::from_le_bytes([data[0], data[1], data[2], data[3]]))
            }
            _ => None,
        })
    }

    fn write_u32(&self, key: &str, value: &str, data: u32) -> Result<(), HostError> {
        let reg = RegKey::open(key, KEY_SET_VALUE)?;
        let name = wide(value);
        let bytes = data.to_le_bytes();
        check_registry(unsafe {
            RegSetValueExW(
                reg.0,
                name.as_ptr(),
                0,
                REG_DWORD,
                bytes.as_ptr(),
                bytes.len() as u32,
            )
        })
    }
}
