//! Host backends
//!
//! - `memory`: in-memory device tree and parameter store (tests, dry runs)
//! - `windows`: CfgMgr32 and registry (Windows only)

pub mod memory;

#[cfg(windows)]
pub mod windows;

pub use memory::MemoryHost;

#[cfg(windows)]
pub use self::windows::WindowsHost;
