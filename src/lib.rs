//! wheelflip - per-device scroll wheel direction for Windows pointing devices
//!
//! Finds attached mice that support wheel inversion, resolves a readable
//! name for each, toggles the persisted direction flag the mouse driver
//! reads, and soft-restarts the device so the change applies without
//! unplugging it.

pub mod backend;
pub mod error;
pub mod flag;
pub mod host;
pub mod lifecycle;
pub mod names;
pub mod node;
pub mod path;
pub mod scan;
pub mod service;
pub mod settings;

pub use error::{FlagWriteError, HostError, RestartFailure};
pub use flag::DirectionFlag;
pub use host::{DeviceTree, Host, NodeHandle, ParameterStore};
pub use lifecycle::{RestartOutcome, RestartState};
pub use scan::DeviceRecord;
pub use service::{Applied, WheelService};
pub use settings::AppSettings;
