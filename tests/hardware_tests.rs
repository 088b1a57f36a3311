//! Hardware-dependent tests that require a real Windows machine
//!
//! These tests are ignored by default and can be run with:
//! `cargo test -- --ignored`
//!
//! They require:
//! - Windows with at least one mouse attached
//! - An elevated prompt for the restart test

#![cfg(windows)]

use wheelflip::backend::WindowsHost;
use wheelflip::{AppSettings, RestartOutcome, WheelService};

fn service() -> WheelService<WindowsHost> {
    WheelService::new(WindowsHost::new(), AppSettings::default())
}

/// Test device discovery with real hardware
#[test]
#[ignore]
fn test_real_device_scan() {
    let (devices, candidates) = service().scan_with_debug();

    println!("Visited {} instances", candidates.len());
    for device in &devices {
        println!("{}  [{}]  {}", device.display_name, device.short_id, device.stable_path);
    }
    assert!(!devices.is_empty(), "No mouse with a configurable wheel found");
}

/// Test that reading the flag works for every listed device
#[test]
#[ignore]
fn test_real_flag_read() {
    let service = service();
    for device in service.scan() {
        println!("{}: {}", device.display_name, service.get_flag(&device.config_path));
    }
}

/// Test soft restart of the first listed device (needs elevation)
#[test]
#[ignore]
fn test_real_restart() {
    let service = service();
    let devices = service.scan();
    let Some(device) = devices.first() else {
        panic!("No device to restart. Connect a mouse to run this test.");
    };

    let outcome = service.restart(&device.stable_path);
    println!("{}: {:?}", device.display_name, outcome);
    assert_eq!(outcome, RestartOutcome::Success);
}
