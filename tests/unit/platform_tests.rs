//! Unit tests for host OS classification and platform layout.

use engine_bridge::platform::HostOs;
use engine_bridge::AppError;

#[test]
fn known_os_names_are_classified() {
    assert_eq!(HostOs::from_name("linux").expect("linux"), HostOs::Linux);
    assert_eq!(HostOs::from_name("windows").expect("windows"), HostOs::Windows);
    assert_eq!(HostOs::from_name("macos").expect("macos"), HostOs::MacOs);
}

#[test]
fn unsupported_os_is_a_platform_error() {
    let err = HostOs::from_name("freebsd").expect_err("freebsd has no build");
    assert!(matches!(err, AppError::Platform(ref msg) if msg.contains("freebsd")));
    assert!(err.is_fatal_startup());
}

#[test]
fn subdirectories_match_the_shipped_layout() {
    assert_eq!(HostOs::Linux.subdir(), "Linux");
    assert_eq!(HostOs::Windows.subdir(), "Windows");
    assert_eq!(HostOs::MacOs.subdir(), "MacOS");
}

#[test]
fn only_windows_has_an_executable_suffix() {
    assert_eq!(HostOs::Windows.exe_suffix(), ".exe");
    assert_eq!(HostOs::Linux.exe_suffix(), "");
    assert_eq!(HostOs::MacOs.exe_suffix(), "");
}

#[test]
fn only_macos_is_uniform_hardware() {
    assert!(HostOs::MacOs.is_uniform_hardware());
    assert!(!HostOs::Linux.is_uniform_hardware());
    assert!(!HostOs::Windows.is_uniform_hardware());
}

#[test]
fn display_round_trips_through_from_name() {
    for os in [HostOs::Linux, HostOs::Windows, HostOs::MacOs] {
        assert_eq!(HostOs::from_name(&os.to_string()).expect("round trip"), os);
    }
}

#[cfg(any(target_os = "linux", target_os = "windows", target_os = "macos"))]
#[test]
fn current_host_is_supported() {
    assert!(HostOs::current().is_ok());
}
