use super::*;
use std::path::Path;
use crate::session::model::AudioSourceKind;

struct BareDevice;

impl CaptureDevice for BareDevice {
    fn open(&mut self, _output_path: &Path, _source: AudioSourceKind) -> Result<(), CaptureError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<u64, CaptureError> {
        Ok(0)
    }
}

#[test]
fn test_default_device_cannot_pause_in_place() {
    let mut device = BareDevice;
    assert!(!device.supports_pause());
    assert!(matches!(device.pause(), Err(CaptureError::Unsupported)));
    assert!(matches!(device.resume(), Err(CaptureError::Unsupported)));
}

#[test]
fn test_default_route_change_needs_restart() {
    let mut device = BareDevice;
    let applied = device.set_input_route(&InputRoute::builtin()).expect("route");
    assert_eq!(applied, RouteApplied::NeedsRestart);
}

#[test]
fn test_best_route_prefers_bluetooth() {
    let present = vec![
        InputRoute { kind: InputDeviceKind::BuiltinMic, name: "Mic".to_string() },
        InputRoute { kind: InputDeviceKind::BluetoothHeadset, name: "Buds".to_string() },
        InputRoute { kind: InputDeviceKind::WiredHeadset, name: "Jack".to_string() },
    ];
    assert_eq!(best_route(&present).kind, InputDeviceKind::BluetoothHeadset);
}

#[test]
fn test_best_route_wired_over_usb() {
    let present = vec![
        InputRoute { kind: InputDeviceKind::UsbHeadset, name: "Dongle".to_string() },
        InputRoute { kind: InputDeviceKind::WiredHeadset, name: "Jack".to_string() },
    ];
    assert_eq!(best_route(&present).kind, InputDeviceKind::WiredHeadset);
}

#[test]
fn test_best_route_falls_back_to_builtin() {
    let route = best_route(&[]);
    assert_eq!(route.kind, InputDeviceKind::BuiltinMic);
}
