use super::*;
use crate::audio::device::{CaptureDevice, CaptureError, InputRoute, RouteApplied};
use crate::session::model::AudioSourceKind;

#[test]
fn test_push_while_closed_drops_samples() {
    let (_device, sink) = WavCaptureDevice::new(WavCaptureConfig::default());
    assert_eq!(sink.push(&[0.1, 0.2, 0.3]), 0);
}

#[test]
fn test_open_push_stop_produces_readable_wav() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("chunk_0.wav");
    let (mut device, sink) = WavCaptureDevice::new(WavCaptureConfig::default());

    device.open(&path, AudioSourceKind::Microphone).expect("open");
    assert_eq!(sink.push(&[0.0, 0.5, -0.5, 1.0]), 4);
    let size = device.stop().expect("stop");
    assert!(size > 44, "should be larger than a bare WAV header, got {}", size);

    let reader = hound::WavReader::open(&path).expect("read back");
    assert_eq!(reader.spec().sample_rate, 44_100);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.len(), 4);
}

#[test]
fn test_pause_drops_samples_in_place() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("chunk_0.wav");
    let (mut device, sink) = WavCaptureDevice::new(WavCaptureConfig::default());

    assert!(device.supports_pause());
    device.open(&path, AudioSourceKind::Microphone).expect("open");
    assert_eq!(sink.push(&[0.1, 0.1]), 2);

    device.pause().expect("pause");
    assert_eq!(sink.push(&[0.9, 0.9, 0.9]), 0);

    device.resume().expect("resume");
    assert_eq!(sink.push(&[0.2]), 1);

    device.stop().expect("stop");
    let reader = hound::WavReader::open(&path).expect("read back");
    assert_eq!(reader.len(), 3);
}

#[test]
fn test_double_open_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut device, _sink) = WavCaptureDevice::new(WavCaptureConfig::default());
    device
        .open(&dir.path().join("a.wav"), AudioSourceKind::Microphone)
        .expect("open");
    let err = device
        .open(&dir.path().join("b.wav"), AudioSourceKind::Microphone)
        .expect_err("second open should fail");
    assert!(matches!(err, CaptureError::Backend(_)));
}

#[test]
fn test_stop_without_open_fails() {
    let (mut device, _sink) = WavCaptureDevice::new(WavCaptureConfig::default());
    assert!(matches!(device.stop(), Err(CaptureError::NotOpen)));
    assert!(matches!(device.pause(), Err(CaptureError::NotOpen)));
}

#[test]
fn test_route_change_applies_in_place() {
    let (mut device, _sink) = WavCaptureDevice::new(WavCaptureConfig::default());
    let route = InputRoute::builtin();
    assert_eq!(device.set_input_route(&route).expect("route"), RouteApplied::InPlace);
    assert_eq!(device.current_route(), &route);
}
