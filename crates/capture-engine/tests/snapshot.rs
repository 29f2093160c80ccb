mod support;

use std::sync::Arc;
use std::time::Duration;

use capturescreen_capture_engine::{
    CaptureSession, CaptureSlot, FrameSize, RgbaFrame, SessionState, SnapshotCapture,
};
use capturescreen_capture_model::{ArtifactKind, CaptureConfig, Quality};
use capturescreen_common::error::CaptureError;
use capturescreen_common::logging::init_test_logging;
use support::{FakeDevices, FakeEncoders, FakeSinks, FrameScript, Grant};

fn snapshot(devices: &Arc<FakeDevices>, sinks: &Arc<FakeSinks>) -> SnapshotCapture {
    init_test_logging();
    SnapshotCapture::new(devices.clone(), sinks.clone())
}

#[tokio::test(start_paused = true)]
async fn captures_a_png_sized_to_the_source() {
    let devices = FakeDevices::new();
    let sinks = FakeSinks::new(FrameScript::solid(4, 2, [10, 20, 30, 255]));
    let capture = snapshot(&devices, &sinks);

    let handle = capture.capture(Quality::Medium).await.unwrap();
    let artifact = handle.resolve().unwrap();
    assert_eq!(artifact.kind(), ArtifactKind::Screenshot);
    assert_eq!(artifact.mime_type(), "image/png");

    let decoded = image::load_from_memory(artifact.bytes()).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (4, 2));
    assert_eq!(decoded.get_pixel(3, 1).0, [10, 20, 30, 255]);

    assert_eq!(sinks.played(), 1);
    assert_eq!(devices.display_stops(), 1);
    assert_eq!(devices.audio_requests(), 0);
    assert_eq!(capture.artifact(), Some(handle));
    assert!(!capture.is_capturing());
}

#[tokio::test(start_paused = true)]
async fn requests_display_without_a_frame_rate() {
    let devices = FakeDevices::new();
    let sinks = FakeSinks::new(FrameScript::solid(2, 2, [0; 4]));
    let capture = snapshot(&devices, &sinks);

    capture.capture(Quality::High).await.unwrap();
    let constraints = devices.last_constraints().unwrap();
    assert_eq!(constraints.frame_rate, None);
    assert_eq!((constraints.width, constraints.height), (1920, 1080));
}

#[tokio::test(start_paused = true)]
async fn draw_failure_still_releases_the_stream() {
    let devices = FakeDevices::new();
    let sinks = FakeSinks::new(FrameScript {
        size: FrameSize {
            width: 8,
            height: 8,
        },
        frame: Some(RgbaFrame {
            width: 8,
            height: 8,
            data: vec![0; 7],
        }),
    });
    let capture = snapshot(&devices, &sinks);

    let err = capture.capture(Quality::High).await.unwrap_err();
    assert!(matches!(err, CaptureError::FrameUnavailable { .. }));
    assert_eq!(devices.display_stops(), 1);
    assert!(capture.artifact().is_none());
}

#[tokio::test(start_paused = true)]
async fn missing_or_blank_frames_are_unavailable() {
    let devices = FakeDevices::new();
    let sinks = FakeSinks::new(FrameScript::solid(2, 2, [1, 2, 3, 4]));
    let capture = snapshot(&devices, &sinks);
    let kept = capture.capture(Quality::High).await.unwrap();

    let scripts = [
        FrameScript {
            size: FrameSize {
                width: 2,
                height: 2,
            },
            frame: None,
        },
        FrameScript {
            size: FrameSize {
                width: 0,
                height: 0,
            },
            frame: None,
        },
        FrameScript {
            size: FrameSize {
                width: 2,
                height: 2,
            },
            frame: Some(RgbaFrame {
                width: 2,
                height: 2,
                data: Vec::new(),
            }),
        },
    ];
    for script in scripts {
        sinks.set_script(script);
        let err = capture.capture(Quality::High).await.unwrap_err();
        assert!(matches!(err, CaptureError::FrameUnavailable { .. }), "{err}");
    }

    assert_eq!(devices.display_stops(), 4);
    assert_eq!(capture.artifact(), Some(kept.clone()));
    assert!(!kept.is_revoked());
}

#[tokio::test(start_paused = true)]
async fn declined_picker_surfaces_without_acquiring() {
    let devices = FakeDevices::scripted(Grant::Deny, Grant::Allow);
    let sinks = FakeSinks::new(FrameScript::solid(2, 2, [0; 4]));
    let capture = snapshot(&devices, &sinks);

    let err = capture.capture(Quality::High).await.unwrap_err();
    assert!(matches!(err, CaptureError::PermissionDenied { .. }));

    devices.set_display(Grant::Cancel);
    let err = capture.capture(Quality::High).await.unwrap_err();
    assert!(matches!(err, CaptureError::NoSourceSelected));

    assert_eq!(devices.display_stops(), 0);
    assert_eq!(sinks.played(), 0);
    assert!(!capture.is_capturing());
}

#[tokio::test(start_paused = true)]
async fn concurrent_capture_is_rejected() {
    let devices = FakeDevices::new();
    let sinks = FakeSinks::new(FrameScript::solid(2, 2, [0; 4]));
    let capture = snapshot(&devices, &sinks).with_settle_delay(Duration::from_secs(1));

    let (first, second) = tokio::join!(
        capture.capture(Quality::High),
        capture.capture(Quality::High)
    );
    assert!(first.is_ok());
    assert!(matches!(second, Err(CaptureError::CaptureInProgress)));
    assert_eq!(devices.display_requests(), 1);
}

#[tokio::test(start_paused = true)]
async fn recording_and_snapshot_share_one_slot() {
    let slot = CaptureSlot::new();
    let devices = FakeDevices::new();
    let encoders = FakeEncoders::new();
    let sinks = FakeSinks::new(FrameScript::solid(2, 2, [0; 4]));

    let mut session = CaptureSession::new(devices.clone(), encoders.clone()).with_slot(slot.clone());
    let capture = snapshot(&devices, &sinks).with_slot(slot.clone());

    session
        .start(CaptureConfig::new(Quality::High, false, 0))
        .await
        .unwrap();
    let err = capture.capture(Quality::High).await.unwrap_err();
    assert!(matches!(err, CaptureError::CaptureInProgress));

    session.finish().await.unwrap();
    assert!(!slot.is_busy());
    capture.capture(Quality::High).await.unwrap();

    let _held = slot.try_claim().unwrap();
    let err = session
        .start(CaptureConfig::new(Quality::High, false, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, CaptureError::CaptureInProgress));
    assert_eq!(session.state(), SessionState::Previewing);
    assert_eq!(devices.display_requests(), 2);
}
