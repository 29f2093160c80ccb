//! GStreamer-backed implementations of the capture traits.
//!
//! - [`GstMediaDevices`]: display via the ScreenCast portal (Wayland) or
//!   `ximagesrc` (X11); microphone via `pulsesrc` + `webrtcdsp`
//! - [`GstEncoderFactory`]: VP9/Opus into streamable WebM, chunks pulled
//!   from an `appsink`
//! - [`GstFrameGrabber`]: offscreen RGBA sink for screenshots

use std::sync::OnceLock;

use capturescreen_common::error::{CaptureError, CaptureResult};
use gstreamer as gst;

pub mod devices;
pub mod encoder;
pub mod frames;

pub use devices::GstMediaDevices;
pub use encoder::GstEncoderFactory;
pub use frames::GstFrameGrabber;

/// Element name given to every display source, so bus errors can be
/// attributed to the shared screen rather than the encoder.
pub(crate) const DISPLAY_SOURCE_NAME: &str = "display-src";

/// Elements a recording needs, with what each one is for.
pub const REQUIRED_ELEMENTS: &[(&str, &str)] = &[
    ("videoconvert", "colour conversion"),
    ("videoscale", "resolution scaling"),
    ("videorate", "frame rate control"),
    ("vp9enc", "VP9 video encoding"),
    ("webmmux", "WebM container"),
    ("appsink", "chunk delivery"),
];

/// Elements only some configurations need.
pub const OPTIONAL_ELEMENTS: &[(&str, &str)] = &[
    ("pipewiresrc", "Wayland screen capture"),
    ("ximagesrc", "X11 screen capture"),
    ("pulsesrc", "microphone capture"),
    ("webrtcdsp", "echo cancellation and noise suppression"),
    ("opusenc", "audio encoding"),
];

pub fn init_gstreamer() -> CaptureResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    let init_res = GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string()));
    match init_res {
        Ok(()) => Ok(()),
        Err(e) => Err(CaptureError::device(format!(
            "Failed to initialize GStreamer: {e}"
        ))),
    }
}

/// Whether a GStreamer element factory is installed.
pub fn has_element(name: &str) -> bool {
    init_gstreamer().is_ok() && gst::ElementFactory::find(name).is_some()
}

/// Caps fragment scaling a raw video source to the requested size.
pub(crate) fn scale_fragment(width: u32, height: u32, frame_rate: Option<u32>) -> String {
    let rate = frame_rate
        .map(|fps| format!(",framerate={fps}/1"))
        .unwrap_or_default();
    format!(
        " ! videoconvert ! videoscale add-borders=true ! videorate ! video/x-raw,width={width},height={height}{rate}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_scale_pins_frame_rate() {
        assert_eq!(
            scale_fragment(1280, 720, Some(15)),
            " ! videoconvert ! videoscale add-borders=true ! videorate ! video/x-raw,width=1280,height=720,framerate=15/1"
        );
    }

    #[test]
    fn snapshot_scale_leaves_frame_rate_open() {
        assert!(!scale_fragment(1920, 1080, None).contains("framerate"));
    }
}
