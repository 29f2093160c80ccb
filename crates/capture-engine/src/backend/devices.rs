//! Display and microphone acquisition backed by GStreamer sources.

use async_trait::async_trait;
use capturescreen_common::error::{CaptureError, CaptureResult};
use capturescreen_platform_linux::portal::{self, PortalSession};
use capturescreen_platform_linux::{detect_display_server, DisplayServer};

use super::{has_element, init_gstreamer, scale_fragment, DISPLAY_SOURCE_NAME};
use crate::media::{
    ended_channel, AudioConstraints, DisplayConstraints, EndedNotifier, MediaDevices,
    MediaStream, MediaTrack, TrackDescriptor, TrackKind,
};

/// Media devices for the current Linux desktop session.
#[derive(Debug, Clone, Copy)]
pub struct GstMediaDevices {
    display_server: DisplayServer,
}

impl GstMediaDevices {
    /// Devices for whichever display server this process runs under.
    pub fn new() -> Self {
        Self::for_display_server(detect_display_server())
    }

    pub fn for_display_server(display_server: DisplayServer) -> Self {
        Self { display_server }
    }

    pub fn display_server(&self) -> DisplayServer {
        self.display_server
    }
}

impl Default for GstMediaDevices {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaDevices for GstMediaDevices {
    async fn get_display_media(
        &self,
        constraints: &DisplayConstraints,
    ) -> CaptureResult<MediaStream> {
        let scale = scale_fragment(constraints.width, constraints.height, constraints.frame_rate);
        let (notifier, signal) = ended_channel();

        let track = match self.display_server {
            DisplayServer::Wayland => {
                require_element("pipewiresrc")?;
                let session = portal::request_screencast().await?;
                let source = format!(
                    "pipewiresrc name={DISPLAY_SOURCE_NAME} fd={} path={} do-timestamp=true keepalive-time=1000{scale}",
                    session.pipewire_fd(),
                    session.pipewire_node_id,
                );
                DisplayTrack {
                    label: format!("pipewire:{}", session.pipewire_node_id),
                    source,
                    notifier,
                    portal: Some(session),
                }
            }
            DisplayServer::X11 => {
                require_element("ximagesrc")?;
                let display = std::env::var("DISPLAY").unwrap_or_else(|_| ":0".to_string());
                let source = format!(
                    "ximagesrc name={DISPLAY_SOURCE_NAME} display-name={display} use-damage=false show-pointer=true{scale}"
                );
                DisplayTrack {
                    label: format!("x11:{display}"),
                    source,
                    notifier,
                    portal: None,
                }
            }
            DisplayServer::Unknown => {
                return Err(CaptureError::device(
                    "no Wayland or X11 display found for screen capture",
                ));
            }
        };

        tracing::info!(label = %track.label, "Display stream acquired");
        Ok(MediaStream::new(vec![Box::new(track)]).with_ended_signal(signal))
    }

    async fn get_user_media(&self, constraints: &AudioConstraints) -> CaptureResult<MediaStream> {
        require_element("pulsesrc")?;

        let mut source = "pulsesrc do-timestamp=true ! audioconvert ! audioresample ! audio/x-raw,rate=48000,channels=1".to_string();
        if constraints.echo_cancellation || constraints.noise_suppression {
            require_element("webrtcdsp")?;
            source.push_str(&format!(
                " ! webrtcdsp echo-cancel={} noise-suppression={}",
                constraints.echo_cancellation, constraints.noise_suppression
            ));
        }

        tracing::info!(?constraints, "Microphone stream acquired");
        Ok(MediaStream::new(vec![Box::new(MicrophoneTrack { source })]))
    }
}

fn require_element(name: &str) -> CaptureResult<()> {
    init_gstreamer()?;
    if has_element(name) {
        Ok(())
    } else {
        Err(CaptureError::device(format!(
            "GStreamer element '{name}' is not installed"
        )))
    }
}

struct DisplayTrack {
    label: String,
    source: String,
    notifier: EndedNotifier,
    portal: Option<PortalSession>,
}

impl MediaTrack for DisplayTrack {
    fn descriptor(&self) -> TrackDescriptor {
        TrackDescriptor {
            kind: TrackKind::Video,
            label: self.label.clone(),
            source: self.source.clone(),
            on_ended: Some(self.notifier.clone()),
        }
    }

    fn stop(&mut self) {
        let Some(session) = self.portal.take() else {
            return;
        };
        // Closing the portal session needs D-Bus; without a runtime the
        // session ends when the connection is dropped.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        tracing::warn!(error = %e, "Portal session did not close cleanly");
                    }
                });
            }
            Err(_) => drop(session),
        }
    }
}

struct MicrophoneTrack {
    source: String,
}

impl MediaTrack for MicrophoneTrack {
    fn descriptor(&self) -> TrackDescriptor {
        TrackDescriptor {
            kind: TrackKind::Audio,
            label: "microphone".to_string(),
            source: self.source.clone(),
            on_ended: None,
        }
    }

    fn stop(&mut self) {
        tracing::debug!("Microphone track stopped");
    }
}
