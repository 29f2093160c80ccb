//! XDG Desktop Portal integration for Wayland screen capture.
//!
//! On Wayland, screen capture goes through `org.freedesktop.portal.ScreenCast`,
//! which shows the compositor's own source picker and hands back a PipeWire
//! node for the chosen screen or window.
//!
//! # Flow
//!
//! 1. Create a ScreenCast session
//! 2. Select sources (monitor or window, cursor embedded)
//! 3. Start: the user picks a source or cancels
//! 4. Open the PipeWire remote for the granted node

use std::os::fd::{AsRawFd, OwnedFd};

use ashpd::desktop::screencast::{CursorMode, Screencast, SourceType};
use ashpd::desktop::{PersistMode, ResponseError, Session};
use ashpd::WindowIdentifier;
use capturescreen_common::error::{CaptureError, CaptureResult};

/// A granted screen-cast: the PipeWire node plus the portal session that
/// keeps it alive.
pub struct PortalSession {
    /// PipeWire node ID for the video stream.
    pub pipewire_node_id: u32,

    remote: OwnedFd,
    session: Session<'static, Screencast<'static>>,
}

impl PortalSession {
    /// Raw fd of the PipeWire remote, valid while this session lives.
    pub fn pipewire_fd(&self) -> i32 {
        self.remote.as_raw_fd()
    }

    /// End the screen-cast. The compositor stops sharing immediately.
    pub async fn close(self) -> CaptureResult<()> {
        tracing::info!(node = self.pipewire_node_id, "Closing portal session");
        self.session
            .close()
            .await
            .map_err(|e| CaptureError::device(format!("Failed to close portal session: {e}")))
    }
}

impl std::fmt::Debug for PortalSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalSession")
            .field("pipewire_node_id", &self.pipewire_node_id)
            .finish()
    }
}

/// Ask the user to pick a screen or window to share.
///
/// Dismissing the picker maps to [`CaptureError::NoSourceSelected`]; a portal
/// refusal maps to [`CaptureError::PermissionDenied`].
pub async fn request_screencast() -> CaptureResult<PortalSession> {
    tracing::info!("Requesting XDG ScreenCast session");

    let proxy = Screencast::new().await.map_err(map_portal_error)?;
    let session = proxy.create_session().await.map_err(map_portal_error)?;

    proxy
        .select_sources(
            &session,
            CursorMode::Embedded,
            SourceType::Monitor | SourceType::Window,
            false,
            None,
            PersistMode::DoNot,
        )
        .await
        .map_err(map_portal_error)?;

    let response = proxy
        .start(&session, &WindowIdentifier::default())
        .await
        .map_err(map_portal_error)?
        .response()
        .map_err(map_portal_error)?;

    let stream = response
        .streams()
        .first()
        .ok_or(CaptureError::NoSourceSelected)?;
    let pipewire_node_id = stream.pipe_wire_node_id();
    let size = stream.size();

    let remote = proxy
        .open_pipe_wire_remote(&session)
        .await
        .map_err(map_portal_error)?;

    tracing::info!(node = pipewire_node_id, ?size, "ScreenCast granted");
    Ok(PortalSession {
        pipewire_node_id,
        remote,
        session,
    })
}

/// Check if the XDG ScreenCast portal is likely reachable.
pub fn is_portal_available() -> bool {
    std::env::var("DBUS_SESSION_BUS_ADDRESS").is_ok()
        || std::env::var("XDG_RUNTIME_DIR").is_ok()
}

fn map_portal_error(error: ashpd::Error) -> CaptureError {
    match error {
        ashpd::Error::Response(ResponseError::Cancelled) => CaptureError::NoSourceSelected,
        ashpd::Error::Response(ResponseError::Other) => {
            CaptureError::permission_denied("screen sharing was refused by the portal")
        }
        other => CaptureError::device(format!("ScreenCast portal error: {other}")),
    }
}
