//! Display server detection.

/// Display server type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayServer {
    Wayland,
    X11,
    Unknown,
}

impl DisplayServer {
    pub fn name(self) -> &'static str {
        match self {
            DisplayServer::Wayland => "Wayland",
            DisplayServer::X11 => "X11",
            DisplayServer::Unknown => "Unknown",
        }
    }
}

/// Detect the current display server from the session environment.
pub fn detect_display_server() -> DisplayServer {
    display_server_from(
        std::env::var("WAYLAND_DISPLAY").ok().as_deref(),
        std::env::var("XDG_SESSION_TYPE").ok().as_deref(),
        std::env::var("DISPLAY").ok().as_deref(),
    )
}

fn display_server_from(
    wayland_display: Option<&str>,
    session_type: Option<&str>,
    x_display: Option<&str>,
) -> DisplayServer {
    if wayland_display.is_some_and(|v| !v.is_empty()) || session_type == Some("wayland") {
        DisplayServer::Wayland
    } else if x_display.is_some_and(|v| !v.is_empty()) {
        DisplayServer::X11
    } else {
        DisplayServer::Unknown
    }
}
