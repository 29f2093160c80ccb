//! Check system capabilities.

use capturescreen_capture_engine::backend::{self, OPTIONAL_ELEMENTS, REQUIRED_ELEMENTS};
use capturescreen_common::config::config_file_path;
use capturescreen_platform_linux::{detect_display_server, portal, DisplayServer};

pub fn run() -> anyhow::Result<()> {
    println!("CaptureScreen System Check");
    println!("{}", "=".repeat(50));

    let ds = detect_display_server();
    let source_element = match ds {
        DisplayServer::Wayland => {
            println!("[OK] Display server: Wayland");
            if portal::is_portal_available() {
                println!("[OK] ScreenCast portal: session bus reachable");
            } else {
                println!("[WARN] ScreenCast portal: no session bus found");
            }
            Some("pipewiresrc")
        }
        DisplayServer::X11 => {
            println!("[OK] Display server: X11");
            Some("ximagesrc")
        }
        DisplayServer::Unknown => {
            println!("[WARN] Display server: Unknown");
            None
        }
    };

    if let Err(e) = backend::init_gstreamer() {
        println!("[FAIL] {e}");
        return Ok(());
    }

    println!();
    println!("GStreamer elements:");
    let mut all_required_ok = true;
    for (name, purpose) in REQUIRED_ELEMENTS {
        let ok = backend::has_element(name);
        all_required_ok &= ok;
        println!("  [{}] {name:<12} {purpose}", if ok { "OK" } else { "MISSING" });
    }
    for (name, purpose) in OPTIONAL_ELEMENTS {
        let ok = backend::has_element(name);
        if Some(*name) == source_element {
            all_required_ok &= ok;
        }
        println!("  [{}] {name:<12} {purpose}", if ok { "OK" } else { "--" });
    }

    println!();
    println!("Config file: {}", config_file_path().display());
    println!();
    if all_required_ok && source_element.is_some() {
        println!("All required capabilities are available. CaptureScreen is ready.");
    } else {
        println!("Some required capabilities are missing. See above for fixes.");
    }

    Ok(())
}
