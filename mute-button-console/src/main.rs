//! Headless console front end: one session, driven by commands on stdin.
//!
//! ```text
//! mute-button-console [UPLOAD_ROOT]
//! ```
//! Recordings and the sample library live under `UPLOAD_ROOT` (default:
//! `<Documents>/Mute Button`). Set `RUST_LOG=debug` for stream details.

mod audio_state;
mod commands;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use mute_button_core::{AudioHost, ConnectionRegistry, SessionSupervisor, SupervisorConfig};

use audio_state::{AudioState, ConsoleDelegate};
use commands::{Command, Flow};

const TOKEN: &str = "console";

fn upload_root() -> PathBuf {
    std::env::args_os().nth(1).map(PathBuf::from).unwrap_or_else(|| {
        dirs_next::document_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Mute Button")
    })
}

#[cfg(target_os = "windows")]
fn audio_host() -> Option<Arc<dyn AudioHost>> {
    Some(Arc::new(mute_button_windows::WasapiHost::new()))
}

#[cfg(not(target_os = "windows"))]
fn audio_host() -> Option<Arc<dyn AudioHost>> {
    None
}

fn main() -> ExitCode {
    env_logger::init();

    let Some(host) = audio_host() else {
        eprintln!("mute-button-console needs the Windows WASAPI backend; no audio host on this platform");
        return ExitCode::FAILURE;
    };

    let config = SupervisorConfig::with_upload_root(upload_root());
    if let Err(e) = config.paths.prepare() {
        eprintln!("cannot prepare {}: {}", config.paths.upload_root.display(), e);
        return ExitCode::FAILURE;
    }
    log::info!("Upload root: {}", config.paths.upload_root.display());

    let registry = Arc::new(ConnectionRegistry::new());
    registry.connect(TOKEN);

    let supervisor = match SessionSupervisor::new(TOKEN, host, registry.clone(), config) {
        Ok(supervisor) => supervisor,
        Err(e) => {
            eprintln!("cannot start session: {}", e);
            return ExitCode::FAILURE;
        }
    };
    supervisor.set_delegate(ConsoleDelegate::new(io::stdout()));
    supervisor.find_audio_devices();
    if let Err(e) = supervisor.spawn_control_loop() {
        eprintln!("cannot start session: {}", e);
        return ExitCode::FAILURE;
    }

    let state = AudioState::new(TOKEN.to_string(), registry, supervisor);
    println!("{}", commands::HELP);

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let result = Command::parse(&line).and_then(|command| commands::execute(&state, command));
        let mut out = io::stdout().lock();
        match result {
            Ok((reply, flow)) => {
                match serde_json::to_string(&reply) {
                    Ok(json) => {
                        let _ = writeln!(out, "{}", json);
                    }
                    Err(e) => log::warn!("Failed to serialize reply: {}", e),
                }
                if flow == Flow::Quit {
                    break;
                }
            }
            Err(message) => {
                let _ = writeln!(out, "{}", serde_json::json!({ "error": message }));
            }
        }
    }

    state.shutdown();
    ExitCode::SUCCESS
}
