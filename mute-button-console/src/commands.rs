use serde::Serialize;

use mute_button_core::{RecordingArtifact, SessionStatus};

use crate::audio_state::AudioState;

pub const HELP: &str = "\
commands:
  devices                 re-enumerate audio devices
  loopback [name]         select the capture (loopback) device; no name clears it
  playback [name]         select the playback device; no name clears it
  forward on|off          forward captured audio to the playback device
  mute on|off             silence forwarding without stopping it
  record start|stop       start or stop recording the captured audio
  speaker <label>         choose the speaker the next sample is saved under
  speakers                list speakers in the sample library
  save                    save the last recording as a sample
  status                  print the session status
  quit                    end the session";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Devices,
    Loopback(String),
    Playback(String),
    Forward(bool),
    Mute(bool),
    RecordStart,
    RecordStop,
    Speaker(String),
    Speakers,
    Save,
    Status,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (verb, arg) = match line.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (line, ""),
        };

        match verb {
            "devices" => Ok(Self::Devices),
            "loopback" => Ok(Self::Loopback(arg.to_string())),
            "playback" => Ok(Self::Playback(arg.to_string())),
            "forward" => parse_switch(arg).map(Self::Forward),
            "mute" => parse_switch(arg).map(Self::Mute),
            "record" => match arg {
                "start" => Ok(Self::RecordStart),
                "stop" => Ok(Self::RecordStop),
                _ => Err("usage: record start|stop".into()),
            },
            "speaker" if !arg.is_empty() => Ok(Self::Speaker(arg.to_string())),
            "speaker" => Err("usage: speaker <label>".into()),
            "speakers" => Ok(Self::Speakers),
            "save" => Ok(Self::Save),
            "status" => Ok(Self::Status),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            "" => Err("empty command".into()),
            other => Err(format!("unknown command: {} (try 'help')", other)),
        }
    }
}

fn parse_switch(arg: &str) -> Result<bool, String> {
    match arg {
        "on" => Ok(true),
        "off" => Ok(false),
        _ => Err(format!("expected on|off, got '{}'", arg)),
    }
}

/// Device lists returned to the console.
#[derive(Clone, Serialize)]
pub struct DeviceList {
    pub loopback: Vec<String>,
    pub playback: Vec<String>,
    pub warning: String,
}

/// Info about a finished recording, returned to the console.
#[derive(Clone, Serialize)]
pub struct RecordingInfo {
    pub id: String,
    pub file_path: String,
    pub channels: u16,
    pub sample_rate: u32,
    pub duration_secs: f64,
    pub checksum: String,
}

impl From<RecordingArtifact> for RecordingInfo {
    fn from(artifact: RecordingArtifact) -> Self {
        Self {
            duration_secs: artifact.duration_secs(),
            file_path: artifact.file_path.to_string_lossy().into_owned(),
            id: artifact.id,
            channels: artifact.channels,
            sample_rate: artifact.sample_rate,
            checksum: artifact.checksum,
        }
    }
}

/// Result of executing one command.
#[derive(Serialize)]
#[serde(untagged)]
pub enum Reply {
    Ok { ok: bool },
    Devices(DeviceList),
    Recording { recording: Option<RecordingInfo> },
    Saved { saved: Option<String> },
    Speakers { speakers: Vec<String> },
    Status(Box<SessionStatus>),
    Text(String),
}

impl Reply {
    fn ok() -> Self {
        Self::Ok { ok: true }
    }
}

/// What the input loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub fn execute(state: &AudioState, command: Command) -> Result<(Reply, Flow), String> {
    let supervisor = &state.supervisor;
    let reply = match command {
        Command::Devices => {
            supervisor.find_audio_devices();
            let catalog = supervisor.catalog();
            Reply::Devices(DeviceList {
                loopback: catalog.loopback_names(),
                playback: catalog.playback_names(),
                warning: supervisor.device_warning().to_string(),
            })
        }
        Command::Loopback(name) => {
            supervisor.set_loopback_device(name);
            Reply::ok()
        }
        Command::Playback(name) => {
            supervisor.set_playback_device(name);
            Reply::ok()
        }
        Command::Forward(enabled) => {
            supervisor.toggle_forward(enabled);
            Reply::ok()
        }
        Command::Mute(muted) => {
            supervisor.set_muted(muted);
            Reply::ok()
        }
        Command::RecordStart => {
            supervisor.start_recording();
            Reply::ok()
        }
        Command::RecordStop => {
            let artifact = supervisor.stop_recording().map_err(|e| e.to_string())?;
            Reply::Recording {
                recording: artifact.map(RecordingInfo::from),
            }
        }
        Command::Speaker(label) => {
            supervisor.select_speaker_for_sample(label);
            Reply::ok()
        }
        Command::Speakers => Reply::Speakers {
            speakers: supervisor.speaker_options(),
        },
        Command::Save => {
            let saved = supervisor.save_sample().map_err(|e| e.to_string())?;
            Reply::Saved {
                saved: saved.map(|path| path.to_string_lossy().into_owned()),
            }
        }
        Command::Status => Reply::Status(Box::new(supervisor.status())),
        Command::Help => Reply::Text(HELP.to_string()),
        Command::Quit => return Ok((Reply::ok(), Flow::Quit)),
    };
    Ok((reply, Flow::Continue))
}
