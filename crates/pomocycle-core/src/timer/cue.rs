//! Cues emitted by the cycle driver at transitions, and the sinks that turn
//! them into something a person notices.
//!
//! A sink is called synchronously from the driver thread and may take as long
//! as playback takes. It must never fail outward: missing files, spawn errors
//! and non-zero player exits are logged and swallowed here.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    MicroComplete,
    MicroRestComplete,
    MesoComplete,
    MesoRestComplete,
    MacroComplete,
    MacroRestComplete,
}

impl Cue {
    pub const ALL: [Cue; 6] = [
        Cue::MicroComplete,
        Cue::MicroRestComplete,
        Cue::MesoComplete,
        Cue::MesoRestComplete,
        Cue::MacroComplete,
        Cue::MacroRestComplete,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Cue::MicroComplete => "micro_complete",
            Cue::MicroRestComplete => "micro_rest_complete",
            Cue::MesoComplete => "meso_complete",
            Cue::MesoRestComplete => "meso_rest_complete",
            Cue::MacroComplete => "macro_complete",
            Cue::MacroRestComplete => "macro_rest_complete",
        }
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives cues from the driver.
pub trait CueSink: Send {
    fn emit(&self, cue: Cue);
}

impl<S: CueSink + ?Sized> CueSink for Box<S> {
    fn emit(&self, cue: Cue) {
        (**self).emit(cue)
    }
}

/// Sink that only writes the cue to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCueSink;

impl CueSink for LogCueSink {
    fn emit(&self, cue: Cue) {
        tracing::info!(%cue, "cue");
    }
}

/// Sink that remembers every cue, in order. Clones share the same log.
#[derive(Debug, Default, Clone)]
pub struct RecordingCueSink {
    cues: Arc<Mutex<Vec<Cue>>>,
}

impl RecordingCueSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cues(&self) -> Vec<Cue> {
        self.cues.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn count(&self, cue: Cue) -> usize {
        self.cues().iter().filter(|c| **c == cue).count()
    }
}

impl CueSink for RecordingCueSink {
    fn emit(&self, cue: Cue) {
        if let Ok(mut cues) = self.cues.lock() {
            cues.push(cue);
        }
    }
}

/// Sound file used for each cue, relative to the sounds directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CueSounds {
    #[serde(default = "default_warning")]
    pub micro_complete: String,
    #[serde(default = "default_succeed")]
    pub micro_rest_complete: String,
    #[serde(default = "default_info")]
    pub meso_complete: String,
    #[serde(default = "default_succeed")]
    pub meso_rest_complete: String,
    #[serde(default = "default_info")]
    pub macro_complete: String,
    #[serde(default = "default_succeed")]
    pub macro_rest_complete: String,
}

fn default_warning() -> String {
    "warning.mp3".into()
}
fn default_succeed() -> String {
    "succeed.mp3".into()
}
fn default_info() -> String {
    "info.mp3".into()
}

impl Default for CueSounds {
    fn default() -> Self {
        Self {
            micro_complete: default_warning(),
            micro_rest_complete: default_succeed(),
            meso_complete: default_info(),
            meso_rest_complete: default_succeed(),
            macro_complete: default_info(),
            macro_rest_complete: default_succeed(),
        }
    }
}

impl CueSounds {
    pub fn file_for(&self, cue: Cue) -> &str {
        match cue {
            Cue::MicroComplete => &self.micro_complete,
            Cue::MicroRestComplete => &self.micro_rest_complete,
            Cue::MesoComplete => &self.meso_complete,
            Cue::MesoRestComplete => &self.meso_rest_complete,
            Cue::MacroComplete => &self.macro_complete,
            Cue::MacroRestComplete => &self.macro_rest_complete,
        }
    }
}

/// Plays a cue's sound file through an external player command and waits
/// for it to finish. With an empty player command it behaves like
/// [`LogCueSink`].
#[derive(Debug, Clone)]
pub struct CommandCueSink {
    sounds_dir: PathBuf,
    sounds: CueSounds,
    player: Vec<String>,
}

impl CommandCueSink {
    pub fn new(sounds_dir: impl Into<PathBuf>, sounds: CueSounds, player: Vec<String>) -> Self {
        Self {
            sounds_dir: sounds_dir.into(),
            sounds,
            player,
        }
    }

    pub fn sound_path(&self, cue: Cue) -> PathBuf {
        self.sounds_dir.join(self.sounds.file_for(cue))
    }

    fn play(&self, cue: Cue, program: &str, args: &[String], path: &Path) {
        let status = Command::new(program)
            .args(args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => {
                tracing::debug!(%cue, path = %path.display(), "cue played");
            }
            Ok(status) => {
                tracing::warn!(%cue, %status, program, "cue player exited unsuccessfully");
            }
            Err(e) => {
                tracing::warn!(%cue, program, error = %e, "failed to run cue player");
            }
        }
    }
}

impl CueSink for CommandCueSink {
    fn emit(&self, cue: Cue) {
        let Some((program, args)) = self.player.split_first() else {
            tracing::info!(%cue, "cue");
            return;
        };

        let path = self.sound_path(cue);
        if !path.is_file() {
            tracing::warn!(%cue, path = %path.display(), "cue sound file missing");
            return;
        }

        self.play(cue, program, args, &path);
    }
}
