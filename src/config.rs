//! Configuration loading and management

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Which recognition backend the runtime drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Transcripts relayed from an external speech-to-text process over IPC
    Feed,
    /// No recognition capability; the session goes straight to fallback
    None,
}

impl BackendKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "feed" => Some(Self::Feed),
            "none" | "off" => Some(Self::None),
            _ => None,
        }
    }
}

/// Options for the phrase recognizer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerOptions {
    /// Surface interim (non-final) results as debug feedback
    pub interim_results: bool,
    /// Number of alternatives checked per result
    pub max_alternatives: usize,
    /// Publish every transcript to display subscribers
    pub show_debug_feedback: bool,
}

impl Default for RecognizerOptions {
    fn default() -> Self {
        Self {
            interim_results: false,
            max_alternatives: 3,
            show_debug_feedback: false,
        }
    }
}

/// Timing constants, all in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub restart_delay_ms: u64,
    pub retry_delay_ms: u64,
    pub fallback_delay_ms: u64,
    pub glitch_duration_ms: u64,
    pub settle_delay_ms: u64,
    pub verdict_delay_ms: u64,
    pub verdict_glitch_delay_ms: u64,
    pub verdict_glitch_interval_ms: u64,
    pub frame_interval_ms: u64,
    /// How long a feed session runs before it ends on its own
    pub session_limit_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            restart_delay_ms: 1000,
            retry_delay_ms: 2000,
            fallback_delay_ms: 2000,
            glitch_duration_ms: 500,
            settle_delay_ms: 1500,
            verdict_delay_ms: 2000,
            verdict_glitch_delay_ms: 500,
            verdict_glitch_interval_ms: 3000,
            frame_interval_ms: 16,
            session_limit_ms: 60_000,
        }
    }
}

impl Timings {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.fallback_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn verdict_delay(&self) -> Duration {
        Duration::from_millis(self.verdict_delay_ms)
    }

    pub fn verdict_glitch_delay(&self) -> Duration {
        Duration::from_millis(self.verdict_glitch_delay_ms)
    }

    pub fn verdict_glitch_interval(&self) -> Duration {
        Duration::from_millis(self.verdict_glitch_interval_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    pub fn session_limit(&self) -> Duration {
        Duration::from_millis(self.session_limit_ms)
    }

    /// Number of animation frames a claim glitch lasts
    pub fn glitch_frames(&self) -> u32 {
        let frames = self.glitch_duration_ms / self.frame_interval_ms.max(1);
        frames.max(1) as u32
    }
}

/// Settings read from the optional `config.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub backend: BackendKind,
    /// Video device node; `None` runs headless
    pub capture_device: Option<PathBuf>,
    pub fallback_key: String,
    pub debug_trigger: bool,
    pub max_distortion_level: u8,
    pub max_retries: u32,
    pub recognizer: RecognizerOptions,
    pub timings: Timings,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Feed,
            capture_device: Some(PathBuf::from("/dev/video0")),
            fallback_key: "Space".to_string(),
            debug_trigger: true,
            max_distortion_level: 5,
            max_retries: 5,
            recognizer: RecognizerOptions::default(),
            timings: Timings::default(),
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    pub backend: BackendKind,
    pub capture_device: Option<PathBuf>,
    /// Key that claims while fallback mode is active
    pub fallback_key: String,
    /// Whether the on-screen debug trigger is honoured
    pub debug_trigger: bool,
    pub max_distortion_level: u8,
    pub max_retries: u32,
    pub recognizer: RecognizerOptions,
    pub timings: Timings,
}

impl Config {
    /// Load configuration from defaults, `config.json` and the environment
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME").context("HOME is not set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("glitch-mirror");

        let file = Self::read_file(&data_dir.join("config.json"))?;
        let mut config = Self::from_parts(data_dir, file);
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<FileConfig> {
        if !path.exists() {
            return Ok(FileConfig::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("invalid config in {}", path.display()))
    }

    fn from_parts(data_dir: PathBuf, file: FileConfig) -> Self {
        Self {
            socket_path: data_dir.join("daemon.sock"),
            data_dir,
            backend: file.backend,
            capture_device: file.capture_device,
            fallback_key: file.fallback_key,
            debug_trigger: file.debug_trigger,
            max_distortion_level: file.max_distortion_level.max(1),
            max_retries: file.max_retries,
            recognizer: file.recognizer,
            timings: file.timings,
        }
    }

    /// Apply `GLITCH_MIRROR_*` overrides
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = var("GLITCH_MIRROR_SOCKET") {
            self.socket_path = PathBuf::from(path);
        }
        if let Some(kind) = var("GLITCH_MIRROR_BACKEND") {
            self.backend = BackendKind::parse(&kind)
                .with_context(|| format!("unknown recognition backend {kind:?}"))?;
        }
        if let Some(device) = var("GLITCH_MIRROR_CAPTURE_DEVICE") {
            self.capture_device = match device.trim() {
                "" | "none" => None,
                path => Some(PathBuf::from(path)),
            };
        }
        if let Some(key) = var("GLITCH_MIRROR_FALLBACK_KEY") {
            self.fallback_key = key;
        }
        if let Some(flag) = var("GLITCH_MIRROR_DEBUG_TRIGGER") {
            self.debug_trigger = matches!(flag.trim(), "1" | "true" | "yes" | "on");
        }
        Ok(())
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_parts(PathBuf::from("/tmp/glitch-mirror"), FileConfig::default())
    }
}
