use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Persisted application settings.
///
/// A flat key/value record merged over defaults on load and written back
/// wholesale on save. Missing keys fall back to their defaults, unknown keys
/// are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Folder recordings (and transcript siblings) are written to
    pub recordings_dir: String,
    /// Microphone device name ("default" = system default input)
    pub microphone: String,
    /// Output container format for finished recordings
    pub output_format: OutputFormat,
    /// Capture sample rate in Hz
    pub sample_rate: u32,
    /// Capture channel count (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Hotkey string, reserved for desktop front-ends that register one
    pub hotkey: String,
    pub http: HttpSettings,
    pub transcription: TranscriptionSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// 16-bit PCM WAV (canonical 44-byte header)
    Wav,
    /// Compressed container passthrough; requires a host encoder and is
    /// rejected at session start when none is available
    Webm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3030,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Whether chunks are fed to the recognizer while recording
    pub enabled: bool,
    /// Path to the recognizer executable (whisper.cpp-style CLI)
    pub executable_path: String,
    /// Path to the model file
    pub model_path: String,
    /// Recognition language code passed to the recognizer
    pub language: String,
    /// Recognizer thread count (0 = auto)
    pub threads: u32,
    /// Wall-clock duration of each transcription chunk in seconds
    pub chunk_duration_secs: u64,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            executable_path: String::new(),
            model_path: String::new(),
            language: "en".to_string(),
            threads: 4,
            chunk_duration_secs: 2,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            recordings_dir: "recordings".to_string(),
            microphone: "default".to_string(),
            output_format: OutputFormat::Wav,
            sample_rate: 44100,
            channels: 1,
            hotkey: "Ctrl+Shift+R".to_string(),
            http: HttpSettings::default(),
            transcription: TranscriptionSettings::default(),
        }
    }
}

impl Settings {
    /// Default settings file location under the platform config directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tapescribe")
            .join("settings.json")
    }

    /// Load settings from `path`, merging the file over defaults.
    ///
    /// A missing file yields pure defaults rather than an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .build()
            .context("Failed to read settings file")?;

        let settings: Settings = settings
            .try_deserialize()
            .context("Failed to parse settings")?;

        info!("Settings loaded from {}", path.display());

        Ok(settings)
    }

    /// Write the full settings record to `path`, replacing whatever was there.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;

        info!("Settings saved to {}", path.display());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(dir.path().join("settings.json")).unwrap();

        assert_eq!(settings.sample_rate, 44100);
        assert_eq!(settings.microphone, "default");
        assert!(!settings.transcription.enabled);
        assert_eq!(settings.transcription.chunk_duration_secs, 2);
    }

    #[test]
    fn partial_file_merges_over_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"sample_rate": 48000, "transcription": {"enabled": true}}"#).unwrap();

        let settings = Settings::load(&path).unwrap();

        assert_eq!(settings.sample_rate, 48000);
        assert!(settings.transcription.enabled);
        // Untouched keys keep their defaults
        assert_eq!(settings.channels, 1);
        assert_eq!(settings.transcription.language, "en");
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.recordings_dir = "vault/audio".to_string();
        settings.transcription.model_path = "/models/ggml-base.bin".to_string();
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.recordings_dir, "vault/audio");
        assert_eq!(loaded.transcription.model_path, "/models/ggml-base.bin");
    }
}
