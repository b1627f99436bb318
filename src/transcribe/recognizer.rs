use anyhow::Result;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

/// Errors from a recognizer implementation.
#[derive(Debug, thiserror::Error)]
pub enum RecognizerError {
    /// The recognizer cannot run at all (missing executable or model).
    /// Transcription should be disabled for the session, recording continues.
    #[error("recognizer unavailable: {0}")]
    Unavailable(String),

    /// A single invocation failed; the chunk is skipped and the queue moves on.
    #[error("recognizer failed: {0}")]
    Failed(String),
}

/// Speech recognition capability.
///
/// Takes a mono 16kHz WAV on disk and returns the raw recognized text. The
/// queue is written against this trait so it can be tested with a fake that
/// never spawns a process.
#[async_trait::async_trait]
pub trait Recognizer: Send + Sync {
    async fn transcribe(&self, wav_path: &Path) -> Result<String, RecognizerError>;

    /// Name for logging
    fn name(&self) -> &str;
}

/// Recognizer that shells out to a whisper.cpp-style CLI.
///
/// Invocation: `<exe> -m <model> -f <wav> -otxt -of <prefix> -l <lang> -t <n>`.
/// The result is read from the `.txt` (or `.<lang>.txt`) sibling the process
/// writes next to the input, which is deleted after reading.
pub struct CommandRecognizer {
    executable: PathBuf,
    model: PathBuf,
    language: String,
    threads: u32,
}

impl CommandRecognizer {
    pub fn new(
        executable: impl Into<PathBuf>,
        model: impl Into<PathBuf>,
        language: impl Into<String>,
        threads: u32,
    ) -> Self {
        Self {
            executable: executable.into(),
            model: model.into(),
            language: language.into(),
            threads: if threads == 0 { 4 } else { threads },
        }
    }

    /// Verify the executable and model exist before starting a session.
    pub fn check_available(&self) -> Result<(), RecognizerError> {
        if !self.executable.is_file() {
            return Err(RecognizerError::Unavailable(format!(
                "executable not found: {}",
                self.executable.display()
            )));
        }
        if !self.model.is_file() {
            return Err(RecognizerError::Unavailable(format!(
                "model not found: {}",
                self.model.display()
            )));
        }
        Ok(())
    }

    /// Output files the recognizer may have produced, in lookup order.
    fn output_candidates(&self, wav_path: &Path, prefix: &Path) -> Vec<PathBuf> {
        vec![
            prefix.with_extension("txt"),
            prefix.with_extension(format!("{}.txt", self.language)),
            PathBuf::from(format!("{}.txt", wav_path.display())),
        ]
    }
}

#[async_trait::async_trait]
impl Recognizer for CommandRecognizer {
    async fn transcribe(&self, wav_path: &Path) -> Result<String, RecognizerError> {
        self.check_available()?;

        // Output prefix: the wav path without its extension
        let prefix = wav_path.with_extension("");

        debug!(
            "Invoking recognizer: {} -m {} -f {}",
            self.executable.display(),
            self.model.display(),
            wav_path.display()
        );

        let output = Command::new(&self.executable)
            .arg("-m")
            .arg(&self.model)
            .arg("-f")
            .arg(wav_path)
            .arg("-otxt")
            .arg("-of")
            .arg(&prefix)
            .arg("-l")
            .arg(&self.language)
            .arg("-t")
            .arg(self.threads.to_string())
            .output()
            .await
            .map_err(|e| RecognizerError::Failed(format!("failed to spawn: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognizerError::Failed(format!(
                "exit status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let candidates = self.output_candidates(wav_path, &prefix);
        let result_path = candidates
            .iter()
            .find(|p| p.exists())
            .ok_or_else(|| {
                RecognizerError::Failed(format!(
                    "no output text file next to {}",
                    wav_path.display()
                ))
            })?
            .clone();

        let text = std::fs::read_to_string(&result_path)
            .map_err(|e| RecognizerError::Failed(format!("failed to read output: {}", e)))?;

        // The output file is a per-chunk temporary, remove it regardless of content
        for candidate in &candidates {
            if candidate.exists() {
                if let Err(e) = std::fs::remove_file(candidate) {
                    warn!("Failed to remove {}: {}", candidate.display(), e);
                }
            }
        }

        Ok(text)
    }

    fn name(&self) -> &str {
        "command"
    }
}
