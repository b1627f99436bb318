// Tests for the subprocess recognizer using a stub shell script in place of
// the real speech-recognition executable. Unix-only since they rely on /bin/sh.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tapescribe::audio::write_wav_pcm;
use tapescribe::transcribe::{CommandRecognizer, Recognizer, RecognizerError};
use tempfile::TempDir;

/// Write an executable shell script standing in for the recognizer.
fn write_stub(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("stub-recognizer.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();

    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();

    path
}

/// Stub that parses the `-of <prefix>` flag and writes `<prefix>.txt`,
/// mirroring the real CLI's output contract.
const WRITES_OUTPUT: &str = r#"
prefix=""
prev=""
for a in "$@"; do
  if [ "$prev" = "-of" ]; then prefix="$a"; fi
  prev="$a"
done
echo " stub transcript " > "$prefix.txt"
"#;

fn write_chunk_wav(dir: &Path) -> PathBuf {
    let path = dir.join("chunk.wav");
    write_wav_pcm(&path, &vec![120i16; 16000], 16000, 1).unwrap();
    path
}

fn dummy_model(dir: &Path) -> PathBuf {
    let path = dir.join("model.bin");
    std::fs::write(&path, b"not a real model").unwrap();
    path
}

#[tokio::test]
async fn reads_and_removes_the_output_text_file() {
    let dir = TempDir::new().unwrap();
    let exe = write_stub(dir.path(), WRITES_OUTPUT);
    let model = dummy_model(dir.path());
    let wav = write_chunk_wav(dir.path());

    let recognizer = CommandRecognizer::new(&exe, &model, "en", 2);
    let text = recognizer.transcribe(&wav).await.unwrap();

    assert_eq!(text.trim(), "stub transcript");

    // Output sibling is a temporary and must be gone
    assert!(!dir.path().join("chunk.txt").exists());
    // The input chunk itself is the queue's to clean up
    assert!(wav.exists());
}

#[tokio::test]
async fn language_suffixed_output_is_found() {
    let dir = TempDir::new().unwrap();
    // Writes <prefix>.en.txt instead of <prefix>.txt
    let exe = write_stub(
        dir.path(),
        r#"
prefix=""
prev=""
for a in "$@"; do
  if [ "$prev" = "-of" ]; then prefix="$a"; fi
  prev="$a"
done
echo "suffixed result" > "$prefix.en.txt"
"#,
    );
    let model = dummy_model(dir.path());
    let wav = write_chunk_wav(dir.path());

    let recognizer = CommandRecognizer::new(&exe, &model, "en", 2);
    let text = recognizer.transcribe(&wav).await.unwrap();

    assert_eq!(text.trim(), "suffixed result");
    assert!(!dir.path().join("chunk.en.txt").exists());
}

#[tokio::test]
async fn nonzero_exit_is_a_failed_invocation() {
    let dir = TempDir::new().unwrap();
    let exe = write_stub(dir.path(), "echo 'model load error' >&2\nexit 3");
    let model = dummy_model(dir.path());
    let wav = write_chunk_wav(dir.path());

    let recognizer = CommandRecognizer::new(&exe, &model, "en", 2);
    let err = recognizer.transcribe(&wav).await.unwrap_err();

    match err {
        RecognizerError::Failed(msg) => assert!(msg.contains("model load error")),
        other => panic!("expected Failed, got {:?}", other),
    }
}

#[tokio::test]
async fn missing_output_file_is_a_failed_invocation() {
    let dir = TempDir::new().unwrap();
    let exe = write_stub(dir.path(), "exit 0");
    let model = dummy_model(dir.path());
    let wav = write_chunk_wav(dir.path());

    let recognizer = CommandRecognizer::new(&exe, &model, "en", 2);
    let err = recognizer.transcribe(&wav).await.unwrap_err();

    assert!(matches!(err, RecognizerError::Failed(_)));
}

#[tokio::test]
async fn missing_executable_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let model = dummy_model(dir.path());
    let wav = write_chunk_wav(dir.path());

    let recognizer =
        CommandRecognizer::new(dir.path().join("no-such-binary"), &model, "en", 2);
    let err = recognizer.transcribe(&wav).await.unwrap_err();

    assert!(matches!(err, RecognizerError::Unavailable(_)));
}

#[tokio::test]
async fn missing_model_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let exe = write_stub(dir.path(), WRITES_OUTPUT);
    let wav = write_chunk_wav(dir.path());

    let recognizer =
        CommandRecognizer::new(&exe, dir.path().join("no-model.bin"), "en", 2);
    let err = recognizer.transcribe(&wav).await.unwrap_err();

    assert!(matches!(err, RecognizerError::Unavailable(_)));
}
