//! Setup-time provisioning of the recognizer executable and model.
//!
//! Downloads happen over HTTPS with redirect following, streamed to a `.tmp`
//! file and renamed once complete. Archive extraction shells out to the OS
//! archive tooling rather than bundling a decompressor.

use anyhow::{bail, Context, Result};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{info, warn};

/// Executable names the recognizer may ship under, in preference order.
pub const EXECUTABLE_CANDIDATES: &[&str] = &["whisper-cli", "whisper-cpp", "main", "whisper"];

/// Default model to fetch when none is specified.
pub const DEFAULT_MODEL_URL: &str =
    "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-base.en.bin";

#[derive(Debug, Clone)]
pub struct SetupOptions {
    /// Directory the recognizer and model are installed into
    pub install_dir: PathBuf,
    /// Recognizer archive for this platform; None skips the executable step
    pub archive_url: Option<String>,
    /// Model binary URL
    pub model_url: String,
}

impl Default for SetupOptions {
    fn default() -> Self {
        Self {
            install_dir: default_install_dir(),
            archive_url: default_archive_url().map(str::to_string),
            model_url: DEFAULT_MODEL_URL.to_string(),
        }
    }
}

/// Where provisioning ended up.
#[derive(Debug)]
pub struct SetupReport {
    /// Located recognizer executable, if the archive contained one
    pub executable: Option<PathBuf>,
    /// Downloaded model file
    pub model: PathBuf,
}

pub fn default_install_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tapescribe")
}

/// Prebuilt recognizer archive for the current platform, when one exists.
/// On platforms without prebuilt binaries the executable is expected to be
/// installed separately and pointed at via settings.
pub fn default_archive_url() -> Option<&'static str> {
    if cfg!(target_os = "windows") {
        Some("https://github.com/ggerganov/whisper.cpp/releases/download/v1.7.4/whisper-bin-x64.zip")
    } else {
        None
    }
}

/// Download the model (and recognizer archive where available), extract, and
/// locate the recognizer executable.
pub async fn install(options: SetupOptions) -> Result<SetupReport> {
    std::fs::create_dir_all(&options.install_dir).with_context(|| {
        format!(
            "Failed to create install directory {}",
            options.install_dir.display()
        )
    })?;

    let client = reqwest::Client::new(); // follows redirects by default

    let model_name = filename_from_url(&options.model_url)?;
    let model_path = options.install_dir.join(model_name);
    download_file(&client, &options.model_url, &model_path).await?;

    if let Some(archive_url) = &options.archive_url {
        let archive_name = filename_from_url(archive_url)?;
        let archive_path = options.install_dir.join(archive_name);
        download_file(&client, archive_url, &archive_path).await?;
        extract_archive(&archive_path, &options.install_dir).await?;
    } else {
        info!(
            "No prebuilt recognizer archive for this platform; \
            set transcription.executable_path to an installed recognizer"
        );
    }

    let executable = locate_executable(&options.install_dir);
    match &executable {
        Some(path) => info!("Recognizer executable: {}", path.display()),
        None => warn!(
            "No recognizer executable found under {}",
            options.install_dir.display()
        ),
    }

    Ok(SetupReport {
        executable,
        model: model_path,
    })
}

fn filename_from_url(url: &str) -> Result<&str> {
    url.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .with_context(|| format!("Cannot derive a file name from {}", url))
}

/// Stream `url` into `dest`, skipping the download when the file exists.
async fn download_file(client: &reqwest::Client, url: &str, dest: &Path) -> Result<()> {
    if dest.exists() {
        info!("Already downloaded: {}", dest.display());
        return Ok(());
    }

    info!("Downloading {} -> {}", url, dest.display());

    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Request failed: {}", url))?
        .error_for_status()
        .with_context(|| format!("Server rejected download: {}", url))?;

    let total = response.content_length().unwrap_or(0);

    let tmp_path = dest.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("Failed to create {}", tmp_path.display()))?;

    let mut downloaded = 0u64;
    let mut logged = 0u64;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Download interrupted")?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;

        // Progress roughly every 50 MB
        if downloaded - logged > 50 * 1024 * 1024 {
            logged = downloaded;
            if total > 0 {
                info!("  {} / {} MB", downloaded / 1_048_576, total / 1_048_576);
            } else {
                info!("  {} MB", downloaded / 1_048_576);
            }
        }
    }

    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, dest)
        .await
        .with_context(|| format!("Failed to move download into place: {}", dest.display()))?;

    info!("Downloaded {} ({} bytes)", dest.display(), downloaded);

    Ok(())
}

/// Extract an archive with the OS tooling (`tar`, `unzip`, or
/// `Expand-Archive` on Windows).
async fn extract_archive(archive: &Path, dest: &Path) -> Result<()> {
    info!("Extracting {} -> {}", archive.display(), dest.display());

    let name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let mut command = if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        let mut cmd = Command::new("tar");
        cmd.arg("-xzf").arg(archive).arg("-C").arg(dest);
        cmd
    } else if name.ends_with(".zip") {
        if cfg!(target_os = "windows") {
            let mut cmd = Command::new("powershell");
            cmd.arg("-NoProfile").arg("-Command").arg(format!(
                "Expand-Archive -Force -Path '{}' -DestinationPath '{}'",
                archive.display(),
                dest.display()
            ));
            cmd
        } else {
            let mut cmd = Command::new("unzip");
            cmd.arg("-o").arg(archive).arg("-d").arg(dest);
            cmd
        }
    } else {
        bail!("Unsupported archive format: {}", archive.display());
    };

    let output = command
        .output()
        .await
        .context("Failed to run archive extraction tool")?;

    if !output.status.success() {
        bail!(
            "Archive extraction failed ({}): {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(())
}

/// Find the recognizer executable under `dir` by name-matching known
/// candidates, searching recursively.
pub fn locate_executable(dir: &Path) -> Option<PathBuf> {
    for candidate in EXECUTABLE_CANDIDATES {
        let names: Vec<String> = vec![candidate.to_string(), format!("{}.exe", candidate)];
        if let Some(found) = find_by_name(dir, &names) {
            return Some(found);
        }
    }
    None
}

fn find_by_name(dir: &Path, names: &[String]) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;

    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
        } else if let Some(file_name) = path.file_name().and_then(|n| n.to_str()) {
            if names.iter().any(|n| n == file_name) {
                return Some(path);
            }
        }
    }

    for subdir in subdirs {
        if let Some(found) = find_by_name(&subdir, names) {
            return Some(found);
        }
    }

    None
}
