//! `chromedriver` bootstrap: fetch the binary if missing, spawn it, wait for it

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::config::DriverConfig;
use crate::error::{DinoError, Result};

/// Text file holding the current stable Chrome-for-Testing version
pub const LATEST_RELEASE_URL: &str =
    "https://googlechromelabs.github.io/chrome-for-testing/LATEST_RELEASE_STABLE";

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Chrome-for-Testing platform tag for this build
#[must_use]
pub fn platform() -> &'static str {
    if cfg!(target_os = "windows") {
        if cfg!(target_pointer_width = "64") { "win64" } else { "win32" }
    } else if cfg!(target_os = "macos") {
        if cfg!(target_arch = "aarch64") { "mac-arm64" } else { "mac-x64" }
    } else {
        "linux64"
    }
}

/// Download URL of the driver archive for `version`
#[must_use]
pub fn archive_url(base: &str, version: &str, platform: &str) -> String {
    format!(
        "{}/{}/{}/chromedriver-{}.zip",
        base.trim_end_matches('/'),
        version.trim(),
        platform,
        platform
    )
}

/// Make sure the driver binary exists, downloading it when it does not
pub async fn ensure_binary(config: &DriverConfig) -> Result<PathBuf> {
    if config.driver_path.exists() {
        return Ok(config.driver_path.clone());
    }

    info!(path = %config.driver_path.display(), "chromedriver not found, downloading");
    let client = reqwest::Client::new();

    let version = client.get(LATEST_RELEASE_URL).send().await?
        .error_for_status()?
        .text().await?;
    let url = archive_url(&config.download_base, &version, platform());
    debug!(%url, "fetching driver archive");

    let archive = client.get(&url).send().await?
        .error_for_status()?
        .bytes().await?;

    extract_driver(&archive, &config.driver_path)?;
    info!(version = %version.trim(), path = %config.driver_path.display(), "chromedriver installed");
    Ok(config.driver_path.clone())
}

/// Pull the `chromedriver` executable out of a zip archive into `dest`
pub fn extract_driver(archive: &[u8], dest: &Path) -> Result<()> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))?;

    let index = (0..zip.len())
        .find(|&i| {
            zip.by_index(i)
                .map(|entry| is_driver_entry(entry.name()))
                .unwrap_or(false)
        })
        .ok_or_else(|| DinoError::Download("archive contains no chromedriver executable".into()))?;

    let mut entry = zip.by_index(index)?;
    let mut bytes = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or_default());
    entry.read_to_end(&mut bytes)?;
    std::fs::write(dest, &bytes)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dest, std::fs::Permissions::from_mode(0o755))?;
    }

    Ok(())
}

fn is_driver_entry(name: &str) -> bool {
    let file = name.rsplit('/').next().unwrap_or(name);
    file == "chromedriver" || file == "chromedriver.exe"
}

/// A running `chromedriver`, killed when dropped
pub struct DriverProcess {
    child: Child,
    port: u16,
}

impl DriverProcess {
    /// Spawn the driver and wait until it accepts sessions
    pub async fn spawn(config: &DriverConfig) -> Result<Self> {
        // A bare name would be looked up on PATH, so pin it to the working directory
        let program = absolute(&config.driver_path)?;
        let child = Command::new(&program)
            .arg(format!("--port={}", config.port))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        info!(port = config.port, pid = ?child.id(), "chromedriver started");

        let process = Self { child, port: config.port };
        wait_ready(&config.endpoint(), config.port, Duration::from_millis(config.startup_timeout_ms)).await?;
        Ok(process)
    }

    /// Port the driver listens on
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Terminate the driver
    pub async fn kill(&mut self) -> Result<()> {
        self.child.kill().await?;
        debug!(port = self.port, "chromedriver stopped");
        Ok(())
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

async fn wait_ready(endpoint: &str, port: u16, deadline: Duration) -> Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{endpoint}/status");
    let started = Instant::now();

    loop {
        if let Ok(response) = client.get(&url).send().await {
            if let Ok(body) = response.json::<serde_json::Value>().await {
                if body["value"]["ready"].as_bool() == Some(true) {
                    return Ok(());
                }
            }
        }
        if started.elapsed() >= deadline {
            return Err(DinoError::DriverStartup {
                port,
                waited_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            });
        }
        tokio::time::sleep(READY_POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buffer = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(Cursor::new(&mut buffer));
            for (name, data) in entries {
                writer.start_file(*name, zip::write::FileOptions::default()).unwrap();
                writer.write_all(data).unwrap();
            }
            writer.finish().unwrap();
        }
        buffer
    }

    #[test]
    fn test_archive_url() {
        assert_eq!(
            archive_url("https://host/bucket/", "126.0.6478.126\n", "linux64"),
            "https://host/bucket/126.0.6478.126/linux64/chromedriver-linux64.zip"
        );
    }

    #[test]
    fn test_extract_driver_picks_executable() {
        let archive = zip_with(&[
            ("chromedriver-linux64/LICENSE.chromedriver", b"license"),
            ("chromedriver-linux64/chromedriver", b"\x7fELF-binary"),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("chromedriver");

        extract_driver(&archive, &dest).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"\x7fELF-binary");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&dest).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[test]
    fn test_extract_driver_without_executable_fails() {
        let archive = zip_with(&[("chromedriver-linux64/README", b"nothing here")]);
        let dir = tempfile::tempdir().unwrap();
        let err = extract_driver(&archive, &dir.path().join("chromedriver")).unwrap_err();
        assert!(matches!(err, DinoError::Download(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    #[serial_test::serial]
    async fn test_spawns_driver_from_working_directory() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let stub = dir.path().join("chromedriver");
        std::fs::write(&stub, "#!/bin/sh\ntouch \"$(dirname \"$0\")/started\"\n").unwrap();
        std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();

        let previous = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();
        let config = DriverConfig {
            port: 1,
            startup_timeout_ms: 300,
            ..DriverConfig::default()
        };
        let err = DriverProcess::spawn(&config).await.err();
        std::env::set_current_dir(previous).unwrap();

        // The stub never answers /status, but it must have been the one started
        assert!(matches!(err, Some(DinoError::DriverStartup { port: 1, .. })), "{err:?}");
        assert!(dir.path().join("started").exists());
    }

    #[test]
    fn test_relative_driver_path_is_anchored() {
        let resolved = absolute(Path::new("./chromedriver")).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("chromedriver"));
    }

    #[tokio::test]
    async fn test_existing_binary_is_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chromedriver");
        std::fs::write(&path, b"stub").unwrap();

        let config = DriverConfig {
            driver_path: path.clone(),
            download_base: "http://127.0.0.1:1".into(),
            ..DriverConfig::default()
        };
        assert_eq!(ensure_binary(&config).await.unwrap(), path);
    }
}
