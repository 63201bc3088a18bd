//! Driver and browser configuration
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables (`DINO_URL`, `DINO_DRIVER_PATH`, `DINO_DRIVER_PORT`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DinoError, Result};

/// Environment variable selecting the game URL
pub const DINO_URL_VAR: &str = "DINO_URL";
/// Environment variable overriding the driver binary location
pub const DRIVER_PATH_VAR: &str = "DINO_DRIVER_PATH";
/// Environment variable overriding the driver port
pub const DRIVER_PORT_VAR: &str = "DINO_DRIVER_PORT";

/// Game URL used when `DINO_URL` is not set
pub const DEFAULT_DINO_URL: &str = "chrome://dino";
/// Config file picked up by [`DriverConfig::load`] when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "dino.toml";

/// How to start and talk to the controlled browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Location of the `chromedriver` binary
    pub driver_path: PathBuf,
    /// Port the driver listens on
    pub port: u16,
    /// Page hosting the game
    pub url: String,
    /// Browser window size in pixels (width, height)
    pub window_size: (u32, u32),
    /// Run the browser without a visible window
    pub headless: bool,
    /// Keep the game's arcade-mode container scaling
    pub autoscale: bool,
    /// How long to wait for a freshly spawned driver to answer `/status`
    pub startup_timeout_ms: u64,
    /// Base URL of the Chrome-for-Testing download bucket
    pub download_base: String,
    /// Extra command line switches handed to the browser
    pub extra_args: Vec<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            driver_path: default_driver_path(),
            port: 9515,
            url: DEFAULT_DINO_URL.to_string(),
            window_size: (800, 600),
            headless: true,
            autoscale: false,
            startup_timeout_ms: 10_000,
            download_base: "https://storage.googleapis.com/chrome-for-testing-public".to_string(),
            extra_args: Vec::new(),
        }
    }
}

impl DriverConfig {
    /// Defaults overlaid with the process environment
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Defaults, then `path` (or `dino.toml` if present), then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_toml_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML file; missing keys keep their defaults
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse TOML text; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overlay values found through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(DINO_URL_VAR) {
            self.url = url;
        }
        if let Some(path) = lookup(DRIVER_PATH_VAR) {
            self.driver_path = PathBuf::from(path);
        }
        if let Some(port) = lookup(DRIVER_PORT_VAR) {
            match port.parse() {
                Ok(port) => self.port = port,
                Err(_) => tracing::warn!(%port, "ignoring unparsable {}", DRIVER_PORT_VAR),
            }
        }
    }

    /// Set headless mode from the catalog's "render" flag
    #[must_use]
    pub fn with_render(mut self, render: bool) -> Self {
        self.headless = !render;
        self
    }

    /// Command line switches for the browser
    #[must_use]
    pub fn chrome_args(&self) -> Vec<String> {
        let mut args = vec![
            "--disable-infobars".to_string(),
            "--mute-audio".to_string(),
            "--no-sandbox".to_string(),
            format!("--window-size={},{}", self.window_size.0, self.window_size.1),
        ];
        if self.headless {
            args.push("--headless".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Base URL of the driver's HTTP endpoint
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Validate values that serde cannot check
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(DinoError::Config("game url must not be empty".into()));
        }
        if self.window_size.0 == 0 || self.window_size.1 == 0 {
            return Err(DinoError::Config(format!(
                "window size must be positive, got {}x{}",
                self.window_size.0, self.window_size.1
            )));
        }
        Ok(())
    }
}

/// `./chromedriver`, or `./chromedriver.exe` when only that one exists
fn default_driver_path() -> PathBuf {
    let exe = PathBuf::from("./chromedriver.exe");
    if cfg!(windows) || (!Path::new("./chromedriver").exists() && exe.exists()) {
        exe
    } else {
        PathBuf::from("./chromedriver")
    }
}
