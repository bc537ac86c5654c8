use crate::overlay::Color;
use anyhow::{Context, Result};
use camino::Utf8Path;
use config::{Config, Environment, File, FileFormat, Map};
use serde::Deserialize;
use std::time::Duration;

/// Prefix of the environment variables that override settings.
pub const ENV_PREFIX: &str = "AXISHUD";

/// Process-level settings of the overlay host.
///
/// Layered from built-in defaults, an optional YAML file and `AXISHUD_*`
/// environment variables, later layers winning.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HostSettings {
    /// Delay between two frames while a bar is moving.
    pub frame_interval_ms: u64,
    pub log_dir: String,
    pub log_prefix: String,
    pub debug: bool,
    /// Also log to the terminal.
    pub console: bool,
    /// JSON lines instead of plain text in the log file.
    pub json_logs: bool,
    pub store_path: String,
    /// Stored configuration to start with; defaults are used when absent.
    pub configuration_id: Option<i64>,
    /// `#rrggbb` colour of the scan bars.
    pub indicator_color: String,
    /// Size of the headless display used by the demo binary.
    pub display_width: u32,
    pub display_height: u32,
}

impl HostSettings {
    /// Load settings from `path` (if it exists) and the process environment.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Like [`load`](Self::load), with an explicit environment instead of the
    /// process one.
    ///
    /// # Arguments
    /// * `path` - Optional YAML settings file; a missing file is not an error
    /// * `env` - Variables as they would appear in the environment
    ///   (e.g. `AXISHUD_FRAME_INTERVAL_MS`). `None` reads the real environment.
    pub fn load_with_env(
        path: Option<&Utf8Path>,
        env: Option<Map<String, String>>,
    ) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("frame_interval_ms", 16_i64)?
            .set_default("log_dir", "logs")?
            .set_default("log_prefix", "axishud")?
            .set_default("debug", false)?
            .set_default("console", true)?
            .set_default("json_logs", false)?
            .set_default("store_path", "axishud/configurations.yaml")?
            .set_default("indicator_color", "#0099cc")?
            .set_default("display_width", 1080_i64)?
            .set_default("display_height", 1920_i64)?;

        if let Some(path) = path {
            builder = builder.add_source(
                File::from(path.as_std_path())
                    .format(FileFormat::Yaml)
                    .required(false),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .source(env),
        );

        let settings: HostSettings = builder
            .build()
            .context("Failed to build host settings")?
            .try_deserialize()
            .context("Failed to parse host settings")?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn indicator_color(&self) -> Result<Color> {
        self.indicator_color
            .parse()
            .with_context(|| format!("Invalid indicator_color setting: {}", self.indicator_color))
    }

    fn validate(&self) -> Result<()> {
        if self.frame_interval_ms == 0 {
            anyhow::bail!("frame_interval_ms must be greater than zero");
        }
        if self.display_width == 0 || self.display_height == 0 {
            anyhow::bail!(
                "Display size must be non-zero, got {}x{}",
                self.display_width,
                self.display_height
            );
        }
        self.indicator_color()?;
        Ok(())
    }
}
