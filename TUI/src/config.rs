//! Application configuration and constants.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api/v1/query";

pub const ENV_API_URL: &str = "QUERY_CONSOLE_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "QUERY_CONSOLE_TIMEOUT_SECS";
pub const ENV_LOG_FILE: &str = "QUERY_CONSOLE_LOG";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Analysis endpoint receiving `POST {"text": ...}`
    pub api_url: String,

    /// Per-request timeout; 0 disables it
    pub request_timeout_secs: u64,

    /// Where tracing output goes (the terminal belongs to the UI)
    pub log_file: PathBuf,

    /// Main loop tick rate in milliseconds (target 60 FPS = ~16ms)
    pub tick_rate_ms: u64,

    /// How many ticks to show status messages (180 = ~3s at 60fps)
    pub status_timeout_ticks: u64,

    /// Modulo for animation frame counter
    pub animation_frame_mod: usize,

    /// Lines to scroll per key press
    pub scroll_step: usize,

    /// Width of the sidebar in characters
    pub sidebar_width: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: 60,
            log_file: std::env::temp_dir().join("query-console.log"),
            tick_rate_ms: 16,
            status_timeout_ticks: 180,
            animation_frame_mod: 360,
            scroll_step: 3,
            sidebar_width: 26,
        }
    }
}

impl Config {
    /// Defaults, then environment, then command line.
    pub fn load(args: &[String]) -> Result<Self, String> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_args(args)?;
        Ok(config)
    }

    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), String> {
        if let Some(url) = var(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_url = url;
        }
        if let Some(secs) = var(ENV_TIMEOUT_SECS) {
            self.request_timeout_secs = parse_secs(ENV_TIMEOUT_SECS, &secs)?;
        }
        if let Some(path) = var(ENV_LOG_FILE).filter(|v| !v.trim().is_empty()) {
            self.log_file = PathBuf::from(path);
        }
        Ok(())
    }

    pub fn apply_args(&mut self, args: &[String]) -> Result<(), String> {
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let mut value = |flag: &str| {
                iter.next()
                    .cloned()
                    .ok_or_else(|| format!("{} needs a value", flag))
            };
            match arg.as_str() {
                "--api-url" | "-u" => self.api_url = value("--api-url")?,
                "--timeout" | "-t" => {
                    self.request_timeout_secs = parse_secs("--timeout", &value("--timeout")?)?
                }
                "--log-file" => self.log_file = PathBuf::from(value("--log-file")?),
                other => return Err(format!("Unknown argument: {}", other)),
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

fn parse_secs(name: &str, raw: &str) -> Result<u64, String> {
    raw.trim()
        .parse()
        .map_err(|_| format!("{} must be a whole number of seconds, got {:?}", name, raw))
}

pub const USAGE: &str = "Usage: query-console [--api-url <url>] [--timeout <secs>] [--log-file <path>]";

/// Global commands list
pub const COMMANDS: &[(&str, &str)] = &[
    ("/help", "Show available commands"),
    ("/clear", "Reset the console"),
    ("/raw", "Toggle raw Markdown narrative"),
    ("/copy", "Copy narrative to clipboard"),
    ("/endpoint", "Show analysis endpoint"),
    ("/quit", "Exit"),
];

/// Example questions shown on the idle screen
pub const EXAMPLE_QUERIES: &[&str] = &[
    "GDP growth in India vs China since 2010",
    "Inflation trend in Germany",
    "Unemployment rate in Japan 2015-2022",
];
