use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, StudioError};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub reload: bool,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub default_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_file_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub output: OutputConfig,
    pub upload: UploadConfig,
    pub log_level: Option<String>,
    pub log_json: bool,
    pub log_file: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8000,
            reload: true,
            workers: None,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bind(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_reload(mut self, reload: bool) -> Self {
        self.reload = reload;
        self
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        GeminiConfig {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl GeminiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The configured key, ignoring blank values.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            default_dir: PathBuf::from("output"),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfig {
            max_file_bytes: 20 * 1024 * 1024,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            server: ServerConfig::default(),
            gemini: GeminiConfig::default(),
            output: OutputConfig::default(),
            upload: UploadConfig::default(),
            log_level: None,
            log_json: false,
            log_file: None,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, `from_env` passes the process environment.
    pub fn from_source<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();

        let api_key = lookup("GEMINI_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .or_else(|| lookup("GOOGLE_API_KEY"));
        let host = lookup("HOST").unwrap_or(defaults.server.host);
        let port = lookup("PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.server.port);
        let reload = lookup("RELOAD").map_or(defaults.server.reload, |val| {
            val.eq_ignore_ascii_case("true")
        });
        let workers = lookup("WORKERS")
            .and_then(|w| w.parse().ok())
            .filter(|w: &usize| *w > 0);

        let model = lookup("GEMINI_MODEL").unwrap_or(defaults.gemini.model);
        let base_url = lookup("GEMINI_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.gemini.base_url);
        let timeout = lookup("UPSTREAM_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.gemini.timeout);

        let default_dir = lookup("OUTPUT_DIR")
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.output.default_dir);
        let max_file_bytes = lookup("MAX_UPLOAD_MB")
            .and_then(|mb| mb.trim().parse::<usize>().ok())
            .and_then(|mb| mb.checked_mul(1024 * 1024))
            .unwrap_or(defaults.upload.max_file_bytes);

        AppConfig {
            server: ServerConfig {
                host,
                port,
                reload,
                workers,
            },
            gemini: GeminiConfig {
                api_key,
                model,
                base_url,
                timeout,
            },
            output: OutputConfig { default_dir },
            upload: UploadConfig { max_file_bytes },
            log_level: lookup("LOG_LEVEL"),
            log_json: lookup("LOG_FORMAT").map_or(false, |val| val.eq_ignore_ascii_case("json")),
            log_file: lookup("LOG_FILE").filter(|f| !f.trim().is_empty()),
        }
    }

    pub fn with_server(mut self, config: ServerConfig) -> Self {
        self.server = config;
        self
    }

    pub fn with_gemini(mut self, config: GeminiConfig) -> Self {
        self.gemini = config;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output.default_dir = dir.into();
        self
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.upload.max_file_bytes = bytes;
        self
    }

    /// Startup check: the service cannot do anything useful without an API key.
    pub fn validate(&self) -> Result<()> {
        if self.gemini.api_key().is_none() {
            return Err(StudioError::ConfigurationError(
                "GEMINI_API_KEY or GOOGLE_API_KEY must be set".into(),
            ));
        }
        if self.upload.max_file_bytes == 0 {
            return Err(StudioError::ConfigurationError(
                "MAX_UPLOAD_MB must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
