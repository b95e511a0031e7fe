use std::path::PathBuf;

use log::warn;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MODEL_PATH: &str = "models/car_price_pipeline.json";
const DEFAULT_LOG_FILE: &str = "app_logs.log";
const DEFAULT_STATIC_DIR: &str = "./static";
const DEFAULT_JSON_LIMIT: usize = 64 * 1024;

/// Process configuration, read once from the environment at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub model_path: PathBuf,
    /// `None` logs to stderr only.
    pub log_file: Option<PathBuf>,
    pub static_dir: PathBuf,
    pub cors_origins: Vec<String>,
    pub json_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            workers: num_cpus::get(),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            log_file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            cors_origins: default_origins(DEFAULT_PORT),
            json_limit: DEFAULT_JSON_LIMIT,
        }
    }
}

fn default_origins(port: u16) -> Vec<String> {
    vec![
        format!("http://localhost:{}", port),
        format!("http://127.0.0.1:{}", port),
    ]
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable numbers fall back to
    /// their defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let port = parse_or(&lookup, "PORT", defaults.port);

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port,
            workers: parse_or(&lookup, "WORKERS", defaults.workers).max(1),
            model_path: lookup("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            log_file: match lookup("LOG_FILE") {
                Some(path) if path.trim().is_empty() => None,
                Some(path) => Some(PathBuf::from(path)),
                None => defaults.log_file,
            },
            static_dir: lookup("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            cors_origins: lookup("CORS_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_else(|| default_origins(port)),
            json_limit: parse_or(&lookup, "JSON_LIMIT_BYTES", defaults.json_limit),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
            default
        }),
        None => default,
    }
}
