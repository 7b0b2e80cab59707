use std::path::PathBuf;
use std::time::Duration;
use serde::Deserialize;

/// All configuration for the boxoffice backend.
///
/// Precedence (lowest to highest): defaults → config file → env var → CLI arg.
/// CLI arg merging is done by the caller after `Config::load()`.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub db_url: String,

    // Server
    pub port: u16,

    // Logging
    pub log_level: String,
    pub utc: bool,

    // Auth: HS256 secret shared with the token issuer
    pub jwt_secret: String,

    // Reservations
    pub reserve_timeout: Duration,
}

/// Config file layout (~/.boxoffice/config.toml). All fields optional; they
/// layer on top of compiled-in defaults.
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    db_url: Option<String>,
    port: Option<u16>,
    log_level: Option<String>,
    utc: Option<bool>,
    jwt_secret: Option<String>,
    reserve_timeout_ms: Option<u64>,
}

impl Config {
    /// Config directory: ~/.boxoffice/
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".boxoffice")
    }

    /// Config file path: ~/.boxoffice/config.toml
    pub fn file_path() -> PathBuf {
        Self::dir().join("config.toml")
    }

    /// Load config: defaults → config file → env vars.
    /// CLI args should be merged by the caller afterward.
    pub fn load() -> Self {
        let mut config = Self::defaults();

        // Layer 2: config file
        if let Ok(contents) = std::fs::read_to_string(Self::file_path()) {
            if let Ok(file) = toml::from_str::<FileConfig>(&contents) {
                config.apply_file(file);
            }
        }

        // Layer 3: environment variables
        config.apply_env(|key| std::env::var(key).ok());

        config
    }

    // --- Private helpers ---

    fn defaults() -> Self {
        Self {
            db_url: "sqlite:boxoffice.db".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            utc: false,
            jwt_secret: "change-me".to_string(),
            reserve_timeout: Duration::from_secs(5),
        }
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(v) = file.db_url { self.db_url = v; }
        if let Some(v) = file.port { self.port = v; }
        if let Some(v) = file.log_level { self.log_level = v; }
        if let Some(v) = file.utc { self.utc = v; }
        if let Some(v) = file.jwt_secret { self.jwt_secret = v; }
        if let Some(v) = file.reserve_timeout_ms { self.reserve_timeout = Duration::from_millis(v); }
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("BOXOFFICE_DB_URL") { self.db_url = v; }
        if let Some(v) = var("BOXOFFICE_PORT") {
            if let Ok(p) = v.parse() { self.port = p; }
        }
        if let Some(v) = var("BOXOFFICE_LOG_LEVEL") { self.log_level = v; }
        if let Some(v) = var("BOXOFFICE_UTC") {
            self.utc = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Some(v) = var("BOXOFFICE_JWT_SECRET") { self.jwt_secret = v; }
        if let Some(v) = var("BOXOFFICE_RESERVE_TIMEOUT_MS") {
            if let Ok(ms) = v.parse() { self.reserve_timeout = Duration::from_millis(ms); }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn file_then_env_layering() {
        let mut config = Config::defaults();
        let file: FileConfig = toml::from_str(
            r#"
            port = 8080
            jwt_secret = "from-file"
            reserve_timeout_ms = 250
            "#,
        )
        .unwrap();
        config.apply_file(file);
        assert_eq!(config.port, 8080);
        assert_eq!(config.jwt_secret, "from-file");
        assert_eq!(config.reserve_timeout, Duration::from_millis(250));

        let env: HashMap<&str, &str> = HashMap::from([
            ("BOXOFFICE_JWT_SECRET", "from-env"),
            ("BOXOFFICE_UTC", "TRUE"),
            ("BOXOFFICE_PORT", "not-a-port"),
        ]);
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.jwt_secret, "from-env");
        assert!(config.utc);
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_url, "sqlite:boxoffice.db");
    }
}
