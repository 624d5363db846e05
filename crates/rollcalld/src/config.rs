//! Daemon configuration: TOML file plus `ROLLCALL_*` environment overrides.

use rollcall_core::{FacePolicy, ARCFACE_MIN_THRESHOLD, DEFAULT_MATCH_THRESHOLD};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_BIND: &str = "127.0.0.1:5000";
const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid bind address '{0}'")]
    InvalidBind(String),
}

/// Daemon configuration: optional TOML file, overridden by `ROLLCALL_*`
/// environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listen address (default: 127.0.0.1:5000).
    pub bind: SocketAddr,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory containing the SCRFD and ArcFace ONNX files.
    pub model_dir: PathBuf,
    /// Euclidean distance below which a face is identified.
    ///
    /// The 0.4 default is on the scale of 128-dim dlib descriptors. The
    /// bundled ArcFace embedder emits unit vectors, where 0.4 means cosine
    /// 0.92; use 1.0 to 1.1 (cosine 0.5 to 0.4) with it.
    pub match_threshold: f32,
    /// Which face to use when an image has several.
    pub face_policy: FacePolicy,
    /// Request body limit; base64 images are large.
    pub max_body_bytes: usize,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
}

/// On-disk form. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    bind: Option<String>,
    db_path: Option<PathBuf>,
    model_dir: Option<PathBuf>,
    match_threshold: Option<f32>,
    face_policy: Option<FacePolicy>,
    max_body_bytes: Option<usize>,
    cors_origins: Option<Vec<String>>,
}

impl FileConfig {
    fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Config {
    /// Load from `ROLLCALL_CONFIG` (if set) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let env = |key: &str| std::env::var(key).ok();
        let file = match env("ROLLCALL_CONFIG") {
            Some(path) => FileConfig::read(Path::new(&path))?,
            None => FileConfig::default(),
        };
        Self::resolve(file, env)
    }

    /// Whether the threshold is stricter than ArcFace descriptors support.
    pub fn threshold_below_arcface_range(&self) -> bool {
        self.match_threshold < ARCFACE_MIN_THRESHOLD
    }

    fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_dir = env("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = env("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("rollcall");

        let bind = match env_parse::<SocketAddr>(&env, "ROLLCALL_BIND") {
            Some(addr) => addr,
            None => {
                let raw = file.bind.as_deref().unwrap_or(DEFAULT_BIND);
                raw.parse().map_err(|_| ConfigError::InvalidBind(raw.to_string()))?
            }
        };

        let mut match_threshold = env_parse(&env, "ROLLCALL_MATCH_THRESHOLD")
            .or(file.match_threshold)
            .unwrap_or(DEFAULT_MATCH_THRESHOLD);
        if !(match_threshold.is_finite() && match_threshold > 0.0) {
            tracing::warn!(match_threshold, "match threshold must be positive; using default");
            match_threshold = DEFAULT_MATCH_THRESHOLD;
        }

        let cors_origins = match env("ROLLCALL_CORS_ORIGINS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            None => file.cors_origins.unwrap_or_default(),
        };

        Ok(Self {
            bind,
            db_path: env("ROLLCALL_DB_PATH")
                .map(PathBuf::from)
                .or(file.db_path)
                .unwrap_or_else(|| data_dir.join("users.db")),
            model_dir: env("ROLLCALL_MODEL_DIR")
                .map(PathBuf::from)
                .or(file.model_dir)
                .unwrap_or_else(|| data_dir.join("models")),
            match_threshold,
            face_policy: env_parse(&env, "ROLLCALL_FACE_POLICY")
                .or(file.face_policy)
                .unwrap_or_default(),
            max_body_bytes: env_parse(&env, "ROLLCALL_MAX_BODY_BYTES")
                .or(file.max_body_bytes)
                .unwrap_or(DEFAULT_MAX_BODY_BYTES),
            cors_origins,
        })
    }
}

/// Parse an environment override, ignoring (with a warning) values that do
/// not parse.
fn env_parse<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = env(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::resolve(FileConfig::default(), env_from(&[("HOME", "/home/ops")])).unwrap();
        assert_eq!(cfg.bind, "127.0.0.1:5000".parse().unwrap());
        assert_eq!(cfg.db_path, PathBuf::from("/home/ops/.local/share/rollcall/users.db"));
        assert_eq!(cfg.model_dir, PathBuf::from("/home/ops/.local/share/rollcall/models"));
        assert_eq!(cfg.match_threshold, 0.4);
        assert_eq!(cfg.face_policy, FacePolicy::First);
        assert_eq!(cfg.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert!(cfg.cors_origins.is_empty());
    }

    #[test]
    fn test_xdg_data_home() {
        let cfg = Config::resolve(FileConfig::default(), env_from(&[("XDG_DATA_HOME", "/srv/data")])).unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("/srv/data/rollcall/users.db"));
    }

    #[test]
    fn test_file_values_used() {
        let file: FileConfig = toml::from_str(
            r#"
            bind = "0.0.0.0:8080"
            match_threshold = 0.55
            face_policy = "largest"
            cors_origins = ["http://localhost:3000"]
            "#,
        )
        .unwrap();
        let cfg = Config::resolve(file, env_from(&[])).unwrap();
        assert_eq!(cfg.bind.port(), 8080);
        assert_eq!(cfg.match_threshold, 0.55);
        assert_eq!(cfg.face_policy, FacePolicy::Largest);
        assert_eq!(cfg.cors_origins, vec!["http://localhost:3000".to_string()]);
    }

    #[test]
    fn test_env_overrides_file() {
        let file: FileConfig = toml::from_str("face_policy = \"largest\"\nmatch_threshold = 0.55").unwrap();
        let cfg = Config::resolve(
            file,
            env_from(&[
                ("ROLLCALL_FACE_POLICY", "most_confident"),
                ("ROLLCALL_MATCH_THRESHOLD", "0.3"),
                ("ROLLCALL_CORS_ORIGINS", "https://a.example, https://b.example,"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.face_policy, FacePolicy::MostConfident);
        assert_eq!(cfg.match_threshold, 0.3);
        assert_eq!(cfg.cors_origins.len(), 2);
    }

    #[test]
    fn test_bad_env_value_falls_back() {
        let cfg = Config::resolve(
            FileConfig::default(),
            env_from(&[
                ("ROLLCALL_FACE_POLICY", "biggest"),
                ("ROLLCALL_MATCH_THRESHOLD", "-1"),
                ("ROLLCALL_BIND", "not-an-address"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.face_policy, FacePolicy::First);
        assert_eq!(cfg.match_threshold, DEFAULT_MATCH_THRESHOLD);
        assert_eq!(cfg.bind.port(), 5000);
    }

    #[test]
    fn test_bad_file_bind_is_an_error() {
        let file: FileConfig = toml::from_str("bind = \"localhost\"").unwrap();
        assert!(matches!(
            Config::resolve(file, env_from(&[])),
            Err(ConfigError::InvalidBind(_))
        ));
    }

    #[test]
    fn test_arcface_threshold_range() {
        let mut cfg = Config::resolve(FileConfig::default(), env_from(&[])).unwrap();
        assert!(cfg.threshold_below_arcface_range(), "0.4 default is dlib-scale");

        cfg.match_threshold = 1.05;
        assert!(!cfg.threshold_below_arcface_range());
    }

    #[test]
    fn test_unknown_file_key_rejected() {
        assert!(toml::from_str::<FileConfig>("threshold = 0.4").is_err());
    }
}
