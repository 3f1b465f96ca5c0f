//! Config - 設定ファイル（`overseer.toml`）と環境変数による上書き
//!
//! すべてのセクションとフィールドに既定値があるので、空のファイルや
//! ファイルなしでも使える設定になる。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app::{EvalSettings, RunSettings};
use crate::impls::CommandSpec;

pub const DEFAULT_CONFIG_FILE: &str = "overseer.toml";

pub const ENV_CACHE_DIR: &str = "OVERSEER_CACHE_DIR";
pub const ENV_LOG_LEVEL: &str = "OVERSEER_LOG_LEVEL";

/// ConfigError は設定の読み込み・検証エラー
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("fail to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("fail to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// AppConfig は `overseer.toml` 全体
///
/// 未知のセクションはタイプミスとみなして拒否する。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub run: RunConfig,
    pub eval: EvalConfig,
    pub cache: CacheConfig,
    pub query: CommandConfig,
    pub policy: CommandConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub concurrency: usize,
    /// 未設定ならクエリごとの締め切りなし
    pub query_timeout_secs: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            query_timeout_secs: None,
        }
    }
}

impl RunConfig {
    /// CLI の `--reset` と合わせて RunSettings にする
    pub fn settings(&self, reset: bool) -> RunSettings {
        RunSettings {
            concurrency: self.concurrency,
            query_timeout: self.query_timeout_secs.map(Duration::from_secs),
            reset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    pub concurrency: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

impl EvalConfig {
    pub fn settings(&self) -> EvalSettings {
        EvalSettings {
            concurrency: self.concurrency,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// プロセス内のみ。Run と Eval が同じプロセスのときだけ意味がある
    Memory,
    #[default]
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::File,
            dir: PathBuf::from(".overseer/cache"),
        }
    }
}

/// 外部プログラムの argv: `command = ["psql", "-At", "--csv"]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub command: Vec<String>,
}

impl CommandConfig {
    /// 未設定（空）なら None
    pub fn spec(&self) -> Option<CommandSpec> {
        CommandSpec::from_argv(&self.command)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyKind {
    #[default]
    Stdout,
    File,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub kind: NotifyKind,
    /// `kind = "file"` のとき必須
    pub path: Option<PathBuf>,
}

impl AppConfig {
    /// TOML を解析して検証（`path` はエラーメッセージ用）
    pub fn from_toml(path: &Path, text: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// 値の整合性を検証
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.run.concurrency == 0 {
            return Err(ConfigError::Invalid("run.concurrency must be > 0".into()));
        }
        if self.eval.concurrency == 0 {
            return Err(ConfigError::Invalid("eval.concurrency must be > 0".into()));
        }
        if self.run.query_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "run.query_timeout_secs must be > 0".into(),
            ));
        }
        if self.notify.kind == NotifyKind::File && self.notify.path.is_none() {
            return Err(ConfigError::Invalid(
                "notify.path is required when notify.kind = \"file\"".into(),
            ));
        }
        Ok(())
    }

    /// `OVERSEER_*` による上書きを適用（空白だけの値は無視）
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = non_blank(ENV_CACHE_DIR) {
            self.cache.dir = PathBuf::from(dir);
        }
        if let Some(level) = non_blank(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
    }
}

/// 設定を読み込む
///
/// # 優先順位
/// 1. 明示された `path`（存在しなければエラー）
/// 2. カレントの `./overseer.toml`（あれば）
/// 3. 既定値
///
/// 環境変数による上書きは最後に適用する。
pub fn load(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let local = Path::new(DEFAULT_CONFIG_FILE);
    let source = match path {
        Some(p) => Some(p),
        None if local.exists() => Some(local),
        None => None,
    };

    let mut cfg = match source {
        Some(p) => {
            let text = std::fs::read_to_string(p).map_err(|source| ConfigError::Read {
                path: p.to_path_buf(),
                source,
            })?;
            AppConfig::from_toml(p, &text)?
        }
        None => AppConfig::default(),
    };

    cfg.apply_env(|key| std::env::var(key).ok());
    Ok(cfg)
}
