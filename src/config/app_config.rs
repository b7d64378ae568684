// ==========================================
// 新品工单表单配置 - 运行配置
// ==========================================
// 来源: 环境变量（未设置时取默认值）
// 约束: 设置了但无法解析的值是配置错误，不静默回退
// ==========================================

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::api::form_config_api::CacheSettings;
use crate::perf::{flag_on, SqlPerfSettings};

// ==========================================
// 环境变量键
// ==========================================
pub mod env_keys {
    pub const DB_PATH: &str = "TICKET_FORM_DB_PATH";
    pub const BIND_ADDR: &str = "TICKET_FORM_BIND_ADDR";
    pub const CACHE_TTL_SECS: &str = "TICKET_FORM_CACHE_TTL_SECS";
    pub const CACHE_MAX_ENTRIES: &str = "TICKET_FORM_CACHE_MAX_ENTRIES";
    pub const SEED_DEFAULT: &str = "TICKET_FORM_SEED_DEFAULT";
}

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;
pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 256;

/// 配置错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("环境变量 {key} 取值无效: {value} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// 运行配置
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub db_path: String,
    pub bind_addr: SocketAddr,
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
    pub seed_default: bool,
    pub sql_perf: SqlPerfSettings,
}

impl AppConfig {
    /// 从进程环境变量加载
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.sql_perf = SqlPerfSettings::from_env();
        Ok(config)
    }

    /// 从任意键值来源加载（测试可注入）
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let db_path = match get(env_keys::DB_PATH) {
            Some(path) => path,
            None => get_default_db_path(),
        };

        let bind_raw = get(env_keys::BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| invalid(env_keys::BIND_ADDR, &bind_raw, e))?;

        let cache_ttl_secs = match get(env_keys::CACHE_TTL_SECS) {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|e| invalid(env_keys::CACHE_TTL_SECS, &raw, e))?,
            None => DEFAULT_CACHE_TTL_SECS,
        };

        let cache_max_entries = match get(env_keys::CACHE_MAX_ENTRIES) {
            Some(raw) => {
                let n = raw
                    .parse::<usize>()
                    .map_err(|e| invalid(env_keys::CACHE_MAX_ENTRIES, &raw, e))?;
                if n == 0 {
                    return Err(invalid(env_keys::CACHE_MAX_ENTRIES, &raw, "必须大于 0"));
                }
                n
            }
            None => DEFAULT_CACHE_MAX_ENTRIES,
        };

        let seed_default = match get(env_keys::SEED_DEFAULT) {
            Some(raw) => parse_bool(&raw).ok_or_else(|| invalid(env_keys::SEED_DEFAULT, &raw, "不是布尔值"))?,
            None => true,
        };

        Ok(Self {
            db_path,
            bind_addr,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            cache_max_entries,
            seed_default,
            sql_perf: SqlPerfSettings {
                enabled: false,
                slow_sql_ms: 0,
            },
        })
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            ttl: self.cache_ttl,
            max_entries: self.cache_max_entries,
        }
    }
}

fn invalid(key: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    if flag_on(raw) {
        return Some(true);
    }
    match raw.to_ascii_lowercase().as_str() {
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// 获取默认数据库路径
///
/// 用户数据目录下的 ticket-form-config/ticket_form_config.db；
/// 拿不到数据目录时回退到当前目录
pub fn get_default_db_path() -> String {
    let mut path = PathBuf::from("./ticket_form_config.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        let dir = data_dir.join("ticket-form-config-dev");
        #[cfg(not(debug_assertions))]
        let dir = data_dir.join("ticket-form-config");

        // best-effort: 建目录失败时打开数据库会暴露错误
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!("创建数据目录失败: {} ({})", dir.display(), e);
        }
        path = dir.join("ticket_form_config.db");
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[(env_keys::DB_PATH, "/tmp/forms.db")])).unwrap();
        assert_eq!(config.db_path, "/tmp/forms.db");
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.cache_ttl, Duration::from_secs(600));
        assert_eq!(config.cache_max_entries, 256);
        assert!(config.seed_default);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            (env_keys::DB_PATH, "/tmp/forms.db"),
            (env_keys::BIND_ADDR, "0.0.0.0:9090"),
            (env_keys::CACHE_TTL_SECS, "0"),
            (env_keys::CACHE_MAX_ENTRIES, "16"),
            (env_keys::SEED_DEFAULT, "off"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.port(), 9090);
        assert!(config.cache_ttl.is_zero());
        assert_eq!(config.cache_settings().max_entries, 16);
        assert!(!config.seed_default);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = AppConfig::from_lookup(lookup_from(&[
            (env_keys::DB_PATH, "/tmp/forms.db"),
            (env_keys::CACHE_TTL_SECS, "ten minutes"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { key: env_keys::CACHE_TTL_SECS, .. }
        ));

        assert!(AppConfig::from_lookup(lookup_from(&[
            (env_keys::DB_PATH, "/tmp/forms.db"),
            (env_keys::BIND_ADDR, "not-an-addr"),
        ]))
        .is_err());

        assert!(AppConfig::from_lookup(lookup_from(&[
            (env_keys::DB_PATH, "/tmp/forms.db"),
            (env_keys::SEED_DEFAULT, "maybe"),
        ]))
        .is_err());
    }
}
