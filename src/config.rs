use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://quantpulse.db?mode=rwc";
pub const DEFAULT_PAGE_SIZE: u64 = 25;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// 运行配置（`.env` + 环境变量）
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api_base_url: String,
    pub database_url: String,
    pub page_size: u64,
    pub poll_interval_secs: u64,
    pub http_timeout: Duration,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            username: None,
            password: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源读取；非法数值回退默认值
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let number = |key: &str, default: u64| {
            text(key)
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(default)
        };

        Self {
            api_base_url: text("QP_API_BASE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            database_url: text("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            page_size: number("QP_PAGE_SIZE", DEFAULT_PAGE_SIZE).clamp(1, 1000),
            poll_interval_secs: number("QP_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS),
            http_timeout: Duration::from_secs(
                number("QP_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS).max(1),
            ),
            username: text("QP_USERNAME"),
            password: lookup("QP_PASSWORD").filter(|v| !v.is_empty()),
        }
    }

    pub fn auto_login(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
            _ => None,
        }
    }

    /// 启动信息（显示在日志面板）
    pub fn describe(&self) -> Vec<String> {
        vec![
            format!("API: {}", self.api_base_url),
            format!("数据库: {}", self.database_url),
            format!(
                "分页: {} 条/页, 轮询间隔: {}",
                self.page_size,
                if self.poll_interval_secs == 0 {
                    "关闭".to_string()
                } else {
                    format!("{}s", self.poll_interval_secs)
                }
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(config(&[]), AppConfig::default());
        assert!(config(&[]).auto_login().is_none());
    }

    #[test]
    fn reads_overrides_and_ignores_garbage() {
        let cfg = config(&[
            ("QP_API_BASE_URL", "https://qp.example.com/"),
            ("QP_PAGE_SIZE", "50"),
            ("QP_POLL_INTERVAL_SECS", "soon"),
            ("QP_HTTP_TIMEOUT_SECS", "0"),
            ("QP_USERNAME", "admin@example.com"),
            ("QP_PASSWORD", " secret "),
        ]);
        assert_eq!(cfg.api_base_url, "https://qp.example.com");
        assert_eq!(cfg.page_size, 50);
        assert_eq!(cfg.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
        assert_eq!(cfg.http_timeout, Duration::from_secs(1));
        assert_eq!(cfg.auto_login(), Some(("admin@example.com", " secret ")));
    }
}
