use crate::tasks::model::TaskStatus;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// 徽章颜色等级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Info,
    Warning,
    Danger,
    Secondary,
}

pub fn status_severity(status: TaskStatus) -> Severity {
    match status {
        TaskStatus::Success => Severity::Success,
        TaskStatus::Failure => Severity::Danger,
        TaskStatus::Started | TaskStatus::Progress => Severity::Info,
        TaskStatus::Pending | TaskStatus::Received | TaskStatus::Retry => Severity::Warning,
        TaskStatus::Revoked | TaskStatus::Cancelled => Severity::Secondary,
    }
}

pub fn log_severity(level: &str) -> Severity {
    match level.to_ascii_uppercase().as_str() {
        "INFO" => Severity::Info,
        "WARNING" | "WARN" => Severity::Warning,
        "ERROR" | "CRITICAL" => Severity::Danger,
        _ => Severity::Secondary,
    }
}

/// 解析后端时间戳：RFC3339、无时区的 ISO 时间（按 UTC）、纯日期
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}

/// serde 辅助：可空时间戳，无法解析时视为空
pub fn opt_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

/// 本地时区 `YYYY-MM-DD HH:MM:SS`，缺失显示 `-`
pub fn format_datetime(dt: Option<DateTime<Utc>>) -> String {
    match dt {
        Some(dt) => dt.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}

/// 相对时间：just now / 5m ago / 3h ago / 2d ago
pub fn format_relative(dt: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(dt) = dt else {
        return "-".to_string();
    };
    let secs = (now - dt).num_seconds();
    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86_400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86_400)
    }
}

/// 千分位
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn format_duration(seconds: Option<u64>) -> String {
    match seconds {
        None => "N/A".to_string(),
        Some(s) if s < 60 => format!("{}s", s),
        Some(s) if s < 3600 => format!("{}m {}s", s / 60, s % 60),
        Some(s) => format!("{}h {}m", s / 3600, (s % 3600) / 60),
    }
}

/// 按字符截断，超出部分以 `…` 结尾
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", keep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn duration_buckets() {
        assert_eq!(format_duration(None), "N/A");
        assert_eq!(format_duration(Some(0)), "0s");
        assert_eq!(format_duration(Some(59)), "59s");
        assert_eq!(format_duration(Some(125)), "2m 5s");
        assert_eq!(format_duration(Some(3600)), "1h 0m");
        assert_eq!(format_duration(Some(7385)), "2h 3m");
    }

    #[test]
    fn numbers_get_thousands_separators() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn timestamps_with_and_without_offset() {
        let utc = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-01T10:00:00Z"), Some(utc));
        assert_eq!(parse_timestamp("2024-01-01T10:00:00"), Some(utc));
        assert_eq!(parse_timestamp("2024-01-01T15:30:00+05:30"), Some(utc));
        assert_eq!(parse_timestamp("2024-01-01T10:00:00.250000").map(|d| d.timestamp()), Some(utc.timestamp()));
        assert!(parse_timestamp("2024-01-01").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn missing_datetime_renders_dash() {
        assert_eq!(format_datetime(None), "-");
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(format_datetime(Some(dt)).len(), 19);
    }

    #[test]
    fn relative_time() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(format_relative(Some(now - Duration::seconds(10)), now), "just now");
        assert_eq!(format_relative(Some(now - Duration::minutes(5)), now), "5m ago");
        assert_eq!(format_relative(Some(now - Duration::hours(3)), now), "3h ago");
        assert_eq!(format_relative(Some(now - Duration::days(2)), now), "2d ago");
        assert_eq!(format_relative(None, now), "-");
    }

    #[test]
    fn badges() {
        assert_eq!(status_severity(TaskStatus::Failure), Severity::Danger);
        assert_eq!(status_severity(TaskStatus::Progress), Severity::Info);
        assert_eq!(log_severity("debug"), Severity::Secondary);
        assert_eq!(log_severity("INFO"), Severity::Info);
        assert_eq!(log_severity("warning"), Severity::Warning);
        assert_eq!(log_severity("CRITICAL"), Severity::Danger);
    }

    #[test]
    fn truncates_on_char_boundary() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("证券导入任务", 4), "证券导…");
    }
}
