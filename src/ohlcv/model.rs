use crate::session::{URL_OHLCV_DAILY, URL_OHLCV_HISTORICAL, URL_OHLCV_WEEKLY_GENERATE};
use chrono::NaiveDate;
use serde_json::{json, Value};

pub const DEFAULT_HISTORICAL_FROM: &str = "2000-01-01";
pub const DEFAULT_BATCH_SIZE: u32 = 50;
pub const DEFAULT_WEEKS_BACK: u32 = 4;

/// 后台 OHLCV 作业（均以 background=true 提交，返回任务 id）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OhlcvJob {
    /// 历史日线回补
    Historical {
        from_date: String,
        to_date: Option<String>,
        batch_size: u32,
    },
    /// 当日行情
    Daily,
    /// 由日线重新聚合最近若干周的周线
    Weekly { weeks_back: u32 },
}

impl OhlcvJob {
    /// `historical from=2020-01-01 batch=20` / `daily` / `weekly weeks=8`
    pub fn parse(kind: &str, pairs: &[(String, String)]) -> Result<Self, String> {
        let mut job = match kind.to_ascii_lowercase().as_str() {
            "historical" | "hist" => OhlcvJob::Historical {
                from_date: DEFAULT_HISTORICAL_FROM.to_string(),
                to_date: None,
                batch_size: DEFAULT_BATCH_SIZE,
            },
            "daily" => OhlcvJob::Daily,
            "weekly" => OhlcvJob::Weekly {
                weeks_back: DEFAULT_WEEKS_BACK,
            },
            other => return Err(format!("未知的 OHLCV 作业: {}", other)),
        };
        for (key, value) in pairs {
            job.set(key, value.trim())?;
        }
        if let OhlcvJob::Historical {
            from_date,
            to_date: Some(to_date),
            ..
        } = &job
        {
            // YYYY-MM-DD 可直接按字符串比较
            if to_date < from_date {
                return Err(format!("结束日期 {} 早于开始日期 {}", to_date, from_date));
            }
        }
        Ok(job)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        let name = self.name();
        match (self, key.to_ascii_lowercase().as_str()) {
            (OhlcvJob::Historical { from_date, .. }, "from" | "from_date") => {
                *from_date = parse_day(value)?;
            }
            (OhlcvJob::Historical { to_date, .. }, "to" | "to_date") => {
                *to_date = Some(parse_day(value)?);
            }
            (OhlcvJob::Historical { batch_size, .. }, "batch" | "batch_size") => {
                *batch_size = parse_positive(key, value)?;
            }
            (OhlcvJob::Weekly { weeks_back }, "weeks" | "weeks_back") => {
                *weeks_back = parse_positive(key, value)?;
            }
            (_, other) => return Err(format!("{} 作业不支持参数: {}", name, other)),
        }
        Ok(())
    }

    pub fn name(&self) -> &'static str {
        match self {
            OhlcvJob::Historical { .. } => "historical",
            OhlcvJob::Daily => "daily",
            OhlcvJob::Weekly { .. } => "weekly",
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            OhlcvJob::Historical { .. } => URL_OHLCV_HISTORICAL,
            OhlcvJob::Daily => URL_OHLCV_DAILY,
            OhlcvJob::Weekly { .. } => URL_OHLCV_WEEKLY_GENERATE,
        }
    }

    /// 请求体；不指定 security_ids，由服务端选择全部待处理证券
    pub fn body(&self) -> Value {
        match self {
            OhlcvJob::Historical {
                from_date,
                to_date,
                batch_size,
            } => json!({
                "from_date": from_date,
                "to_date": to_date,
                "batch_size": batch_size,
                "background": true,
            }),
            OhlcvJob::Daily => json!({ "background": true }),
            OhlcvJob::Weekly { weeks_back } => json!({
                "weeks_back": weeks_back,
                "background": true,
            }),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            OhlcvJob::Historical {
                from_date,
                to_date,
                batch_size,
            } => format!(
                "历史行情 {}..{} batch={}",
                from_date,
                to_date.as_deref().unwrap_or("今日"),
                batch_size
            ),
            OhlcvJob::Daily => "当日行情".to_string(),
            OhlcvJob::Weekly { weeks_back } => format!("周线聚合 最近 {} 周", weeks_back),
        }
    }
}

fn parse_day(value: &str) -> Result<String, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| format!("日期需为 YYYY-MM-DD: {}", value))
}

fn parse_positive(key: &str, value: &str) -> Result<u32, String> {
    match value.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("{} 需要正整数: {}", key, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn historical_defaults_and_overrides() {
        let job = OhlcvJob::parse("historical", &[]).unwrap();
        assert_eq!(job.body()["from_date"], "2000-01-01");
        assert_eq!(job.body()["batch_size"], 50);
        assert!(job.body()["to_date"].is_null());

        let job = OhlcvJob::parse(
            "hist",
            &pairs(&[("from", "2020-01-01"), ("to", "2020-12-31"), ("batch", "20")]),
        )
        .unwrap();
        assert_eq!(
            job,
            OhlcvJob::Historical {
                from_date: "2020-01-01".to_string(),
                to_date: Some("2020-12-31".to_string()),
                batch_size: 20,
            }
        );
        assert_eq!(job.path(), "/api/v1/ohlcv/historical");
    }

    #[test]
    fn weekly_and_daily_bodies() {
        let weekly = OhlcvJob::parse("weekly", &pairs(&[("weeks", "8")])).unwrap();
        assert_eq!(weekly.path(), "/api/v1/ohlcv/weekly/generate");
        assert_eq!(weekly.body()["weeks_back"], 8);
        assert_eq!(OhlcvJob::parse("daily", &[]).unwrap().body(), json!({ "background": true }));
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(OhlcvJob::parse("monthly", &[]).is_err());
        assert!(OhlcvJob::parse("historical", &pairs(&[("from", "2020/01/01")])).is_err());
        assert!(OhlcvJob::parse("historical", &pairs(&[("from", "2021-01-01"), ("to", "2020-01-01")])).is_err());
        assert!(OhlcvJob::parse("weekly", &pairs(&[("weeks", "0")])).is_err());
        assert!(OhlcvJob::parse("daily", &pairs(&[("weeks", "2")])).is_err());
    }
}
