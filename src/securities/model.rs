use crate::format::opt_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Decimal 字段可能以字符串或数字返回，统一为字符串
fn opt_decimal<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub id: String,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub trading_hours_start: Option<String>,
    #[serde(default)]
    pub trading_hours_end: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

fn default_currency() -> String {
    "INR".to_string()
}

impl Exchange {
    /// `09:15-15:30`，缺失时为 `-`
    pub fn trading_hours(&self) -> String {
        match (&self.trading_hours_start, &self.trading_hours_end) {
            (Some(s), Some(e)) => format!("{}-{}", s, e),
            _ => "-".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Security {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub isin: Option<String>,
    #[serde(default)]
    pub external_id: Option<i64>,
    #[serde(default)]
    pub exchange_id: Option<String>,
    #[serde(default)]
    pub exchange: Option<Exchange>,
    #[serde(default)]
    pub security_type: String,
    #[serde(default)]
    pub segment: String,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default = "default_lot_size")]
    pub lot_size: i64,
    #[serde(default, deserialize_with = "opt_decimal")]
    pub tick_size: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_tradeable: bool,
    #[serde(default)]
    pub is_derivatives_eligible: bool,
    #[serde(default)]
    pub has_futures: bool,
    #[serde(default)]
    pub has_options: bool,
    #[serde(default)]
    pub underlying_symbol: Option<String>,
    #[serde(default)]
    pub expiration_date: Option<String>,
    #[serde(default)]
    pub contract_month: Option<String>,
    #[serde(default)]
    pub settlement_type: Option<String>,
    #[serde(default, deserialize_with = "opt_decimal")]
    pub contract_size: Option<String>,
    #[serde(default, deserialize_with = "opt_datetime")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "opt_datetime")]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_lot_size() -> i64 {
    1
}

impl Security {
    pub fn is_derivative(&self) -> bool {
        self.underlying_symbol.is_some()
            || self.expiration_date.is_some()
            || self.security_type.eq_ignore_ascii_case("DERIVATIVE")
    }

    pub fn exchange_code(&self) -> &str {
        self.exchange
            .as_ref()
            .map(|e| e.code.as_str())
            .unwrap_or("-")
    }

    /// 行内标记：A 活跃 / T 可交易 / F 期货 / O 期权
    pub fn flags(&self) -> String {
        [
            (self.is_active, 'A'),
            (self.is_tradeable, 'T'),
            (self.has_futures, 'F'),
            (self.has_options, 'O'),
        ]
        .iter()
        .map(|&(on, c)| if on { c } else { '·' })
        .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityStats {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub active: u64,
    #[serde(default)]
    pub futures: u64,
    #[serde(default)]
    pub derivatives: u64,
}

/// 启动后台作业的返回（证券导入 / OHLCV）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResponse {
    pub task_id: String,
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub started_at: Option<String>,
}

/// 后台作业状态（证券导入与 OHLCV 作业的状态接口返回同一结构）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportStatus {
    pub task_id: String,
    pub status: String,
    #[serde(default)]
    pub progress: u32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ImportStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status.to_ascii_uppercase().as_str(),
            "SUCCESS" | "FAILURE" | "REVOKED" | "CANCELLED"
        )
    }
}

/// 取消后台作业的返回
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelImportResponse {
    pub task_id: String,
    pub status: String,
    #[serde(default)]
    pub message: String,
}
