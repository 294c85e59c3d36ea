use super::error::ApiError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 后端统一响应包装 `{success, message, data, errors}`
#[derive(Debug, Deserialize, Serialize)]
pub struct ApiEnvelope<T> {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// 分页响应包装
#[derive(Debug, Deserialize, Serialize)]
pub struct PaginatedEnvelope<T> {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
    #[serde(default)]
    pub errors: Vec<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PaginationMeta {
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PaginationMeta {
    /// 由 skip/limit 窗口推导分页信息（与后端 PaginationMeta.create 一致）
    pub fn from_window(total: u64, skip: u64, limit: u64) -> Self {
        let per_page = limit;
        let page = if per_page > 0 { skip / per_page + 1 } else { 1 };
        let pages = if per_page > 0 {
            total.div_ceil(per_page)
        } else {
            0
        };
        Self {
            total,
            page,
            per_page,
            pages,
            has_next: page < pages,
            has_prev: page > 1,
        }
    }
}

/// skip/limit 分页窗口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub skip: u64,
    pub limit: u64,
}

impl PageWindow {
    pub fn new(limit: u64) -> Self {
        Self {
            skip: 0,
            limit: limit.max(1),
        }
    }

    /// 第 n 页（从 1 开始），偏移量溢出时返回 None
    pub fn at_page(self, page: u64) -> Option<Self> {
        let skip = page.saturating_sub(1).checked_mul(self.limit)?;
        Some(Self {
            skip,
            limit: self.limit,
        })
    }

    /// 按分页信息前进，已在末页时返回 None
    pub fn next(self, meta: &PaginationMeta) -> Option<Self> {
        meta.has_next.then(|| Self {
            skip: self.skip.saturating_add(self.limit),
            limit: self.limit,
        })
    }

    pub fn prev(self, meta: &PaginationMeta) -> Option<Self> {
        (meta.has_prev && self.skip > 0).then(|| Self {
            skip: self.skip.saturating_sub(self.limit),
            limit: self.limit,
        })
    }
}

/// 一页数据
#[derive(Debug, Clone, Default)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: PaginationMeta,
}

/// POST /auth/login 的返回
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// GET /auth/profile 的返回
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UserProfile {
    pub id: Option<String>,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_superuser: bool,
}

/// 解析 `data` 字段；兼容不带包装的裸响应
pub fn decode_data<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ApiError::Decode(format!("{}, 原始报文: {}", e, body)))?;
    let payload = match value {
        Value::Object(mut map)
            if map.contains_key("data")
                && (map.contains_key("success") || map.contains_key("message")) =>
        {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };
    serde_json::from_value(payload).map_err(|e| ApiError::Decode(e.to_string()))
}

/// 解析分页响应；裸数组时按当前窗口补齐分页信息
pub fn decode_page<T: DeserializeOwned>(
    body: &str,
    skip: u64,
    limit: u64,
) -> Result<Page<T>, ApiError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ApiError::Decode(format!("{}, 原始报文: {}", e, body)))?;

    if value.get("pagination").is_some() {
        let env: PaginatedEnvelope<T> =
            serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))?;
        return Ok(Page {
            items: env.data,
            pagination: env.pagination,
        });
    }

    let items: Vec<T> = match value {
        Value::Object(mut map) if map.contains_key("data") => {
            serde_json::from_value(map.remove("data").unwrap_or(Value::Null))
        }
        other => serde_json::from_value(other),
    }
    .map_err(|e| ApiError::Decode(e.to_string()))?;

    let total = skip.saturating_add(items.len() as u64);
    Ok(Page {
        pagination: PaginationMeta::from_window(total, skip, limit),
        items,
    })
}

/// FastAPI 错误体 `{"detail": ...}`
pub fn error_detail(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(v) => match v.get("detail") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => v
                .get("message")
                .and_then(|m| m.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| body.to_string()),
        },
        Err(_) => body.to_string(),
    }
}
