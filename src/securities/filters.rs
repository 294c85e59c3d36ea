/// 证券列表过滤条件
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecurityFilters {
    pub search: Option<String>,
    pub exchange_id: Option<String>,
    pub security_type: Option<String>,
    pub segment: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub is_active: Option<bool>,
    pub is_tradeable: Option<bool>,
    pub is_derivatives_eligible: Option<bool>,
    pub has_options: Option<bool>,
    pub has_futures: Option<bool>,
}

fn parse_bool(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "y" => Ok(true),
        "false" | "no" | "0" | "n" => Ok(false),
        other => Err(format!("布尔值无效: {}", other)),
    }
}

impl SecurityFilters {
    pub fn is_empty(&self) -> bool {
        *self == SecurityFilters::default()
    }

    /// 设置单个字段，值为空或 `-` 表示清除
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        let value = value.trim();
        let text = (!(value.is_empty() || value == "-")).then(|| value.to_string());
        let flag = match text {
            Some(ref v) => Some(parse_bool(v)),
            None => None,
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "q" | "search" => self.search = text,
            "exchange" | "exchange_id" => self.exchange_id = text,
            "type" | "security_type" => self.security_type = text.map(|v| v.to_ascii_uppercase()),
            "segment" => self.segment = text.map(|v| v.to_ascii_uppercase()),
            "sector" => self.sector = text,
            "industry" => self.industry = text,
            "active" | "is_active" => self.is_active = flag.transpose()?,
            "tradeable" | "is_tradeable" => self.is_tradeable = flag.transpose()?,
            "derivatives" | "is_derivatives_eligible" => {
                self.is_derivatives_eligible = flag.transpose()?
            }
            "options" | "has_options" => self.has_options = flag.transpose()?,
            "futures" | "has_futures" => self.has_futures = flag.transpose()?,
            other => return Err(format!("未知过滤字段: {}", other)),
        }
        Ok(())
    }

    pub fn to_query(&self, skip: u64, limit: u64) -> Vec<(String, String)> {
        let mut query = vec![
            ("skip".to_string(), skip.to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        let texts = [
            ("search", &self.search),
            ("exchange_id", &self.exchange_id),
            ("security_type", &self.security_type),
            ("segment", &self.segment),
            ("sector", &self.sector),
            ("industry", &self.industry),
        ];
        for (key, value) in texts {
            if let Some(v) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                query.push((key.to_string(), v.to_string()));
            }
        }
        let flags = [
            ("is_active", self.is_active),
            ("is_tradeable", self.is_tradeable),
            ("is_derivatives_eligible", self.is_derivatives_eligible),
            ("has_options", self.has_options),
            ("has_futures", self.has_futures),
        ];
        for (key, value) in flags {
            if let Some(v) = value {
                query.push((key.to_string(), v.to_string()));
            }
        }
        query
    }

    pub fn describe(&self) -> String {
        let query = self.to_query(0, 0);
        if query.len() == 2 {
            return "无过滤".to_string();
        }
        query[2..]
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
