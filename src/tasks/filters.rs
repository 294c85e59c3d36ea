use super::model::{TaskStatus, TaskType};
use crate::format::parse_timestamp;
use std::str::FromStr;

/// 后端允许的排序字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    StartedAt,
    CompletedAt,
    Status,
    TaskType,
    Title,
    ProgressPercentage,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
            SortField::StartedAt => "started_at",
            SortField::CompletedAt => "completed_at",
            SortField::Status => "status",
            SortField::TaskType => "task_type",
            SortField::Title => "title",
            SortField::ProgressPercentage => "progress_percentage",
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created_at" => Ok(SortField::CreatedAt),
            "updated_at" => Ok(SortField::UpdatedAt),
            "started_at" => Ok(SortField::StartedAt),
            "completed_at" => Ok(SortField::CompletedAt),
            "status" => Ok(SortField::Status),
            "task_type" => Ok(SortField::TaskType),
            "title" => Ok(SortField::Title),
            "progress_percentage" => Ok(SortField::ProgressPercentage),
            other => Err(format!("不支持的排序字段: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("排序方向只能是 asc/desc: {}", other)),
        }
    }
}

/// 任务列表过滤条件；空值在序列化时省略
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilters {
    pub task_name: Option<String>,
    pub status: Option<TaskStatus>,
    pub task_type: Option<TaskType>,
    pub created_after: Option<String>,
    pub created_before: Option<String>,
    pub sort_by: Option<SortField>,
    pub sort_order: Option<SortOrder>,
}

impl TaskFilters {
    pub fn is_empty(&self) -> bool {
        *self == TaskFilters::default()
    }

    /// 设置单个字段，值为空或 `-` 表示清除
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        let value = value.trim();
        let cleared = value.is_empty() || value == "-";
        match key.trim().to_ascii_lowercase().as_str() {
            "name" | "task_name" => {
                self.task_name = (!cleared).then(|| value.to_string());
            }
            "status" => {
                self.status = if cleared { None } else { Some(value.parse()?) };
            }
            "type" | "task_type" => {
                // 服务端枚举值为大写
                self.task_type = (!cleared).then(|| TaskType::from(value.to_ascii_uppercase()));
            }
            "after" | "created_after" => {
                self.created_after = if cleared { None } else { Some(validate_iso_date(value)?) };
            }
            "before" | "created_before" => {
                self.created_before = if cleared { None } else { Some(validate_iso_date(value)?) };
            }
            "sort" | "sort_by" => {
                self.sort_by = if cleared { None } else { Some(value.parse()?) };
            }
            "order" | "sort_order" => {
                self.sort_order = if cleared { None } else { Some(value.parse()?) };
            }
            other => return Err(format!("未知过滤字段: {}", other)),
        }
        Ok(())
    }

    /// 分页 + 非空过滤条件
    pub fn to_query(&self, skip: u64, limit: u64) -> Vec<(String, String)> {
        let mut query = vec![
            ("skip".to_string(), skip.to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        let mut push = |key: &str, value: Option<String>| {
            if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
                query.push((key.to_string(), v));
            }
        };
        push("task_name", self.task_name.clone());
        push("status", self.status.map(|s| s.as_str().to_string()));
        push("task_type", self.task_type.as_ref().map(|t| t.as_str().to_string()));
        push("created_after", self.created_after.clone());
        push("created_before", self.created_before.clone());
        push("sort_by", self.sort_by.map(|s| s.as_str().to_string()));
        push("sort_order", self.sort_order.map(|s| s.as_str().to_string()));
        query
    }

    /// 状态栏摘要
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if let Some(ref n) = self.task_name {
            parts.push(format!("name={}", n));
        }
        if let Some(s) = self.status {
            parts.push(format!("status={}", s));
        }
        if let Some(ref t) = self.task_type {
            parts.push(format!("type={}", t));
        }
        if let Some(ref a) = self.created_after {
            parts.push(format!("after={}", a));
        }
        if let Some(ref b) = self.created_before {
            parts.push(format!("before={}", b));
        }
        if let Some(s) = self.sort_by {
            parts.push(format!(
                "sort={} {}",
                s.as_str(),
                self.sort_order.unwrap_or(SortOrder::Desc).as_str()
            ));
        } else if let Some(o) = self.sort_order {
            parts.push(format!("order={}", o.as_str()));
        }
        if parts.is_empty() {
            "无过滤".to_string()
        } else {
            parts.join(" ")
        }
    }
}

/// created_after / created_before 必须是 ISO 日期或时间
pub fn validate_iso_date(value: &str) -> Result<String, String> {
    let value = value.trim();
    parse_timestamp(value)
        .map(|_| value.to_string())
        .ok_or_else(|| format!("日期格式无效（需 ISO 格式，如 2024-01-31）: {}", value))
}
