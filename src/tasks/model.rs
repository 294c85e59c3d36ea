use crate::format::{log_severity, opt_datetime, status_severity, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

/// 后台任务状态（状态流转由服务端负责）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Received,
    Started,
    Progress,
    Success,
    Failure,
    Retry,
    Revoked,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 9] = [
        TaskStatus::Pending,
        TaskStatus::Received,
        TaskStatus::Started,
        TaskStatus::Progress,
        TaskStatus::Success,
        TaskStatus::Failure,
        TaskStatus::Retry,
        TaskStatus::Revoked,
        TaskStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Received => "RECEIVED",
            TaskStatus::Started => "STARTED",
            TaskStatus::Progress => "PROGRESS",
            TaskStatus::Success => "SUCCESS",
            TaskStatus::Failure => "FAILURE",
            TaskStatus::Retry => "RETRY",
            TaskStatus::Revoked => "REVOKED",
            TaskStatus::Cancelled => "CANCELLED",
        }
    }

    /// 人类可读状态
    pub fn display(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Received => "Received",
            TaskStatus::Started => "Started",
            TaskStatus::Progress => "In Progress",
            TaskStatus::Success => "Completed",
            TaskStatus::Failure => "Failed",
            TaskStatus::Retry => "Retrying",
            TaskStatus::Revoked | TaskStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self,
            TaskStatus::Pending | TaskStatus::Received | TaskStatus::Started | TaskStatus::Progress
        )
    }

    /// 终态：成功 / 失败 / 取消 / 撤销
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Success | TaskStatus::Failure | TaskStatus::Cancelled | TaskStatus::Revoked
        )
    }

    pub fn is_completed(&self) -> bool {
        self.is_terminal()
    }

    pub fn can_retry(&self) -> bool {
        matches!(
            self,
            TaskStatus::Failure | TaskStatus::Cancelled | TaskStatus::Revoked
        )
    }

    pub fn can_cancel(&self) -> bool {
        self.is_running()
    }

    pub fn can_delete(&self, force: bool) -> bool {
        force || self.is_terminal()
    }

    pub fn severity(&self) -> Severity {
        status_severity(*self)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        TaskStatus::ALL
            .iter()
            .copied()
            .find(|st| st.as_str() == upper)
            .ok_or_else(|| format!("未知任务状态: {}", s))
    }
}

/// 任务类型；未知类型原样保留
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskType {
    SecuritiesImport,
    DataEnrichment,
    OhlcvImport,
    Other(String),
}

impl TaskType {
    pub fn as_str(&self) -> &str {
        match self {
            TaskType::SecuritiesImport => "SECURITIES_IMPORT",
            TaskType::DataEnrichment => "DATA_ENRICHMENT",
            TaskType::OhlcvImport => "OHLCV_IMPORT",
            TaskType::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for TaskType {
    fn from(s: String) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "SECURITIES_IMPORT" => TaskType::SecuritiesImport,
            "DATA_ENRICHMENT" => TaskType::DataEnrichment,
            "OHLCV_IMPORT" => TaskType::OhlcvImport,
            _ => TaskType::Other(s),
        }
    }
}

impl From<TaskType> for String {
    fn from(t: TaskType) -> Self {
        t.as_str().to_string()
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 任务列表行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: String,
    #[serde(default)]
    pub celery_task_id: Option<String>,
    #[serde(default)]
    pub task_name: String,
    pub task_type: TaskType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub progress_percentage: u32,
    #[serde(default)]
    pub current_message: Option<String>,
    #[serde(default)]
    pub current_step: Option<u32>,
    #[serde(default)]
    pub total_steps: Option<u32>,
    #[serde(default, deserialize_with = "opt_datetime")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "opt_datetime")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "opt_datetime")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "opt_datetime")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub execution_time_seconds: Option<u64>,
    #[serde(default)]
    pub retry_count: u32,
}

impl TaskSummary {
    pub fn duration_display(&self) -> String {
        crate::format::format_duration(self.execution_time_seconds)
    }

    /// `3/10` 形式的步骤进度
    pub fn step_progress(&self) -> Option<String> {
        match (self.current_step, self.total_steps) {
            (Some(cur), Some(total)) if total > 0 => Some(format!("{}/{}", cur, total)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStep {
    pub id: String,
    #[serde(default)]
    pub task_run_id: Option<String>,
    pub step_name: String,
    pub step_order: i32,
    #[serde(default)]
    pub title: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub result_data: Option<Value>,
    #[serde(default, deserialize_with = "opt_datetime")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "opt_datetime")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskLog {
    pub id: String,
    #[serde(default)]
    pub task_run_id: Option<String>,
    pub level: String,
    pub message: String,
    #[serde(default)]
    pub extra_data: Option<Value>,
    #[serde(default, deserialize_with = "opt_datetime")]
    pub created_at: Option<DateTime<Utc>>,
}

impl TaskLog {
    pub fn level_display(&self) -> String {
        self.level.to_ascii_uppercase()
    }

    pub fn is_error(&self) -> bool {
        matches!(self.level_display().as_str(), "ERROR" | "CRITICAL")
    }

    pub fn is_warning(&self) -> bool {
        self.level_display() == "WARNING"
    }

    pub fn severity(&self) -> Severity {
        log_severity(&self.level)
    }
}

/// 任务详情：列表字段 + 参数/结果/错误 + 步骤和日志
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub summary: TaskSummary,
    #[serde(default)]
    pub input_parameters: Option<Value>,
    #[serde(default)]
    pub result_data: Option<Value>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub error_traceback: Option<String>,
    #[serde(default)]
    pub logs: Vec<TaskLog>,
    #[serde(default)]
    pub steps: Vec<TaskStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSummaryStats {
    pub total_steps: usize,
    pub completed_steps: usize,
    pub failed_steps: usize,
    pub total_logs: usize,
    pub error_logs: usize,
    pub warning_logs: usize,
}

impl TaskDetail {
    pub fn has_error_details(&self) -> bool {
        self.error_message.as_deref().is_some_and(|s| !s.is_empty())
            || self.error_traceback.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn summary_stats(&self) -> TaskSummaryStats {
        TaskSummaryStats {
            total_steps: self.steps.len(),
            completed_steps: self
                .steps
                .iter()
                .filter(|s| s.status == TaskStatus::Success)
                .count(),
            failed_steps: self
                .steps
                .iter()
                .filter(|s| s.status == TaskStatus::Failure)
                .count(),
            total_logs: self.logs.len(),
            error_logs: self.logs.iter().filter(|l| l.is_error()).count(),
            warning_logs: self.logs.iter().filter(|l| l.is_warning()).count(),
        }
    }

    /// 步骤按 step_order 排序
    pub fn ordered_steps(&self) -> Vec<&TaskStep> {
        let mut steps: Vec<&TaskStep> = self.steps.iter().collect();
        steps.sort_by_key(|s| s.step_order);
        steps
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningTaskInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub progress_percentage: Option<u32>,
    #[serde(default)]
    pub current_message: Option<String>,
}

/// GET /tasks/stats/overview 快照
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStats {
    #[serde(default)]
    pub total_tasks: u64,
    #[serde(default)]
    pub running_tasks: u64,
    #[serde(default)]
    pub recent_tasks_24h: u64,
    #[serde(default)]
    pub recent_failures_7d: u64,
    #[serde(default)]
    pub success_rate_percentage: f64,
    #[serde(default)]
    pub status_breakdown: BTreeMap<String, u64>,
    #[serde(default)]
    pub type_breakdown: BTreeMap<String, u64>,
    #[serde(default)]
    pub running_task_details: Vec<RunningTaskInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakdownRow {
    pub label: String,
    pub count: u64,
    pub percentage: u32,
}

/// count / total * 100 四舍五入；total 为 0 时返回 0
pub fn get_percentage(count: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    ((count as f64 / total as f64) * 100.0).round() as u32
}

/// 分组占比，按数量降序
pub fn breakdown_rows(group: &BTreeMap<String, u64>) -> Vec<BreakdownRow> {
    let total: u64 = group.values().sum();
    let mut rows: Vec<BreakdownRow> = group
        .iter()
        .map(|(label, &count)| BreakdownRow {
            label: label.clone(),
            count,
            percentage: get_percentage(count, total),
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    rows
}

impl TaskStats {
    pub fn status_rows(&self) -> Vec<BreakdownRow> {
        breakdown_rows(&self.status_breakdown)
    }

    pub fn type_rows(&self) -> Vec<BreakdownRow> {
        breakdown_rows(&self.type_breakdown)
    }
}

/// DELETE /tasks/{id} 的返回
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteResult {
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub task_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_enabled_only_from_failed_or_cancelled() {
        assert!(TaskStatus::Failure.can_retry());
        assert!(TaskStatus::Cancelled.can_retry());
        assert!(TaskStatus::Revoked.can_retry());
        assert!(!TaskStatus::Success.can_retry());
        for st in [
            TaskStatus::Pending,
            TaskStatus::Received,
            TaskStatus::Started,
            TaskStatus::Progress,
            TaskStatus::Retry,
        ] {
            assert!(!st.can_retry(), "{} should not be retryable", st);
        }
    }

    #[test]
    fn cancel_enabled_only_while_running() {
        for st in [
            TaskStatus::Pending,
            TaskStatus::Received,
            TaskStatus::Started,
            TaskStatus::Progress,
        ] {
            assert!(st.can_cancel());
        }
        for st in TaskStatus::ALL.iter().filter(|s| s.is_terminal()) {
            assert!(!st.can_cancel(), "{} is terminal", st);
        }
    }

    #[test]
    fn delete_requires_terminal_unless_forced() {
        assert!(TaskStatus::Success.can_delete(false));
        assert!(!TaskStatus::Progress.can_delete(false));
        assert!(TaskStatus::Progress.can_delete(true));
        // RETRY 既不是运行中也不是终态
        assert!(!TaskStatus::Retry.is_running());
        assert!(!TaskStatus::Retry.is_terminal());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("failure".parse::<TaskStatus>(), Ok(TaskStatus::Failure));
        assert_eq!(" PROGRESS ".parse::<TaskStatus>(), Ok(TaskStatus::Progress));
        assert!("DONE".parse::<TaskStatus>().is_err());
        assert_eq!(TaskStatus::Progress.display(), "In Progress");
        assert_eq!(TaskStatus::Revoked.display(), "Cancelled");
    }

    #[test]
    fn percentage_handles_zero_total_and_rounds() {
        assert_eq!(get_percentage(5, 0), 0);
        assert_eq!(get_percentage(0, 0), 0);
        assert_eq!(get_percentage(1, 3), 33);
        assert_eq!(get_percentage(2, 3), 67);
        assert_eq!(get_percentage(1, 8), 13);
        assert_eq!(get_percentage(7, 7), 100);
        for total in 1..50u64 {
            for count in 0..=total {
                let expected = ((count as f64 / total as f64) * 100.0).round() as u32;
                assert_eq!(get_percentage(count, total), expected);
            }
        }
    }

    #[test]
    fn breakdown_sorted_by_count() {
        let mut group = BTreeMap::new();
        group.insert("SUCCESS".to_string(), 120);
        group.insert("FAILURE".to_string(), 8);
        group.insert("PENDING".to_string(), 2);
        let rows = breakdown_rows(&group);
        assert_eq!(rows[0].label, "SUCCESS");
        assert_eq!(rows[0].percentage, 92);
        assert_eq!(rows[2].label, "PENDING");
        assert!(breakdown_rows(&BTreeMap::new()).is_empty());
    }

    #[test]
    fn task_type_keeps_unknown_values() {
        let t: TaskType = serde_json::from_str(r#""SECURITIES_IMPORT""#).unwrap();
        assert_eq!(t, TaskType::SecuritiesImport);
        let t: TaskType = serde_json::from_str(r#""BACKFILL""#).unwrap();
        assert_eq!(t, TaskType::Other("BACKFILL".to_string()));
        assert_eq!(serde_json::to_string(&t).unwrap(), r#""BACKFILL""#);
    }

    #[test]
    fn detail_deserializes_with_steps_and_logs() {
        let body = r#"{
            "id": "9f1c", "celery_task_id": "c-1", "task_name": "import_securities_task",
            "task_type": "SECURITIES_IMPORT", "title": "Import securities", "description": null,
            "status": "FAILURE", "progress_percentage": 40, "current_message": "parsing",
            "started_at": "2024-01-01T10:00:00", "completed_at": "2024-01-01T10:02:05+05:30",
            "created_at": "2024-01-01T09:59:59Z", "updated_at": "2024-01-01T10:02:05Z",
            "user_id": null, "execution_time_seconds": 125, "retry_count": 1,
            "input_parameters": {}, "result_data": null,
            "error_message": "boom", "error_traceback": "Traceback...",
            "steps": [
                {"id": "s2", "task_run_id": "9f1c", "step_name": "save", "step_order": 2, "title": "Save", "status": "FAILURE", "result_data": null, "created_at": "2024-01-01T10:01:00Z", "updated_at": "2024-01-01T10:01:00Z"},
                {"id": "s1", "task_run_id": "9f1c", "step_name": "fetch", "step_order": 1, "title": "Fetch", "status": "SUCCESS", "result_data": {"rows": 10}, "created_at": "2024-01-01T10:00:00Z", "updated_at": "2024-01-01T10:00:30Z"}
            ],
            "logs": [
                {"id": "l1", "task_run_id": "9f1c", "level": "info", "message": "start", "extra_data": null, "created_at": "2024-01-01T10:00:00Z"},
                {"id": "l2", "task_run_id": "9f1c", "level": "ERROR", "message": "boom", "extra_data": {"row": 3}, "created_at": "2024-01-01T10:01:00Z"},
                {"id": "l3", "task_run_id": "9f1c", "level": "warning", "message": "slow", "extra_data": null, "created_at": "2024-01-01T10:01:10Z"}
            ]
        }"#;
        let detail: TaskDetail = serde_json::from_str(body).unwrap();
        assert_eq!(detail.summary.status, TaskStatus::Failure);
        assert_eq!(detail.summary.duration_display(), "2m 5s");
        assert!(detail.summary.started_at.is_some());
        assert!(detail.has_error_details());

        let stats = detail.summary_stats();
        assert_eq!(stats.total_steps, 2);
        assert_eq!(stats.completed_steps, 1);
        assert_eq!(stats.failed_steps, 1);
        assert_eq!(stats.error_logs, 1);
        assert_eq!(stats.warning_logs, 1);

        let ordered: Vec<&str> = detail.ordered_steps().iter().map(|s| s.step_name.as_str()).collect();
        assert_eq!(ordered, vec!["fetch", "save"]);
    }

    #[test]
    fn stats_read_backend_field_names() {
        let body = r#"{"total_tasks":150,"running_tasks":3,"recent_tasks_24h":12,"recent_failures_7d":2,
            "success_rate_percentage":94.5,"status_breakdown":{"SUCCESS":120,"FAILURE":8},
            "type_breakdown":{"SECURITIES_IMPORT":140,"DATA_ENRICHMENT":10},
            "running_task_details":[{"id":"a","title":"Import","progress_percentage":50}]}"#;
        let stats: TaskStats = serde_json::from_str(body).unwrap();
        assert_eq!(stats.total_tasks, 150);
        assert_eq!(stats.running_task_details[0].progress_percentage, Some(50));
        assert_eq!(stats.type_rows()[0].percentage, 93);
    }
}
