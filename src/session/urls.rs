/// 登录页路由（401 时强制跳转）
pub const LOGIN_ROUTE: &str = "/auth/login";

/// 认证相关路径
pub const URL_AUTH_LOGIN: &str = "/api/v1/auth/login";
pub const URL_AUTH_PROFILE: &str = "/api/v1/auth/profile";

/// 任务相关路径
pub const URL_TASKS: &str = "/api/v1/tasks";
pub const URL_TASKS_STATS: &str = "/api/v1/tasks/stats/overview";
pub fn url_tasks_taskid(task_id: &str) -> String {
    format!("{}/{}", URL_TASKS, task_id)
}
pub fn url_tasks_taskid_logs(task_id: &str) -> String {
    format!("{}/{}/logs", URL_TASKS, task_id)
}
pub fn url_tasks_taskid_steps(task_id: &str) -> String {
    format!("{}/{}/steps", URL_TASKS, task_id)
}
pub fn url_tasks_taskid_retry(task_id: &str) -> String {
    format!("{}/{}/retry", URL_TASKS, task_id)
}
pub fn url_tasks_taskid_cancel(task_id: &str) -> String {
    format!("{}/{}/cancel", URL_TASKS, task_id)
}

/// 证券相关路径
pub const URL_SECURITIES: &str = "/api/v1/securities";
pub const URL_SECURITIES_STATS: &str = "/api/v1/securities/stats";
pub const URL_SECURITIES_IMPORT: &str = "/api/v1/securities/import";
pub fn url_securities_import_status(task_id: &str) -> String {
    format!("{}/status/{}", URL_SECURITIES_IMPORT, task_id)
}
pub fn url_securities_import_taskid(task_id: &str) -> String {
    format!("{}/{}", URL_SECURITIES_IMPORT, task_id)
}

/// 交易所
pub const URL_EXCHANGES: &str = "/api/v1/exchanges";

/// OHLCV 行情作业
pub const URL_OHLCV_HISTORICAL: &str = "/api/v1/ohlcv/historical";
pub const URL_OHLCV_DAILY: &str = "/api/v1/ohlcv/daily";
pub const URL_OHLCV_WEEKLY_GENERATE: &str = "/api/v1/ohlcv/weekly/generate";
pub fn url_ohlcv_task_status(task_id: &str) -> String {
    format!("/api/v1/ohlcv/tasks/{}/status", task_id)
}
pub fn url_ohlcv_task(task_id: &str) -> String {
    format!("/api/v1/ohlcv/tasks/{}", task_id)
}
