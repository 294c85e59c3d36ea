use super::filters::TaskFilters;
use super::model::{DeleteResult, TaskDetail, TaskLog, TaskStats, TaskStep, TaskSummary};
use crate::session::dto::{Page, PageWindow};
use crate::session::{
    url_tasks_taskid, url_tasks_taskid_cancel, url_tasks_taskid_logs, url_tasks_taskid_retry,
    url_tasks_taskid_steps, ApiError, ApiSession, URL_TASKS, URL_TASKS_STATS,
};
use log::info;
use serde_json::json;
use std::sync::Arc;

/// /api/v1/tasks 的类型化客户端
#[derive(Debug, Clone)]
pub struct TaskClient {
    session: Arc<ApiSession>,
}

impl TaskClient {
    pub fn new(session: Arc<ApiSession>) -> Self {
        Self { session }
    }

    pub async fn list(
        &self,
        filters: &TaskFilters,
        window: PageWindow,
    ) -> Result<Page<TaskSummary>, ApiError> {
        self.session
            .get_page(
                URL_TASKS,
                filters.to_query(window.skip, window.limit),
                window.skip,
                window.limit,
            )
            .await
    }

    pub async fn get_details(&self, task_id: &str) -> Result<TaskDetail, ApiError> {
        self.session.get(&url_tasks_taskid(task_id), Vec::new()).await
    }

    pub async fn get_logs(
        &self,
        task_id: &str,
        skip: u64,
        limit: u64,
        level: Option<&str>,
    ) -> Result<Vec<TaskLog>, ApiError> {
        let mut query = vec![
            ("skip".to_string(), skip.to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        if let Some(level) = level.map(str::trim).filter(|l| !l.is_empty()) {
            query.push(("log_level".to_string(), level.to_ascii_uppercase()));
        }
        self.session.get(&url_tasks_taskid_logs(task_id), query).await
    }

    pub async fn get_steps(&self, task_id: &str) -> Result<Vec<TaskStep>, ApiError> {
        self.session
            .get(&url_tasks_taskid_steps(task_id), Vec::new())
            .await
    }

    pub async fn retry(&self, task_id: &str, reason: Option<&str>) -> Result<TaskSummary, ApiError> {
        info!("重试任务 {} reason={:?}", task_id, reason);
        self.session
            .post(&url_tasks_taskid_retry(task_id), json!({ "reason": reason }))
            .await
    }

    pub async fn cancel(&self, task_id: &str, reason: Option<&str>) -> Result<TaskSummary, ApiError> {
        info!("取消任务 {} reason={:?}", task_id, reason);
        self.session
            .post(&url_tasks_taskid_cancel(task_id), json!({ "reason": reason }))
            .await
    }

    pub async fn delete(&self, task_id: &str, force: bool) -> Result<DeleteResult, ApiError> {
        info!("删除任务 {} force={}", task_id, force);
        self.session
            .delete(
                &url_tasks_taskid(task_id),
                vec![("force".to_string(), force.to_string())],
            )
            .await
    }

    pub async fn stats(&self) -> Result<TaskStats, ApiError> {
        self.session.get(URL_TASKS_STATS, Vec::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::transport::testing::FakeTransport;
    use crate::session::transport::{ApiResponse, RequestBody};
    use crate::storage::MemoryCredentialStore;
    use reqwest::{Method, StatusCode};

    fn client(transport: Arc<FakeTransport>) -> TaskClient {
        let session = ApiSession::new(transport, Arc::new(MemoryCredentialStore::new()));
        TaskClient::new(Arc::new(session))
    }

    #[tokio::test]
    async fn retry_and_cancel_send_reason_body() {
        let transport = Arc::new(FakeTransport::new(|_| {
            ApiResponse::new(
                StatusCode::OK,
                r#"{"success":true,"message":"ok","data":{"id":"t2","task_type":"DATA_ENRICHMENT","status":"PENDING"}}"#,
            )
        }));
        let c = client(transport.clone());

        let task = c.retry("t1", Some("fixed input")).await.unwrap();
        assert_eq!(task.id, "t2");
        c.cancel("t1", None).await.unwrap();

        let reqs = transport.requests();
        assert_eq!(reqs[0].path, "/api/v1/tasks/t1/retry");
        assert_eq!(reqs[0].body, RequestBody::Json(json!({"reason": "fixed input"})));
        assert_eq!(reqs[1].path, "/api/v1/tasks/t1/cancel");
        assert_eq!(reqs[1].body, RequestBody::Json(json!({"reason": null})));
    }

    #[tokio::test]
    async fn delete_passes_force_flag() {
        let transport = Arc::new(FakeTransport::new(|_| {
            ApiResponse::new(StatusCode::OK, r#"{"success":true,"message":"","data":{"deleted":true,"task_id":"t1"}}"#)
        }));
        let c = client(transport.clone());

        assert!(c.delete("t1", true).await.unwrap().deleted);
        let req = &transport.requests_to(&Method::DELETE, "/api/v1/tasks/t1")[0];
        assert_eq!(req.query_value("force"), Some("true"));
    }

    #[tokio::test]
    async fn logs_filter_by_level() {
        let transport = Arc::new(FakeTransport::new(|_| ApiResponse::new(StatusCode::OK, r#"{"data":[],"message":""}"#)));
        let c = client(transport.clone());

        c.get_logs("t1", 0, 100, Some("error")).await.unwrap();
        c.get_logs("t1", 0, 100, None).await.unwrap();
        let reqs = transport.requests();
        assert_eq!(reqs[0].query_value("log_level"), Some("ERROR"));
        assert_eq!(reqs[1].query_value("log_level"), None);
        assert_eq!(reqs[1].query_value("limit"), Some("100"));
    }
}
