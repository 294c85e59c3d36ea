use super::model::OhlcvJob;
use crate::securities::model::{CancelImportResponse, ImportResponse, ImportStatus};
use crate::session::{url_ohlcv_task, url_ohlcv_task_status, ApiError, ApiSession};
use log::info;
use std::sync::Arc;

/// /api/v1/ohlcv 后台作业接口
#[derive(Debug, Clone)]
pub struct OhlcvClient {
    session: Arc<ApiSession>,
}

impl OhlcvClient {
    pub fn new(session: Arc<ApiSession>) -> Self {
        Self { session }
    }

    pub async fn start(&self, job: &OhlcvJob) -> Result<ImportResponse, ApiError> {
        let started: ImportResponse = self.session.post(job.path(), job.body()).await?;
        info!("OHLCV {} 已启动: task_id={}", job.name(), started.task_id);
        Ok(started)
    }

    pub async fn task_status(&self, task_id: &str) -> Result<ImportStatus, ApiError> {
        self.session
            .get(&url_ohlcv_task_status(task_id), Vec::new())
            .await
    }

    /// 仅超级管理员可用
    pub async fn cancel(&self, task_id: &str) -> Result<CancelImportResponse, ApiError> {
        info!("取消 OHLCV 作业: {}", task_id);
        self.session.delete(&url_ohlcv_task(task_id), Vec::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::transport::testing::FakeTransport;
    use crate::session::transport::{ApiResponse, RequestBody};
    use crate::storage::MemoryCredentialStore;
    use reqwest::{Method, StatusCode};

    fn client(transport: Arc<FakeTransport>) -> OhlcvClient {
        let session = ApiSession::new(transport, Arc::new(MemoryCredentialStore::new()));
        OhlcvClient::new(Arc::new(session))
    }

    #[tokio::test]
    async fn start_posts_job_body_to_job_path() {
        let transport = Arc::new(FakeTransport::new(|_| {
            ApiResponse::new(
                StatusCode::OK,
                r#"{"task_id":"o1","status":"PENDING","message":"Weekly OHLCV generation started for 8 weeks back","started_at":"2024-01-01T10:00:00"}"#,
            )
        }));
        let c = client(transport.clone());

        let job = OhlcvJob::Weekly { weeks_back: 8 };
        let started = c.start(&job).await.unwrap();
        assert_eq!(started.task_id, "o1");

        let req = &transport.requests_to(&Method::POST, "/api/v1/ohlcv/weekly/generate")[0];
        match &req.body {
            RequestBody::Json(body) => {
                assert_eq!(body["weeks_back"], 8);
                assert_eq!(body["background"], true);
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[tokio::test]
    async fn status_and_cancel_use_task_paths() {
        let transport = Arc::new(FakeTransport::new(|req| match req.method.as_str() {
            "GET" => ApiResponse::new(
                StatusCode::OK,
                r#"{"task_id":"o1","status":"PROGRESS","progress":40,"message":"Processing...","result":null,"error":null}"#,
            ),
            _ => ApiResponse::new(
                StatusCode::FORBIDDEN,
                r#"{"detail":"The user doesn't have enough privileges"}"#,
            ),
        }));
        let c = client(transport.clone());

        let status = c.task_status("o1").await.unwrap();
        assert_eq!(status.progress, 40);
        assert!(!status.is_finished());
        assert_eq!(transport.requests()[0].path, "/api/v1/ohlcv/tasks/o1/status");

        let err = c.cancel("o1").await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 403, .. }));
        assert_eq!(transport.requests()[1].path, "/api/v1/ohlcv/tasks/o1");
    }
}
