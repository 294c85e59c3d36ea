use super::client::OhlcvClient;
use super::model::OhlcvJob;
use crate::securities::model::{ImportResponse, ImportStatus};
use crate::session::{ActionFailure, ActionResult};
use log::{info, warn};

pub const MSG_START_OHLCV: &str = "启动行情作业失败";
pub const MSG_OHLCV_STATUS: &str = "获取行情作业状态失败";
pub const MSG_CANCEL_OHLCV: &str = "取消行情作业失败";

/// 最近一次 OHLCV 作业及其状态
#[derive(Debug)]
pub struct OhlcvStore {
    client: OhlcvClient,
    pub job: Option<OhlcvJob>,
    pub task_id: Option<String>,
    pub status: Option<ImportStatus>,
}

impl OhlcvStore {
    pub fn new(client: OhlcvClient) -> Self {
        Self {
            client,
            job: None,
            task_id: None,
            status: None,
        }
    }

    pub async fn start(&mut self, job: OhlcvJob) -> ActionResult<ImportResponse> {
        let started = self
            .client
            .start(&job)
            .await
            .map_err(|e| ActionFailure::new(MSG_START_OHLCV, e))?;
        self.job = Some(job);
        self.task_id = Some(started.task_id.clone());
        self.status = None;
        Ok(started)
    }

    /// task_id 为空时查询最近一次启动的作业
    pub async fn fetch_status(&mut self, task_id: Option<&str>) -> ActionResult<Option<ImportStatus>> {
        let Some(id) = task_id.map(str::to_string).or_else(|| self.task_id.clone()) else {
            return Ok(None);
        };
        let status = self
            .client
            .task_status(&id)
            .await
            .map_err(|e| ActionFailure::new(MSG_OHLCV_STATUS, e))?;
        if status.is_finished() {
            info!("OHLCV 作业 {} 结束: {}", id, status.status);
        }
        if self.task_id.as_deref() != Some(id.as_str()) {
            self.job = None;
        }
        self.task_id = Some(id);
        self.status = Some(status.clone());
        Ok(Some(status))
    }

    pub async fn cancel(&mut self, task_id: Option<&str>) -> ActionResult<Option<String>> {
        let Some(id) = task_id.map(str::to_string).or_else(|| self.task_id.clone()) else {
            return Ok(None);
        };
        let resp = self
            .client
            .cancel(&id)
            .await
            .map_err(|e| ActionFailure::new(MSG_CANCEL_OHLCV, e))?;
        if let Err(e) = self.fetch_status(Some(&id)).await {
            warn!("取消后刷新行情作业状态失败: {}", e);
        }
        Ok(Some(resp.message))
    }

    pub fn is_running(&self) -> bool {
        self.status
            .as_ref()
            .map(|s| !s.is_finished())
            .unwrap_or(self.task_id.is_some())
    }

    /// 作业未结束时轮询状态
    pub async fn poll(&mut self) -> ActionResult<()> {
        if !self.is_running() {
            return Ok(());
        }
        self.fetch_status(None).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::transport::testing::FakeTransport;
    use crate::session::transport::{ApiRequest, ApiResponse};
    use crate::session::ApiSession;
    use crate::storage::MemoryCredentialStore;
    use reqwest::{Method, StatusCode};
    use std::sync::Arc;

    fn routed(req: &ApiRequest) -> ApiResponse {
        match (req.method.as_str(), req.path.as_str()) {
            ("POST", "/api/v1/ohlcv/daily") => ApiResponse::new(
                StatusCode::OK,
                r#"{"task_id":"o1","status":"PENDING","message":"Daily OHLCV fetch started for all pending securities","started_at":"2024-01-01T10:00:00"}"#,
            ),
            ("GET", "/api/v1/ohlcv/tasks/o1/status") => ApiResponse::new(
                StatusCode::OK,
                r#"{"task_id":"o1","status":"SUCCESS","progress":100,"message":"Task completed successfully","result":{"processed":120}}"#,
            ),
            ("GET", "/api/v1/ohlcv/tasks/o2/status") => ApiResponse::new(
                StatusCode::OK,
                r#"{"task_id":"o2","status":"REVOKED","progress":0,"message":"Task state: REVOKED"}"#,
            ),
            ("DELETE", "/api/v1/ohlcv/tasks/o2") => ApiResponse::new(
                StatusCode::OK,
                r#"{"task_id":"o2","status":"cancelled","message":"Task has been cancelled"}"#,
            ),
            _ => ApiResponse::new(StatusCode::INTERNAL_SERVER_ERROR, r#"{"detail":"Failed to start task"}"#),
        }
    }

    fn store(transport: Arc<FakeTransport>) -> OhlcvStore {
        let session = ApiSession::new(transport, Arc::new(MemoryCredentialStore::new()));
        OhlcvStore::new(OhlcvClient::new(Arc::new(session)))
    }

    #[tokio::test]
    async fn started_job_is_polled_until_finished() {
        let transport = Arc::new(FakeTransport::new(routed));
        let mut s = store(transport.clone());

        // 尚未启动任何作业时不请求
        s.poll().await.unwrap();
        assert!(transport.requests().is_empty());

        s.start(OhlcvJob::Daily).await.unwrap();
        assert!(s.is_running());
        s.poll().await.unwrap();
        assert!(!s.is_running());
        assert_eq!(s.job, Some(OhlcvJob::Daily));

        s.poll().await.unwrap();
        assert_eq!(
            transport
                .requests_to(&Method::GET, "/api/v1/ohlcv/tasks/o1/status")
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn cancel_refreshes_status_of_that_task() {
        let transport = Arc::new(FakeTransport::new(routed));
        let mut s = store(transport.clone());

        assert!(s.cancel(None).await.unwrap().is_none());
        let msg = s.cancel(Some("o2")).await.unwrap();
        assert_eq!(msg.as_deref(), Some("Task has been cancelled"));
        assert_eq!(s.task_id.as_deref(), Some("o2"));
        assert!(s.status.as_ref().unwrap().is_finished());
    }

    #[tokio::test]
    async fn start_failure_keeps_previous_state() {
        let transport = Arc::new(FakeTransport::new(routed));
        let mut s = store(transport);

        let err = s
            .start(OhlcvJob::Weekly { weeks_back: 4 })
            .await
            .unwrap_err();
        assert_eq!(err.message, MSG_START_OHLCV);
        assert!(s.task_id.is_none());
        assert!(s.job.is_none());
    }
}
