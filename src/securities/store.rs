use super::client::SecurityClient;
use super::filters::SecurityFilters;
use super::model::{Exchange, ImportResponse, ImportStatus, Security, SecurityStats};
use crate::session::dto::{Page, PageWindow, PaginationMeta};
use crate::session::{ActionFailure, ActionResult};
use log::{info, warn};

pub const MSG_FETCH_SECURITIES: &str = "获取证券列表失败";
pub const MSG_FETCH_SECURITY_STATS: &str = "获取证券统计失败";
pub const MSG_FETCH_EXCHANGES: &str = "获取交易所列表失败";
pub const MSG_START_IMPORT: &str = "启动证券导入失败";
pub const MSG_IMPORT_STATUS: &str = "获取导入状态失败";
pub const MSG_CANCEL_IMPORT: &str = "取消证券导入失败";

#[derive(Debug)]
pub struct SecurityStore {
    client: SecurityClient,
    pub securities: Vec<Security>,
    pub pagination: PaginationMeta,
    pub filters: SecurityFilters,
    pub window: PageWindow,
    pub stats: Option<SecurityStats>,
    pub exchanges: Vec<Exchange>,
    pub import_task: Option<String>,
    pub import_status: Option<ImportStatus>,
}

impl SecurityStore {
    pub fn new(client: SecurityClient, page_size: u64) -> Self {
        Self {
            client,
            securities: Vec::new(),
            pagination: PaginationMeta::default(),
            filters: SecurityFilters::default(),
            window: PageWindow::new(page_size),
            stats: None,
            exchanges: Vec::new(),
            import_task: None,
            import_status: None,
        }
    }

    pub async fn fetch_securities(&mut self) -> ActionResult<Page<Security>> {
        let page = self
            .client
            .list(&self.filters, self.window)
            .await
            .map_err(|e| ActionFailure::new(MSG_FETCH_SECURITIES, e))?;
        info!(
            "证券列表: {} 条 (共 {})",
            page.items.len(),
            page.pagination.total
        );
        self.securities = page.items.clone();
        self.pagination = page.pagination.clone();
        Ok(page)
    }

    pub async fn set_filters(&mut self, filters: SecurityFilters) -> ActionResult<Page<Security>> {
        self.filters = filters;
        self.window.skip = 0;
        self.fetch_securities().await
    }

    pub async fn clear_filters(&mut self) -> ActionResult<Page<Security>> {
        self.filters = SecurityFilters::default();
        self.window.skip = 0;
        self.fetch_securities().await
    }

    /// 页码超出服务端总页数时停在末页
    pub async fn set_page(&mut self, page: u64) -> ActionResult<Page<Security>> {
        let page = page.clamp(1, self.pagination.pages.max(1));
        if let Some(w) = self.window.at_page(page) {
            self.window = w;
        }
        self.fetch_securities().await
    }

    pub async fn next_page(&mut self) -> ActionResult<Option<Page<Security>>> {
        match self.window.next(&self.pagination) {
            Some(w) => {
                self.window = w;
                self.fetch_securities().await.map(Some)
            }
            None => Ok(None),
        }
    }

    pub async fn prev_page(&mut self) -> ActionResult<Option<Page<Security>>> {
        match self.window.prev(&self.pagination) {
            Some(w) => {
                self.window = w;
                self.fetch_securities().await.map(Some)
            }
            None => Ok(None),
        }
    }

    pub async fn set_limit(&mut self, limit: u64) -> ActionResult<Page<Security>> {
        self.window = PageWindow::new(limit);
        self.fetch_securities().await
    }

    pub async fn fetch_stats(&mut self) -> ActionResult<SecurityStats> {
        let stats = self
            .client
            .stats()
            .await
            .map_err(|e| ActionFailure::new(MSG_FETCH_SECURITY_STATS, e))?;
        self.stats = Some(stats.clone());
        Ok(stats)
    }

    pub async fn fetch_exchanges(&mut self, active_only: bool) -> ActionResult<Vec<Exchange>> {
        let list = self
            .client
            .exchanges(active_only)
            .await
            .map_err(|e| ActionFailure::new(MSG_FETCH_EXCHANGES, e))?;
        self.exchanges = list.clone();
        Ok(list)
    }

    pub async fn start_import(&mut self) -> ActionResult<ImportResponse> {
        let started = self
            .client
            .start_import()
            .await
            .map_err(|e| ActionFailure::new(MSG_START_IMPORT, e))?;
        self.import_task = Some(started.task_id.clone());
        self.import_status = None;
        Ok(started)
    }

    /// task_id 为空时查询最近一次启动的导入
    pub async fn fetch_import_status(&mut self, task_id: Option<&str>) -> ActionResult<Option<ImportStatus>> {
        let Some(id) = task_id.map(str::to_string).or_else(|| self.import_task.clone()) else {
            return Ok(None);
        };
        let status = self
            .client
            .import_status(&id)
            .await
            .map_err(|e| ActionFailure::new(MSG_IMPORT_STATUS, e))?;
        if status.is_finished() {
            info!("证券导入 {} 结束: {}", id, status.status);
        }
        self.import_task = Some(id);
        self.import_status = Some(status.clone());
        Ok(Some(status))
    }

    pub async fn cancel_import(&mut self, task_id: Option<&str>) -> ActionResult<Option<String>> {
        let Some(id) = task_id.map(str::to_string).or_else(|| self.import_task.clone()) else {
            return Ok(None);
        };
        let resp = self
            .client
            .cancel_import(&id)
            .await
            .map_err(|e| ActionFailure::new(MSG_CANCEL_IMPORT, e))?;
        if let Err(e) = self.fetch_import_status(Some(&id)).await {
            warn!("取消后刷新导入状态失败: {}", e);
        }
        Ok(Some(resp.message))
    }

    /// 导入进行中时轮询状态，结束后刷新统计
    pub async fn poll_import(&mut self) -> ActionResult<()> {
        let running = self
            .import_status
            .as_ref()
            .map(|s| !s.is_finished())
            .unwrap_or(self.import_task.is_some());
        if !running {
            return Ok(());
        }
        if let Some(status) = self.fetch_import_status(None).await? {
            if status.is_finished() {
                self.fetch_stats().await?;
            }
        }
        Ok(())
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
            ("GET", "/api/v1/securities") => ApiResponse::new(
                StatusCode::OK,
                r#"[{"id":"s1","symbol":"RELIANCE","name":"Reliance Industries Limited","security_type":"STOCK","segment":"EQUITY"}]"#,
            ),
            ("GET", "/api/v1/securities/stats") => ApiResponse::new(
                StatusCode::OK,
                r#"{"success":true,"message":"","data":{"total":5000,"active":4800,"futures":200,"derivatives":350}}"#,
            ),
            ("POST", "/api/v1/securities/import") => ApiResponse::new(
                StatusCode::OK,
                r#"{"task_id":"c1","status":"PENDING","message":"Securities import started successfully","started_at":"2024-01-01T10:00:00"}"#,
            ),
            ("GET", "/api/v1/securities/import/status/c1") => ApiResponse::new(
                StatusCode::OK,
                r#"{"task_id":"c1","status":"SUCCESS","progress":100,"message":"Import completed successfully","result":{"created":10}}"#,
            ),
            _ => ApiResponse::new(StatusCode::FORBIDDEN, r#"{"detail":"Not enough permissions"}"#),
        }
    }

    fn store(transport: Arc<FakeTransport>) -> SecurityStore {
        let session = ApiSession::new(transport, Arc::new(MemoryCredentialStore::new()));
        SecurityStore::new(SecurityClient::new(Arc::new(session)), 25)
    }

    #[tokio::test]
    async fn clear_filters_fetches_once_from_first_page() {
        let transport = Arc::new(FakeTransport::new(routed));
        let mut s = store(transport.clone());
        s.filters.set("type", "STOCK").unwrap();
        s.window = s.window.at_page(4).unwrap();

        let page = s.clear_filters().await.unwrap();
        assert_eq!(page.items[0].symbol, "RELIANCE");
        assert_eq!(page.pagination.total, 1);
        let reqs = transport.requests_to(&Method::GET, "/api/v1/securities");
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].query_value("skip"), Some("0"));
        assert_eq!(reqs[0].query_value("security_type"), None);
    }

    #[tokio::test]
    async fn import_is_tracked_until_finished() {
        let transport = Arc::new(FakeTransport::new(routed));
        let mut s = store(transport.clone());

        s.start_import().await.unwrap();
        assert_eq!(s.import_task.as_deref(), Some("c1"));

        s.poll_import().await.unwrap();
        assert!(s.import_status.as_ref().unwrap().is_finished());
        assert_eq!(s.stats.as_ref().unwrap().total, 5000);

        // 已结束，不再请求
        let before = transport.requests().len();
        s.poll_import().await.unwrap();
        assert_eq!(transport.requests().len(), before);
    }

    #[tokio::test]
    async fn forbidden_import_reports_static_message() {
        let transport = Arc::new(FakeTransport::new(routed));
        let mut s = store(transport);

        let err = s.cancel_import(Some("zz")).await.unwrap_err();
        assert_eq!(err.message, MSG_CANCEL_IMPORT);
        assert!(s.cancel_import(None).await.unwrap().is_none());
    }
}
