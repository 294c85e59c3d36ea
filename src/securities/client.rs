use super::filters::SecurityFilters;
use super::model::{CancelImportResponse, Exchange, ImportResponse, ImportStatus, Security, SecurityStats};
use crate::session::dto::{decode_data, Page, PageWindow};
use crate::session::transport::ApiRequest;
use crate::session::{
    url_securities_import_status, url_securities_import_taskid, ApiError, ApiSession,
    URL_EXCHANGES, URL_SECURITIES, URL_SECURITIES_IMPORT, URL_SECURITIES_STATS,
};
use log::info;
use std::sync::Arc;

/// 证券 / 交易所 / 导入任务接口
#[derive(Debug, Clone)]
pub struct SecurityClient {
    session: Arc<ApiSession>,
}

impl SecurityClient {
    pub fn new(session: Arc<ApiSession>) -> Self {
        Self { session }
    }

    pub async fn list(
        &self,
        filters: &SecurityFilters,
        window: PageWindow,
    ) -> Result<Page<Security>, ApiError> {
        self.session
            .get_page(
                URL_SECURITIES,
                filters.to_query(window.skip, window.limit),
                window.skip,
                window.limit,
            )
            .await
    }

    pub async fn stats(&self) -> Result<SecurityStats, ApiError> {
        self.session.get(URL_SECURITIES_STATS, Vec::new()).await
    }

    pub async fn exchanges(&self, active_only: bool) -> Result<Vec<Exchange>, ApiError> {
        self.session
            .get(
                URL_EXCHANGES,
                vec![("active_only".to_string(), active_only.to_string())],
            )
            .await
    }

    /// 启动后台导入，立即返回任务 id
    pub async fn start_import(&self) -> Result<ImportResponse, ApiError> {
        let resp = self
            .session
            .execute(ApiRequest::post(URL_SECURITIES_IMPORT))
            .await?;
        let started: ImportResponse = decode_data(&resp.body)?;
        info!("证券导入已启动: task_id={}", started.task_id);
        Ok(started)
    }

    pub async fn import_status(&self, task_id: &str) -> Result<ImportStatus, ApiError> {
        self.session
            .get(&url_securities_import_status(task_id), Vec::new())
            .await
    }

    pub async fn cancel_import(&self, task_id: &str) -> Result<CancelImportResponse, ApiError> {
        info!("取消证券导入: {}", task_id);
        self.session
            .delete(&url_securities_import_taskid(task_id), Vec::new())
            .await
    }
}
