use super::dto::{decode_data, decode_page, error_detail, Page};
use super::error::ApiError;
use super::transport::{ApiRequest, ApiResponse, HttpTransport};
use super::urls::LOGIN_ROUTE;
use crate::app_state::AppEvent;
use crate::storage::CredentialStore;
use log::{error, info, warn};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// 共享 API 会话
///
/// 所有请求都经过这里：有令牌时附加 `Authorization: Bearer <token>`；
/// 任意请求收到 401 时清空本地凭证并跳转登录页（无重试、无退避）。
pub struct ApiSession {
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<dyn CredentialStore>,
    evt_tx: Option<mpsc::UnboundedSender<AppEvent>>,
}

impl ApiSession {
    pub fn new(transport: Arc<dyn HttpTransport>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            transport,
            credentials,
            evt_tx: None,
        }
    }

    /// 绑定 UI 事件通道（用于 401 跳转）
    pub fn with_events(mut self, evt_tx: mpsc::UnboundedSender<AppEvent>) -> Self {
        self.evt_tx = Some(evt_tx);
        self
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// 执行请求并统一处理状态码
    pub async fn execute(&self, mut req: ApiRequest) -> Result<ApiResponse, ApiError> {
        if let Some(creds) = self.credentials.load().await? {
            req.bearer = Some(creds.access_token);
        }

        let method = req.method.clone();
        let path = req.path.clone();
        let resp = self.transport.send(req).await?;

        match resp.status {
            StatusCode::UNAUTHORIZED => {
                warn!("{} {} {} -> 401, 会话失效", self, method, path);
                self.handle_unauthorized().await;
                Err(ApiError::Unauthorized)
            }
            StatusCode::NOT_FOUND => Err(ApiError::NotFound(error_detail(&resp.body))),
            status if !status.is_success() => {
                warn!("{} {} {} -> {}", self, method, path, status);
                Err(ApiError::Status {
                    status: status.as_u16(),
                    detail: error_detail(&resp.body),
                })
            }
            status => {
                info!("{} {} {} [{}]", self, method, path, status);
                Ok(resp)
            }
        }
    }

    /// 清除本地凭证并通知 UI 跳转登录页
    async fn handle_unauthorized(&self) {
        if let Err(e) = self.credentials.clear().await {
            error!("清除本地凭证失败: {}", e);
        }
        if let Some(ref tx) = self.evt_tx {
            let _ = tx.send(AppEvent::Navigate(LOGIN_ROUTE.to_string()));
        }
    }

    /// GET 并解析 `data`
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<T, ApiError> {
        let resp = self.execute(ApiRequest::get(path).query(query)).await?;
        decode_data(&resp.body)
    }

    /// GET 分页列表
    pub async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
        skip: u64,
        limit: u64,
    ) -> Result<Page<T>, ApiError> {
        let resp = self.execute(ApiRequest::get(path).query(query)).await?;
        decode_page(&resp.body, skip, limit)
    }

    /// POST JSON 并解析 `data`
    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T, ApiError> {
        let resp = self.execute(ApiRequest::post(path).json(body)).await?;
        decode_data(&resp.body)
    }

    /// DELETE 并解析 `data`
    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<T, ApiError> {
        let resp = self.execute(ApiRequest::delete(path).query(query)).await?;
        decode_data(&resp.body)
    }
}

impl std::fmt::Display for ApiSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<ApiSession []>")
    }
}

impl std::fmt::Debug for ApiSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<ApiSession []>")
    }
}
