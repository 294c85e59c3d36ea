use super::api_session::ApiSession;
use super::dto::{decode_data, TokenResponse, UserProfile};
use super::error::ApiError;
use super::jwt::peek_claims;
use super::transport::ApiRequest;
use super::urls::{URL_AUTH_LOGIN, URL_AUTH_PROFILE};
use crate::storage::StoredCredentials;
use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;

/// 登录 / 用户信息 / 登出
pub struct AuthService {
    session: Arc<ApiSession>,
}

impl AuthService {
    pub fn new(session: Arc<ApiSession>) -> Self {
        Self { session }
    }

    /// 表单登录，成功后持久化令牌并拉取用户信息
    pub async fn login(&self, username: &str, password: &str) -> Result<StoredCredentials, ApiError> {
        let req = ApiRequest::post(URL_AUTH_LOGIN).form(vec![
            ("username".to_string(), username.to_string()),
            ("password".to_string(), password.to_string()),
        ]);
        let resp = self.session.execute(req).await?;
        let token: TokenResponse = decode_data(&resp.body)?;
        if token.access_token.is_empty() {
            return Err(ApiError::Decode("登录响应缺少 access_token".to_string()));
        }

        let mut creds = StoredCredentials {
            access_token: token.access_token,
            token_type: token.token_type,
            expires_at: token.expires_at,
            user: None,
        };
        self.session.credentials().save(&creds).await?;
        info!("✓ 登录成功: {}", username);

        match self.profile().await {
            Ok(user) => creds.user = Some(user),
            Err(ApiError::Unauthorized) => return Err(ApiError::Unauthorized),
            Err(e) => warn!("⚠ 获取用户信息失败: {}", e),
        }
        Ok(creds)
    }

    /// GET /auth/profile，并写入本地存储
    pub async fn profile(&self) -> Result<UserProfile, ApiError> {
        let user: UserProfile = self.session.get(URL_AUTH_PROFILE, Vec::new()).await?;
        self.session.credentials().save_user(&user).await?;
        Ok(user)
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        self.session.credentials().clear().await?;
        info!("已登出");
        Ok(())
    }

    /// 启动时恢复本地会话，过期则丢弃
    pub async fn restore(&self) -> Result<Option<StoredCredentials>, ApiError> {
        let Some(creds) = self.session.credentials().load().await? else {
            return Ok(None);
        };
        if creds.is_expired(Utc::now()) {
            info!("本地令牌已过期，清除");
            self.session.credentials().clear().await?;
            return Ok(None);
        }
        Ok(Some(creds))
    }
}

/// 展示用身份：优先用户信息，其次令牌 sub
pub fn display_identity(creds: &StoredCredentials) -> String {
    if let Some(ref user) = creds.user {
        return user.full_name.clone().unwrap_or_else(|| user.email.clone());
    }
    peek_claims(&creds.access_token)
        .and_then(|c| c.sub)
        .unwrap_or_else(|| "已登录".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::transport::testing::FakeTransport;
    use crate::session::transport::{ApiResponse, RequestBody};
    use crate::storage::{CredentialStore, MemoryCredentialStore};
    use chrono::Duration;
    use reqwest::{Method, StatusCode};

    fn service(transport: Arc<FakeTransport>, store: Arc<MemoryCredentialStore>) -> AuthService {
        AuthService::new(Arc::new(ApiSession::new(transport, store)))
    }

    #[tokio::test]
    async fn login_posts_form_and_persists_token_and_profile() {
        let transport = Arc::new(FakeTransport::new(|req| {
            if req.path == URL_AUTH_LOGIN {
                ApiResponse::new(
                    StatusCode::OK,
                    r#"{"access_token":"t-1","token_type":"bearer","expires_at":"2030-01-01T00:00:00Z"}"#,
                )
            } else {
                ApiResponse::new(
                    StatusCode::OK,
                    r#"{"id":"u1","email":"admin@example.com","is_active":true,"is_superuser":true}"#,
                )
            }
        }));
        let store = Arc::new(MemoryCredentialStore::new());
        let auth = service(transport.clone(), store.clone());

        let creds = auth.login("admin@example.com", "secret").await.unwrap();
        assert_eq!(creds.access_token, "t-1");
        assert_eq!(creds.user.as_ref().map(|u| u.email.as_str()), Some("admin@example.com"));

        let login = &transport.requests_to(&Method::POST, URL_AUTH_LOGIN)[0];
        assert_eq!(
            login.body,
            RequestBody::Form(vec![
                ("username".to_string(), "admin@example.com".to_string()),
                ("password".to_string(), "secret".to_string()),
            ])
        );
        // 拉取 profile 时已带上新令牌
        let profile = &transport.requests_to(&Method::GET, URL_AUTH_PROFILE)[0];
        assert_eq!(profile.bearer.as_deref(), Some("t-1"));

        let stored = store.load().await.unwrap().unwrap();
        assert_eq!(stored.user, creds.user);
    }

    #[tokio::test]
    async fn failed_login_leaves_store_empty() {
        let transport = Arc::new(FakeTransport::new(|_| {
            ApiResponse::new(StatusCode::UNAUTHORIZED, r#"{"detail":"Incorrect username or password"}"#)
        }));
        let store = Arc::new(MemoryCredentialStore::new());
        let auth = service(transport, store.clone());

        assert!(auth.login("a", "b").await.unwrap_err().is_unauthorized());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn restore_discards_expired_token() {
        let store = Arc::new(MemoryCredentialStore::with(StoredCredentials {
            access_token: "old".to_string(),
            token_type: "bearer".to_string(),
            expires_at: Some(Utc::now() - Duration::minutes(1)),
            user: None,
        }));
        let transport = Arc::new(FakeTransport::new(|_| ApiResponse::new(StatusCode::OK, "{}")));
        let auth = service(transport, store.clone());

        assert!(auth.restore().await.unwrap().is_none());
        assert!(store.load().await.unwrap().is_none());
    }
}
