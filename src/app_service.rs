use crate::app_state::{AppEvent, SecurityListSnapshot, TaskDetailSnapshot, TaskListSnapshot};
use crate::commands::{AppCommand, PageMove, HELP_TEXT};
use crate::ohlcv::{OhlcvClient, OhlcvStore};
use crate::securities::{SecurityClient, SecurityStore};
use crate::session::auth::display_identity;
use crate::session::{ActionFailure, ApiSession, AuthService, LOGIN_ROUTE};
use crate::tasks::{TaskClient, TaskStore};
use log::{info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// 每隔多少次轮询顺带刷新一次任务统计
const STATS_EVERY_N_POLLS: u64 = 6;

/// 后台 Actor：串行处理 UI 命令，所有请求都在这里发出，
/// 响应按命令顺序回到 UI，不会出现旧请求覆盖新结果。
pub struct AppService {
    auth: AuthService,
    tasks: TaskStore,
    securities: SecurityStore,
    ohlcv: OhlcvStore,
    evt_tx: mpsc::UnboundedSender<AppEvent>,
    logged_in: bool,
    poll_interval: Arc<AtomicU64>,
    poll_count: u64,
}

impl AppService {
    pub fn new(
        session: Arc<ApiSession>,
        page_size: u64,
        poll_interval: Arc<AtomicU64>,
        evt_tx: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            auth: AuthService::new(session.clone()),
            tasks: TaskStore::new(TaskClient::new(session.clone()), page_size),
            securities: SecurityStore::new(SecurityClient::new(session.clone()), page_size),
            ohlcv: OhlcvStore::new(OhlcvClient::new(session)),
            evt_tx,
            logged_in: false,
            poll_interval,
            poll_count: 0,
        }
    }

    /// 启动时恢复本地会话
    pub async fn restore(&mut self) -> bool {
        match self.auth.restore().await {
            Ok(Some(creds)) => {
                self.logged_in = true;
                self.emit(AppEvent::LoggedIn(display_identity(&creds)));
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("恢复本地会话失败: {}", e);
                false
            }
        }
    }

    pub async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<AppCommand>) {
        while let Some(cmd) = cmd_rx.recv().await {
            self.handle(cmd).await;
        }
        info!("命令通道已关闭，后台服务退出");
    }

    fn emit(&self, event: AppEvent) {
        let _ = self.evt_tx.send(event);
    }

    fn message(&self, msg: impl Into<String>) {
        self.emit(AppEvent::Message(msg.into()));
    }

    fn fail(&mut self, failure: ActionFailure) {
        if failure.is_unauthorized() {
            // 跳转登录页的事件已由 ApiSession 发出
            self.logged_in = false;
            self.tasks.close_details();
        }
        self.emit(AppEvent::Error(failure.message.to_string()));
    }

    fn emit_tasks(&self) {
        self.emit(AppEvent::Tasks(TaskListSnapshot {
            items: self.tasks.tasks.clone(),
            pagination: self.tasks.pagination.clone(),
            window: self.tasks.window,
            filters: self.tasks.filters.clone(),
        }));
    }

    fn emit_detail(&self) {
        let snapshot = self.tasks.current.as_ref().map(|d| {
            Box::new(TaskDetailSnapshot {
                detail: d.clone(),
                logs: self.tasks.logs.clone(),
                log_level: self.tasks.log_level.clone(),
            })
        });
        self.emit(AppEvent::TaskDetail(snapshot));
    }

    fn emit_securities(&self) {
        self.emit(AppEvent::Securities(SecurityListSnapshot {
            items: self.securities.securities.clone(),
            pagination: self.securities.pagination.clone(),
            window: self.securities.window,
            filters: self.securities.filters.clone(),
        }));
    }

    fn emit_import(&self) {
        if let Some(ref status) = self.securities.import_status {
            self.emit(AppEvent::Import(status.clone()));
        }
    }

    fn emit_ohlcv(&self) {
        if let Some(ref status) = self.ohlcv.status {
            self.emit(AppEvent::Ohlcv(status.clone()));
        }
    }

    fn requires_login(cmd: &AppCommand) -> bool {
        !matches!(
            cmd,
            AppCommand::Login { .. }
                | AppCommand::Logout
                | AppCommand::PollInterval(_)
                | AppCommand::Poll
                | AppCommand::Help
                | AppCommand::Quit
                | AppCommand::Unknown(_)
        )
    }

    pub async fn handle(&mut self, cmd: AppCommand) {
        if !self.logged_in && Self::requires_login(&cmd) {
            self.emit(AppEvent::Error("请先登录".to_string()));
            return;
        }

        match cmd {
            AppCommand::Login { username, password } => match self.auth.login(&username, &password).await {
                Ok(creds) => {
                    self.logged_in = true;
                    self.poll_count = 0;
                    self.emit(AppEvent::LoggedIn(display_identity(&creds)));
                }
                Err(e) => {
                    warn!("登录失败: {}", e);
                    let msg = if e.is_unauthorized() {
                        "登录失败: 用户名或密码错误".to_string()
                    } else {
                        format!("登录失败: {}", e)
                    };
                    self.emit(AppEvent::Error(msg));
                }
            },
            AppCommand::Logout => {
                if let Err(e) = self.auth.logout().await {
                    warn!("清除本地凭证失败: {}", e);
                }
                self.logged_in = false;
                self.tasks.close_details();
                self.message("已登出");
                self.emit(AppEvent::Navigate(LOGIN_ROUTE.to_string()));
            }
            AppCommand::Tasks => match self.tasks.fetch_tasks().await {
                Ok(_) => self.emit_tasks(),
                Err(f) => self.fail(f),
            },
            AppCommand::TaskFilter(pairs) => {
                let mut filters = self.tasks.filters.clone();
                for (key, value) in &pairs {
                    if let Err(e) = filters.set(key, value) {
                        self.emit(AppEvent::Error(e));
                        return;
                    }
                }
                let desc = filters.describe();
                match self.tasks.set_filters(filters).await {
                    Ok(_) => {
                        self.message(format!("任务过滤: {}", desc));
                        self.emit_tasks();
                    }
                    Err(f) => self.fail(f),
                }
            }
            AppCommand::TaskFilterClear => match self.tasks.clear_filters().await {
                Ok(_) => {
                    self.message("已清除任务过滤");
                    self.emit_tasks();
                }
                Err(f) => self.fail(f),
            },
            AppCommand::TaskPage(mv) => {
                let result = match mv {
                    PageMove::Next => self.tasks.next_page().await,
                    PageMove::Prev => self.tasks.prev_page().await,
                    PageMove::To(n) => self.tasks.set_page(n).await.map(Some),
                };
                match result {
                    Ok(Some(_)) => self.emit_tasks(),
                    Ok(None) => self.message("没有更多页了"),
                    Err(f) => self.fail(f),
                }
            }
            AppCommand::TaskLimit(n) => match self.tasks.set_limit(n).await {
                Ok(_) => self.emit_tasks(),
                Err(f) => self.fail(f),
            },
            AppCommand::OpenTask { id } => {
                if !self.tasks.is_open(&id) {
                    self.tasks.close_details();
                }
                match self.tasks.fetch_task_details(&id).await {
                    Ok(_) => self.emit_detail(),
                    Err(f) => {
                        self.fail(f);
                        self.emit(AppEvent::TaskDetail(None));
                    }
                }
            }
            AppCommand::CloseTask => self.tasks.close_details(),
            AppCommand::Retry { id, reason } => match self.tasks.retry_task_action(&id, reason).await {
                Ok(task) => {
                    self.message(format!("✓ 任务已重新提交: {}", task.id));
                    self.emit_tasks();
                    if self.tasks.current.is_some() {
                        self.emit_detail();
                    }
                }
                Err(f) => self.fail(f),
            },
            AppCommand::Cancel { id, reason } => match self.tasks.cancel_task_action(&id, reason).await {
                Ok(_) => {
                    self.message(format!("✓ 任务已取消: {}", id));
                    self.emit_tasks();
                    if self.tasks.current.is_some() {
                        self.emit_detail();
                    }
                }
                Err(f) => self.fail(f),
            },
            AppCommand::Delete { id, force } => {
                let was_open = self.tasks.is_open(&id);
                match self.tasks.delete_task_action(&id, force).await {
                    Ok(()) => {
                        self.message(format!("✓ 任务已删除: {}", id));
                        self.emit_tasks();
                        if was_open {
                            self.emit_detail();
                        }
                    }
                    Err(f) => self.fail(f),
                }
            }
            AppCommand::Logs { level } => {
                let Some(id) = self.tasks.current.as_ref().map(|d| d.summary.id.clone()) else {
                    self.emit(AppEvent::Error("请先打开一个任务".to_string()));
                    return;
                };
                match self.tasks.fetch_task_logs(&id, level).await {
                    Ok(logs) => {
                        self.message(format!("日志 {} 条", logs.len()));
                        self.emit_detail();
                    }
                    Err(f) => self.fail(f),
                }
            }
            AppCommand::Steps => {
                let Some(id) = self.tasks.current.as_ref().map(|d| d.summary.id.clone()) else {
                    self.emit(AppEvent::Error("请先打开一个任务".to_string()));
                    return;
                };
                match self.tasks.fetch_task_steps(&id).await {
                    Ok(n) => {
                        self.message(format!("步骤 {} 个", n));
                        self.emit_detail();
                    }
                    Err(f) => self.fail(f),
                }
            }
            AppCommand::Stats => match self.tasks.fetch_task_statistics().await {
                Ok(stats) => self.emit(AppEvent::TaskStats(stats)),
                Err(f) => self.fail(f),
            },
            AppCommand::Securities => match self.securities.fetch_securities().await {
                Ok(_) => self.emit_securities(),
                Err(f) => self.fail(f),
            },
            AppCommand::SecurityFilter(pairs) => {
                let mut filters = self.securities.filters.clone();
                for (key, value) in &pairs {
                    if let Err(e) = filters.set(key, value) {
                        self.emit(AppEvent::Error(e));
                        return;
                    }
                }
                let desc = filters.describe();
                match self.securities.set_filters(filters).await {
                    Ok(_) => {
                        self.message(format!("证券过滤: {}", desc));
                        self.emit_securities();
                    }
                    Err(f) => self.fail(f),
                }
            }
            AppCommand::SecurityFilterClear => match self.securities.clear_filters().await {
                Ok(_) => {
                    self.message("已清除证券过滤");
                    self.emit_securities();
                }
                Err(f) => self.fail(f),
            },
            AppCommand::SecurityPage(mv) => {
                let result = match mv {
                    PageMove::Next => self.securities.next_page().await,
                    PageMove::Prev => self.securities.prev_page().await,
                    PageMove::To(n) => self.securities.set_page(n).await.map(Some),
                };
                match result {
                    Ok(Some(_)) => self.emit_securities(),
                    Ok(None) => self.message("没有更多页了"),
                    Err(f) => self.fail(f),
                }
            }
            AppCommand::SecurityLimit(n) => match self.securities.set_limit(n).await {
                Ok(_) => self.emit_securities(),
                Err(f) => self.fail(f),
            },
            AppCommand::SecurityStats => match self.securities.fetch_stats().await {
                Ok(stats) => self.emit(AppEvent::SecurityStats(stats)),
                Err(f) => self.fail(f),
            },
            AppCommand::Exchanges { active_only } => {
                match self.securities.fetch_exchanges(active_only).await {
                    Ok(list) => self.emit(AppEvent::Exchanges(list)),
                    Err(f) => self.fail(f),
                }
            }
            AppCommand::ImportStart => match self.securities.start_import().await {
                Ok(resp) => {
                    let text = if resp.message.is_empty() {
                        format!("✓ 证券导入已启动: {}", resp.task_id)
                    } else {
                        format!("✓ {} ({})", resp.message, resp.task_id)
                    };
                    self.message(text);
                    if let Err(f) = self.securities.fetch_import_status(None).await {
                        self.fail(f);
                    }
                    self.emit_import();
                }
                Err(f) => self.fail(f),
            },
            AppCommand::ImportStatus { task_id } => {
                match self.securities.fetch_import_status(task_id.as_deref()).await {
                    Ok(Some(status)) => self.emit(AppEvent::Import(status)),
                    Ok(None) => self.message("没有进行中的导入任务"),
                    Err(f) => self.fail(f),
                }
            }
            AppCommand::ImportCancel { task_id } => {
                match self.securities.cancel_import(task_id.as_deref()).await {
                    Ok(Some(msg)) => {
                        self.message(format!("✓ {}", msg));
                        self.emit_import();
                    }
                    Ok(None) => self.message("没有进行中的导入任务"),
                    Err(f) => self.fail(f),
                }
            }
            AppCommand::OhlcvStart(job) => {
                let desc = job.describe();
                match self.ohlcv.start(job).await {
                    Ok(resp) => {
                        self.message(format!("✓ {} 已启动: {}", desc, resp.task_id));
                        if let Err(f) = self.ohlcv.fetch_status(None).await {
                            self.fail(f);
                        }
                        self.emit_ohlcv();
                    }
                    Err(f) => self.fail(f),
                }
            }
            AppCommand::OhlcvStatus { task_id } => {
                match self.ohlcv.fetch_status(task_id.as_deref()).await {
                    Ok(Some(status)) => self.emit(AppEvent::Ohlcv(status)),
                    Ok(None) => self.message("没有进行中的行情作业"),
                    Err(f) => self.fail(f),
                }
            }
            AppCommand::OhlcvCancel { task_id } => match self.ohlcv.cancel(task_id.as_deref()).await {
                Ok(Some(msg)) => {
                    self.message(format!("✓ {}", msg));
                    self.emit_ohlcv();
                }
                Ok(None) => self.message("没有进行中的行情作业"),
                Err(f) => self.fail(f),
            },
            AppCommand::PollInterval(secs) => {
                self.poll_interval.store(secs, Ordering::Relaxed);
                if secs == 0 {
                    self.message("自动刷新已关闭");
                } else {
                    self.message(format!("自动刷新间隔: {}s", secs));
                }
            }
            AppCommand::Poll => self.poll().await,
            AppCommand::Help => self.message(HELP_TEXT),
            AppCommand::Quit => {}
            AppCommand::Unknown(msg) => {
                if !msg.is_empty() {
                    self.emit(AppEvent::Error(msg));
                }
            }
        }
    }

    /// 定时刷新；未登录时跳过，401 后停止
    async fn poll(&mut self) {
        if !self.logged_in {
            return;
        }
        self.poll_count += 1;
        let include_stats = self.tasks.stats.is_some() && self.poll_count % STATS_EVERY_N_POLLS == 0;
        let import_running = self
            .securities
            .import_status
            .as_ref()
            .map(|s| !s.is_finished())
            .unwrap_or(false);

        let ohlcv_running = self.ohlcv.is_running();

        // 各 store 互不相关，并发刷新
        let (tasks_res, import_res, ohlcv_res) = futures::join!(
            self.tasks.poll(include_stats),
            self.securities.poll_import(),
            self.ohlcv.poll()
        );

        match tasks_res {
            Ok(()) => {
                self.emit_tasks();
                if self.tasks.current.is_some() {
                    self.emit_detail();
                }
                if include_stats {
                    if let Some(ref stats) = self.tasks.stats {
                        self.emit(AppEvent::TaskStats(stats.clone()));
                    }
                }
            }
            Err(f) => self.fail(f),
        }
        match import_res {
            Ok(()) => {
                if import_running {
                    self.emit_import();
                    if let Some(ref stats) = self.securities.stats {
                        self.emit(AppEvent::SecurityStats(stats.clone()));
                    }
                }
            }
            // 401 已由任务刷新报告
            Err(f) if f.is_unauthorized() && !self.logged_in => {}
            Err(f) => self.fail(f),
        }
        match ohlcv_res {
            Ok(()) if ohlcv_running => self.emit_ohlcv(),
            Ok(()) => {}
            Err(f) if f.is_unauthorized() && !self.logged_in => {}
            Err(f) => self.fail(f),
        }
    }
}

/// 按共享间隔向 Actor 发送 Poll；间隔为 0 时暂停
pub async fn run_poll_ticker(poll_interval: Arc<AtomicU64>, cmd_tx: mpsc::UnboundedSender<AppCommand>) {
    loop {
        let secs = poll_interval.load(Ordering::Relaxed);
        if secs == 0 {
            tokio::time::sleep(Duration::from_secs(1)).await;
            continue;
        }
        tokio::time::sleep(Duration::from_secs(secs)).await;
        if poll_interval.load(Ordering::Relaxed) == 0 {
            continue;
        }
        if cmd_tx.send(AppCommand::Poll).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::transport::testing::FakeTransport;
    use crate::session::transport::{ApiRequest, ApiResponse};
    use crate::session::{URL_AUTH_LOGIN, URL_AUTH_PROFILE, URL_TASKS};
    use crate::storage::{CredentialStore, MemoryCredentialStore, StoredCredentials};
    use reqwest::{Method, StatusCode};
    use std::sync::atomic::AtomicBool;

    const TASK_LIST: &str = r#"{"success":true,"data":[{"id":"t1","task_type":"securities_import","status":"FAILURE","title":"证券导入"}],"pagination":{"total":1,"page":1,"per_page":25,"pages":1,"has_next":false,"has_prev":false}}"#;

    struct Harness {
        service: AppService,
        transport: Arc<FakeTransport>,
        store: Arc<MemoryCredentialStore>,
        evt_rx: mpsc::UnboundedReceiver<AppEvent>,
        poll_interval: Arc<AtomicU64>,
    }

    fn harness<F>(store: MemoryCredentialStore, responder: F) -> Harness
    where
        F: Fn(&ApiRequest) -> ApiResponse + Send + Sync + 'static,
    {
        let transport = Arc::new(FakeTransport::new(responder));
        let store = Arc::new(store);
        let (evt_tx, evt_rx) = mpsc::unbounded_channel();
        let session = Arc::new(ApiSession::new(transport.clone(), store.clone()).with_events(evt_tx.clone()));
        let poll_interval = Arc::new(AtomicU64::new(5));
        Harness {
            service: AppService::new(session, 25, poll_interval.clone(), evt_tx),
            transport,
            store,
            evt_rx,
            poll_interval,
        }
    }

    fn logged_in_store() -> MemoryCredentialStore {
        MemoryCredentialStore::with(StoredCredentials {
            access_token: "tok".to_string(),
            token_type: "bearer".to_string(),
            expires_at: None,
            user: None,
        })
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<AppEvent>) -> Vec<AppEvent> {
        let mut out = Vec::new();
        while let Ok(evt) = rx.try_recv() {
            out.push(evt);
        }
        out
    }

    #[tokio::test]
    async fn commands_before_login_are_rejected_without_requests() {
        let mut h = harness(MemoryCredentialStore::new(), |_| ApiResponse::new(StatusCode::OK, TASK_LIST));

        h.service.handle(AppCommand::Tasks).await;
        h.service.handle(AppCommand::Poll).await;

        assert!(h.transport.requests().is_empty());
        let events = drain(&mut h.evt_rx);
        assert!(matches!(events.as_slice(), [AppEvent::Error(m)] if m == "请先登录"));
    }

    #[tokio::test]
    async fn login_then_tasks_emits_snapshot() {
        let mut h = harness(MemoryCredentialStore::new(), |req| match req.path.as_str() {
            URL_AUTH_LOGIN => ApiResponse::new(StatusCode::OK, r#"{"access_token":"t-9","token_type":"bearer"}"#),
            URL_AUTH_PROFILE => ApiResponse::new(
                StatusCode::OK,
                r#"{"id":"u1","email":"ops@example.com","full_name":"运维","is_active":true,"is_superuser":false}"#,
            ),
            _ => ApiResponse::new(StatusCode::OK, TASK_LIST),
        });

        h.service
            .handle(AppCommand::Login {
                username: "ops@example.com".to_string(),
                password: "pw".to_string(),
            })
            .await;
        assert!(h.service.logged_in);
        h.service.handle(AppCommand::Tasks).await;

        let events = drain(&mut h.evt_rx);
        assert!(matches!(&events[0], AppEvent::LoggedIn(name) if name == "运维"));
        match &events[1] {
            AppEvent::Tasks(snap) => {
                assert_eq!(snap.items.len(), 1);
                assert_eq!(snap.items[0].id, "t1");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        let list = &h.transport.requests_to(&Method::GET, URL_TASKS)[0];
        assert_eq!(list.bearer.as_deref(), Some("t-9"));
    }

    #[tokio::test]
    async fn unauthorized_poll_navigates_to_login_and_stops_polling() {
        let mut h = harness(logged_in_store(), |_| {
            ApiResponse::new(StatusCode::UNAUTHORIZED, r#"{"detail":"Token expired"}"#)
        });
        assert!(h.service.restore().await);

        h.service.handle(AppCommand::Poll).await;
        let first = h.transport.requests().len();
        assert_eq!(first, 1);
        assert!(!h.service.logged_in);
        assert!(h.store.load().await.unwrap().is_none());

        let events = drain(&mut h.evt_rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, AppEvent::Navigate(route) if route == LOGIN_ROUTE)));
        assert!(events
            .iter()
            .any(|e| matches!(e, AppEvent::Error(m) if m == "获取任务列表失败")));

        h.service.handle(AppCommand::Poll).await;
        assert_eq!(h.transport.requests().len(), first);
    }

    #[tokio::test]
    async fn invalid_filter_is_reported_without_request() {
        let mut h = harness(logged_in_store(), |_| ApiResponse::new(StatusCode::OK, TASK_LIST));
        h.service.restore().await;
        drain(&mut h.evt_rx);

        h.service
            .handle(AppCommand::TaskFilter(vec![("status".to_string(), "DONE".to_string())]))
            .await;

        assert!(h.transport.requests().is_empty());
        assert!(matches!(drain(&mut h.evt_rx).as_slice(), [AppEvent::Error(_)]));
    }

    #[tokio::test]
    async fn huge_page_number_stays_on_last_page() {
        let mut h = harness(logged_in_store(), |_| ApiResponse::new(StatusCode::OK, TASK_LIST));
        h.service.restore().await;
        h.service.handle(AppCommand::Tasks).await;
        drain(&mut h.evt_rx);

        let cmd: AppCommand = "page 18446744073709551615".parse().unwrap();
        assert_eq!(cmd, AppCommand::TaskPage(PageMove::To(u64::MAX)));
        h.service.handle(cmd).await;
        h.service.handle("spage 18446744073709551615".parse().unwrap()).await;

        let lists = h.transport.requests_to(&Method::GET, URL_TASKS);
        assert_eq!(lists.len(), 2);
        assert_eq!(lists[1].query_value("skip"), Some("0"));
        let events = drain(&mut h.evt_rx);
        assert!(matches!(&events[0], AppEvent::Tasks(snap) if snap.window.skip == 0));
    }

    #[tokio::test]
    async fn ohlcv_job_is_started_and_followed_by_poll() {
        let mut h = harness(logged_in_store(), |req| match (req.method.as_str(), req.path.as_str()) {
            ("POST", "/api/v1/ohlcv/historical") => ApiResponse::new(
                StatusCode::OK,
                r#"{"task_id":"o1","status":"PENDING","message":"Historical OHLCV fetch started for all securities","started_at":"2024-01-01T10:00:00"}"#,
            ),
            ("GET", "/api/v1/ohlcv/tasks/o1/status") => ApiResponse::new(
                StatusCode::OK,
                r#"{"task_id":"o1","status":"PROGRESS","progress":30,"message":"Processing..."}"#,
            ),
            _ => ApiResponse::new(StatusCode::OK, TASK_LIST),
        });
        h.service.restore().await;
        drain(&mut h.evt_rx);

        h.service
            .handle("ohlcv historical from=2020-01-01".parse().unwrap())
            .await;
        let post = &h.transport.requests_to(&Method::POST, "/api/v1/ohlcv/historical")[0];
        match &post.body {
            crate::session::transport::RequestBody::Json(body) => assert_eq!(body["from_date"], "2020-01-01"),
            other => panic!("unexpected body: {:?}", other),
        }
        let events = drain(&mut h.evt_rx);
        assert!(events.iter().any(|e| matches!(e, AppEvent::Ohlcv(st) if st.progress == 30)));

        h.service.handle(AppCommand::Poll).await;
        assert_eq!(
            h.transport
                .requests_to(&Method::GET, "/api/v1/ohlcv/tasks/o1/status")
                .len(),
            2
        );
        assert!(drain(&mut h.evt_rx)
            .iter()
            .any(|e| matches!(e, AppEvent::Ohlcv(st) if st.task_id == "o1")));
    }

    #[tokio::test]
    async fn poll_interval_command_updates_shared_ticker() {
        let mut h = harness(MemoryCredentialStore::new(), |_| ApiResponse::new(StatusCode::OK, "{}"));
        h.service.handle(AppCommand::PollInterval(0)).await;
        assert_eq!(h.poll_interval.load(Ordering::Relaxed), 0);
        h.service.handle(AppCommand::PollInterval(30)).await;
        assert_eq!(h.poll_interval.load(Ordering::Relaxed), 30);
    }

    #[tokio::test]
    async fn ticker_sends_poll_until_receiver_drops() {
        let interval = Arc::new(AtomicU64::new(1));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        let handle = tokio::spawn(async move {
            run_poll_ticker(interval, tx).await;
            flag.store(true, Ordering::Relaxed);
        });

        let cmd = tokio::time::timeout(Duration::from_secs(3), rx.recv()).await.unwrap();
        assert_eq!(cmd, Some(AppCommand::Poll));
        drop(rx);
        tokio::time::timeout(Duration::from_secs(3), handle).await.unwrap().unwrap();
        assert!(done.load(Ordering::Relaxed));
    }
}
