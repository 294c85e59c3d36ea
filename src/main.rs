mod app_service;
mod app_state;
mod commands;
mod config;
mod format;
mod ohlcv;
mod securities;
mod session;
mod storage;
mod tasks;
mod ui;

use anyhow::Context;
use chrono::Local;
use log::warn;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::app_service::{run_poll_ticker, AppService};
use crate::app_state::{App, AppEvent};
use crate::commands::AppCommand;
use crate::config::AppConfig;
use crate::session::{ApiSession, ReqwestTransport};
use crate::storage::{CredentialStore, MemoryCredentialStore, SqliteCredentialStore};
use crate::ui::draw;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let ts = Local::now().format("%Y%m%d-%H%M%S").to_string();
    let log_dir = std::path::PathBuf::from("logs");
    std::fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join(format!("app-{}.log", ts));
    let log_file = std::fs::File::create(log_path)?;
    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file))) // 输出重定向到文件，避免破坏 TUI
        .filter_level(log::LevelFilter::Warn)
        .filter_module("quantpulse_console", log::LevelFilter::Info)
        .filter_module("sqlx", log::LevelFilter::Error)
        .filter_module("sea_orm", log::LevelFilter::Error)
        .init();

    let mut session_info = Vec::new();
    match dotenv::dotenv() {
        Ok(path) => session_info.push(format!("✓ 已加载 {}", path.display())),
        Err(_) => session_info.push("⚠ 未找到 .env 文件，使用系统环境变量".to_string()),
    }

    let config = AppConfig::from_env();
    session_info.extend(config.describe());

    // 本地存储（令牌 / 用户信息），不可用时退回内存
    let credentials: Arc<dyn CredentialStore> =
        match storage::establish_connection(&config.database_url).await {
            Ok(db) => {
                session_info.push("✓ 本地存储就绪".to_string());
                Arc::new(SqliteCredentialStore::new(Arc::new(db)))
            }
            Err(e) => {
                warn!("数据库连接失败 {}: {}", config.database_url, e);
                session_info.push(format!("⚠ 本地存储不可用，会话不会保存: {}", e));
                Arc::new(MemoryCredentialStore::new())
            }
        };

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<AppCommand>();
    let (evt_tx, evt_rx) = mpsc::unbounded_channel::<AppEvent>();

    let transport = Arc::new(
        ReqwestTransport::new(&config.api_base_url, config.http_timeout)
            .context("创建 HTTP 客户端失败")?,
    );
    let session = Arc::new(ApiSession::new(transport, credentials).with_events(evt_tx.clone()));

    let poll_interval = Arc::new(AtomicU64::new(config.poll_interval_secs));
    let mut service = AppService::new(session, config.page_size, poll_interval.clone(), evt_tx);

    // 恢复会话，失败则尝试 .env 中的账号，否则停在登录页
    if service.restore().await {
        session_info.push("✓ 已恢复本地会话".to_string());
    } else if let Some((username, password)) = config.auto_login() {
        session_info.push(format!("正在使用配置账号登录: {}", username));
        let _ = cmd_tx.send(AppCommand::Login {
            username: username.to_string(),
            password: password.to_string(),
        });
    } else {
        session_info.push("请登录（或在 .env 中设置 QP_USERNAME / QP_PASSWORD）".to_string());
    }

    tokio::spawn(service.run(cmd_rx));
    tokio::spawn(run_poll_ticker(poll_interval, cmd_tx.clone()));

    // TUI 初始化
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(session_info, config.page_size, cmd_tx, evt_rx);
    if let Some((username, _)) = config.auto_login() {
        app.login.username = username.to_string();
    }

    let rx = app.evt_rx.take().context("事件通道已被占用")?;
    let res = run_app_loop(&mut terminal, &mut app, rx).await;

    // 恢复终端
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res.context("界面循环异常退出")
}

async fn run_app_loop<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    mut evt_rx: mpsc::UnboundedReceiver<AppEvent>,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| draw(f, app))?;

        while let Ok(event) = evt_rx.try_recv() {
            app.apply_event(event);
        }

        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_key_event(key.code) {
                    return Ok(());
                }
            }
        }
    }
}
