use crate::commands::{AppCommand, PageMove};
use crate::securities::model::{Exchange, ImportStatus, Security, SecurityStats};
use crate::securities::SecurityFilters;
use crate::session::dto::{PageWindow, PaginationMeta};
use crate::session::LOGIN_ROUTE;
use crate::tasks::model::{TaskDetail, TaskLog, TaskStats, TaskStatus, TaskSummary};
use crate::tasks::TaskFilters;
use crossterm::event::KeyCode;
use ratatui::widgets::TableState;
use std::str::FromStr;
use tokio::sync::mpsc;

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum ViewMode {
    Login,
    TaskList,
    TaskDetail,
    TaskStats,
    Securities,
    Exchanges,
}

/// 左侧菜单（登录页不在菜单中）
pub const MENU_ITEMS: [(ViewMode, &str); 5] = [
    (ViewMode::TaskList, "任务列表"),
    (ViewMode::TaskDetail, "任务详情"),
    (ViewMode::TaskStats, "任务统计"),
    (ViewMode::Securities, "证券"),
    (ViewMode::Exchanges, "交易所"),
];

#[derive(PartialEq, Debug, Clone)]
pub enum InputMode {
    Normal,
    Command,
}

#[derive(PartialEq, Debug, Clone)]
pub enum FocusArea {
    Menu,     // 焦点在左侧菜单
    MainView, // 焦点在主视图
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum LoginField {
    Username,
    Password,
}

#[derive(Debug, Clone)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub field: LoginField,
}

#[derive(Debug, Clone)]
pub struct TaskListSnapshot {
    pub items: Vec<TaskSummary>,
    pub pagination: PaginationMeta,
    pub window: PageWindow,
    pub filters: TaskFilters,
}

#[derive(Debug, Clone)]
pub struct TaskDetailSnapshot {
    pub detail: TaskDetail,
    pub logs: Vec<TaskLog>,
    pub log_level: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SecurityListSnapshot {
    pub items: Vec<Security>,
    pub pagination: PaginationMeta,
    pub window: PageWindow,
    pub filters: SecurityFilters,
}

#[derive(Debug)]
pub enum AppEvent {
    Log(String),
    Message(String),
    Error(String),
    /// 路由跳转（401 时为登录页）
    Navigate(String),
    LoggedIn(String),
    Tasks(TaskListSnapshot),
    TaskDetail(Option<Box<TaskDetailSnapshot>>),
    TaskStats(TaskStats),
    Securities(SecurityListSnapshot),
    SecurityStats(SecurityStats),
    Exchanges(Vec<Exchange>),
    Import(ImportStatus),
    Ohlcv(ImportStatus),
}

/// 日志级别切换顺序
const LOG_LEVELS: [Option<&str>; 5] = [None, Some("ERROR"), Some("WARNING"), Some("INFO"), Some("DEBUG")];

pub struct App {
    pub view_mode: ViewMode,
    pub input_mode: InputMode,
    pub focus_area: FocusArea,
    pub menu_selected_index: usize,
    pub identity: Option<String>,
    pub login: LoginForm,
    pub tasks: TaskListSnapshot,
    pub selected_index: usize,
    pub task_table_state: TableState,
    pub detail: Option<TaskDetailSnapshot>,
    pub detail_scroll: u16,
    pub task_stats: Option<TaskStats>,
    pub securities: SecurityListSnapshot,
    pub security_index: usize,
    pub security_table_state: TableState,
    pub security_stats: Option<SecurityStats>,
    pub exchanges: Vec<Exchange>,
    pub import_status: Option<ImportStatus>,
    pub ohlcv_status: Option<ImportStatus>,
    pub pending_confirm: Option<(String, AppCommand)>,
    pub command_input: String,
    pub command_cursor: usize,
    pub command_history: Vec<String>,
    pub command_history_index: Option<usize>,
    pub log_messages: Vec<String>,
    pub cmd_tx: mpsc::UnboundedSender<AppCommand>,
    pub evt_rx: Option<mpsc::UnboundedReceiver<AppEvent>>,
}

impl App {
    pub fn new(
        session_info: Vec<String>,
        page_size: u64,
        cmd_tx: mpsc::UnboundedSender<AppCommand>,
        evt_rx: mpsc::UnboundedReceiver<AppEvent>,
    ) -> App {
        let mut log_messages = vec!["应用已启动".to_string()];
        log_messages.extend(session_info);

        App {
            view_mode: ViewMode::Login,
            input_mode: InputMode::Normal,
            focus_area: FocusArea::MainView,
            menu_selected_index: 0,
            identity: None,
            login: LoginForm {
                username: String::new(),
                password: String::new(),
                field: LoginField::Username,
            },
            tasks: TaskListSnapshot {
                items: Vec::new(),
                pagination: PaginationMeta::default(),
                window: PageWindow::new(page_size),
                filters: TaskFilters::default(),
            },
            selected_index: 0,
            task_table_state: {
                let mut s = TableState::default();
                s.select(Some(0));
                s
            },
            detail: None,
            detail_scroll: 0,
            task_stats: None,
            securities: SecurityListSnapshot {
                items: Vec::new(),
                pagination: PaginationMeta::default(),
                window: PageWindow::new(page_size),
                filters: SecurityFilters::default(),
            },
            security_index: 0,
            security_table_state: {
                let mut s = TableState::default();
                s.select(Some(0));
                s
            },
            security_stats: None,
            exchanges: Vec::new(),
            import_status: None,
            ohlcv_status: None,
            pending_confirm: None,
            command_input: String::new(),
            command_cursor: 0,
            command_history: Vec::new(),
            command_history_index: None,
            log_messages,
            cmd_tx,
            evt_rx: Some(evt_rx),
        }
    }

    pub fn add_log(&mut self, msg: String) {
        self.log_messages.push(msg);
    }

    fn send(&self, cmd: AppCommand) {
        let _ = self.cmd_tx.send(cmd);
    }

    pub fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Log(msg) | AppEvent::Message(msg) => self.add_log(msg),
            AppEvent::Error(msg) => self.add_log(format!("✗ {}", msg)),
            AppEvent::Navigate(route) => {
                if route == LOGIN_ROUTE {
                    self.enter_login();
                }
            }
            AppEvent::LoggedIn(identity) => {
                self.add_log(format!("✓ 已登录: {}", identity));
                self.identity = Some(identity);
                self.login.password.clear();
                if self.view_mode == ViewMode::Login {
                    self.switch_view(ViewMode::TaskList);
                }
            }
            AppEvent::Tasks(snapshot) => {
                self.tasks = snapshot;
                self.clamp_selection();
            }
            AppEvent::TaskDetail(Some(snapshot)) => {
                self.detail = Some(*snapshot);
            }
            AppEvent::TaskDetail(None) => {
                self.detail = None;
                self.detail_scroll = 0;
                if self.view_mode == ViewMode::TaskDetail {
                    self.switch_view(ViewMode::TaskList);
                }
            }
            AppEvent::TaskStats(stats) => self.task_stats = Some(stats),
            AppEvent::Securities(snapshot) => {
                self.securities = snapshot;
                if self.security_index >= self.securities.items.len() {
                    self.security_index = self.securities.items.len().saturating_sub(1);
                }
                self.security_table_state.select(Some(self.security_index));
            }
            AppEvent::SecurityStats(stats) => self.security_stats = Some(stats),
            AppEvent::Exchanges(list) => self.exchanges = list,
            AppEvent::Import(status) => self.import_status = Some(status),
            AppEvent::Ohlcv(status) => self.ohlcv_status = Some(status),
        }
    }

    /// 401 或登出：清空会话相关状态并回到登录页
    fn enter_login(&mut self) {
        if self.identity.is_some() {
            self.add_log("会话已失效，请重新登录".to_string());
        }
        self.identity = None;
        self.view_mode = ViewMode::Login;
        self.focus_area = FocusArea::MainView;
        self.login.password.clear();
        self.login.field = if self.login.username.is_empty() {
            LoginField::Username
        } else {
            LoginField::Password
        };
        self.detail = None;
        self.task_stats = None;
        self.pending_confirm = None;
        self.tasks.items.clear();
        self.securities.items.clear();
    }

    pub fn clamp_selection(&mut self) {
        if self.selected_index >= self.tasks.items.len() {
            self.selected_index = self.tasks.items.len().saturating_sub(1);
        }
        self.task_table_state.select(Some(self.selected_index));
    }

    /// 当前操作对象：详情页为打开的任务，列表页为选中行
    pub fn selected_task(&self) -> Option<&TaskSummary> {
        if self.view_mode == ViewMode::TaskDetail {
            return self.detail.as_ref().map(|d| &d.detail.summary);
        }
        self.tasks.items.get(self.selected_index)
    }

    fn switch_view(&mut self, view: ViewMode) {
        self.view_mode = view;
        if let Some(idx) = MENU_ITEMS.iter().position(|(v, _)| *v == view) {
            self.menu_selected_index = idx;
        }
        match view {
            ViewMode::TaskList => self.send(AppCommand::Tasks),
            ViewMode::TaskStats => self.send(AppCommand::Stats),
            ViewMode::Securities => {
                self.send(AppCommand::Securities);
                self.send(AppCommand::SecurityStats);
            }
            ViewMode::Exchanges => self.send(AppCommand::Exchanges { active_only: false }),
            ViewMode::TaskDetail | ViewMode::Login => {}
        }
    }

    fn open_selected(&mut self) {
        let Some(id) = self.tasks.items.get(self.selected_index).map(|t| t.id.clone()) else {
            self.add_log("没有可打开的任务".to_string());
            return;
        };
        self.detail_scroll = 0;
        self.view_mode = ViewMode::TaskDetail;
        self.menu_selected_index = 1;
        self.send(AppCommand::OpenTask { id });
    }

    fn close_detail(&mut self) {
        self.detail = None;
        self.detail_scroll = 0;
        self.send(AppCommand::CloseTask);
        self.view_mode = ViewMode::TaskList;
        self.menu_selected_index = 0;
    }

    fn request_retry(&mut self) {
        let Some(task) = self.selected_task() else {
            return;
        };
        if !task.status.can_retry() {
            let msg = format!("任务状态 {} 不可重试（仅失败/已取消）", task.status.display());
            self.add_log(msg);
            return;
        }
        let cmd = AppCommand::Retry {
            id: task.id.clone(),
            reason: None,
        };
        self.send(cmd);
    }

    fn request_cancel(&mut self) {
        let Some(task) = self.selected_task() else {
            return;
        };
        if !task.status.can_cancel() {
            let msg = format!("任务状态 {} 不可取消（仅运行中）", task.status.display());
            self.add_log(msg);
            return;
        }
        let prompt = format!("确认取消任务 {}？(y/n)", task.title);
        let cmd = AppCommand::Cancel {
            id: task.id.clone(),
            reason: None,
        };
        self.ask_confirm(prompt, cmd);
    }

    fn request_delete(&mut self, force: bool) {
        let Some(task) = self.selected_task() else {
            return;
        };
        if !task.status.can_delete(force) {
            self.add_log("仅终态任务可删除，强制删除请按 D".to_string());
            return;
        }
        let prompt = format!(
            "确认{}删除任务 {}？(y/n)",
            if force { "强制" } else { "" },
            task.title
        );
        let cmd = AppCommand::Delete {
            id: task.id.clone(),
            force,
        };
        self.ask_confirm(prompt, cmd);
    }

    fn ask_confirm(&mut self, prompt: String, cmd: AppCommand) {
        self.add_log(prompt.clone());
        self.pending_confirm = Some((prompt, cmd));
    }

    fn cycle_status_filter(&mut self) {
        let current = self.tasks.filters.status;
        let next = match current {
            None => Some(TaskStatus::ALL[0]),
            Some(st) => TaskStatus::ALL
                .iter()
                .position(|s| *s == st)
                .and_then(|i| TaskStatus::ALL.get(i + 1).copied()),
        };
        let value = next.map(|s| s.as_str().to_string()).unwrap_or_default();
        self.send(AppCommand::TaskFilter(vec![("status".to_string(), value)]));
    }

    fn cycle_log_level(&mut self) {
        let Some(ref snap) = self.detail else {
            return;
        };
        let current = snap.log_level.as_deref();
        let idx = LOG_LEVELS.iter().position(|l| *l == current).unwrap_or(0);
        let next = LOG_LEVELS[(idx + 1) % LOG_LEVELS.len()];
        self.send(AppCommand::Logs {
            level: next.map(|s| s.to_string()),
        });
    }

    fn refresh_current(&mut self) {
        match self.view_mode {
            ViewMode::TaskList => self.send(AppCommand::Tasks),
            ViewMode::TaskDetail => {
                if let Some(id) = self.detail.as_ref().map(|d| d.detail.summary.id.clone()) {
                    self.send(AppCommand::OpenTask { id });
                }
            }
            ViewMode::TaskStats => self.send(AppCommand::Stats),
            ViewMode::Securities => {
                self.send(AppCommand::Securities);
                self.send(AppCommand::SecurityStats);
                if self.import_status.is_some() {
                    self.send(AppCommand::ImportStatus { task_id: None });
                }
                if self.ohlcv_status.is_some() {
                    self.send(AppCommand::OhlcvStatus { task_id: None });
                }
            }
            ViewMode::Exchanges => self.send(AppCommand::Exchanges { active_only: false }),
            ViewMode::Login => {}
        }
    }

    /// 获取当前的预测建议
    pub fn get_completion_hint(&self) -> Option<String> {
        let commands = [
            "login", "logout", "tasks", "filter", "page", "limit", "open", "close", "retry",
            "cancel", "delete", "logs", "steps", "stats", "securities", "sfilter", "spage",
            "slimit", "sstats", "exchanges", "import", "ohlcv", "poll", "help", "quit",
        ];
        let input = self.command_input.trim();
        if input.is_empty() {
            return None;
        }

        let parts: Vec<&str> = input.split_whitespace().collect();
        if parts.len() == 1 {
            for cmd in commands {
                if cmd.starts_with(parts[0]) && cmd != parts[0] {
                    return Some(cmd[parts[0].len()..].to_string());
                }
            }
            return None;
        }
        let subs: &[&str] = match parts[0] {
            "import" => &["start", "status", "cancel"],
            "ohlcv" => &["daily", "historical", "weekly", "status", "cancel"],
            "page" | "spage" => &["next", "prev"],
            "filter" | "sfilter" => &["clear"],
            "logs" => &["all", "error", "warning", "info", "debug"],
            _ => &[],
        };
        let cur = parts.get(1).copied().unwrap_or("");
        subs.iter()
            .find(|s| s.starts_with(cur) && **s != cur)
            .map(|s| s[cur.len()..].to_string())
    }

    fn byte_index(&self, char_idx: usize) -> usize {
        self.command_input
            .char_indices()
            .nth(char_idx)
            .map(|(i, _)| i)
            .unwrap_or(self.command_input.len())
    }

    fn reset_command_line(&mut self) {
        self.command_input.clear();
        self.command_cursor = 0;
        self.input_mode = InputMode::Normal;
    }

    /// 返回 true 表示退出应用
    pub fn handle_key_event(&mut self, key: KeyCode) -> bool {
        if self.input_mode == InputMode::Command {
            return self.handle_command_key(key);
        }

        if let Some((_, cmd)) = self.pending_confirm.take() {
            if matches!(key, KeyCode::Char('y') | KeyCode::Char('Y')) {
                self.send(cmd);
            } else {
                self.add_log("已取消操作".to_string());
            }
            return false;
        }

        if self.view_mode == ViewMode::Login {
            return self.handle_login_key(key);
        }

        // 正常模式下的按键处理
        match key {
            KeyCode::Char('/') => {
                self.input_mode = InputMode::Command;
                self.command_input.clear();
                self.command_cursor = 0;
                false
            }
            KeyCode::Char('q') => true,
            KeyCode::Left => {
                self.focus_area = FocusArea::Menu;
                false
            }
            KeyCode::Right => {
                self.focus_area = FocusArea::MainView;
                false
            }
            KeyCode::Up => {
                if self.focus_area == FocusArea::Menu {
                    self.menu_selected_index = self.menu_selected_index.saturating_sub(1);
                } else {
                    match self.view_mode {
                        ViewMode::TaskDetail => {
                            self.detail_scroll = self.detail_scroll.saturating_sub(1)
                        }
                        ViewMode::TaskList => {
                            self.selected_index = self.selected_index.saturating_sub(1);
                            self.task_table_state.select(Some(self.selected_index));
                        }
                        ViewMode::Securities => {
                            self.security_index = self.security_index.saturating_sub(1);
                            self.security_table_state.select(Some(self.security_index));
                        }
                        _ => {}
                    }
                }
                false
            }
            KeyCode::Down => {
                if self.focus_area == FocusArea::Menu {
                    if self.menu_selected_index < MENU_ITEMS.len() - 1 {
                        self.menu_selected_index += 1;
                    }
                } else {
                    match self.view_mode {
                        ViewMode::TaskDetail => {
                            self.detail_scroll = self.detail_scroll.saturating_add(1)
                        }
                        ViewMode::TaskList => {
                            if self.selected_index < self.tasks.items.len().saturating_sub(1) {
                                self.selected_index += 1;
                            }
                            self.task_table_state.select(Some(self.selected_index));
                        }
                        ViewMode::Securities => {
                            if self.security_index < self.securities.items.len().saturating_sub(1) {
                                self.security_index += 1;
                            }
                            self.security_table_state.select(Some(self.security_index));
                        }
                        _ => {}
                    }
                }
                false
            }
            KeyCode::Enter => {
                if self.focus_area == FocusArea::Menu {
                    let view = MENU_ITEMS[self.menu_selected_index].0;
                    if view == ViewMode::TaskDetail {
                        self.open_selected();
                    } else {
                        self.switch_view(view);
                    }
                    self.focus_area = FocusArea::MainView;
                } else if self.view_mode == ViewMode::TaskList {
                    self.open_selected();
                }
                false
            }
            KeyCode::Esc | KeyCode::Char('x') => {
                if self.view_mode == ViewMode::TaskDetail {
                    self.close_detail();
                }
                false
            }
            KeyCode::Char('r') => {
                if matches!(self.view_mode, ViewMode::TaskList | ViewMode::TaskDetail) {
                    self.request_retry();
                }
                false
            }
            KeyCode::Char('k') => {
                if matches!(self.view_mode, ViewMode::TaskList | ViewMode::TaskDetail) {
                    self.request_cancel();
                }
                false
            }
            KeyCode::Char('d') | KeyCode::Char('D') => {
                if matches!(self.view_mode, ViewMode::TaskList | ViewMode::TaskDetail) {
                    self.request_delete(key == KeyCode::Char('D'));
                }
                false
            }
            KeyCode::Char('l') => {
                if self.view_mode == ViewMode::TaskDetail {
                    self.cycle_log_level();
                }
                false
            }
            KeyCode::Char('f') => {
                if self.view_mode == ViewMode::TaskList {
                    self.cycle_status_filter();
                }
                false
            }
            KeyCode::Char('F') => {
                match self.view_mode {
                    ViewMode::TaskList => self.send(AppCommand::TaskFilterClear),
                    ViewMode::Securities => self.send(AppCommand::SecurityFilterClear),
                    _ => {}
                }
                false
            }
            KeyCode::Char('n') | KeyCode::Char('p') => {
                let mv = if key == KeyCode::Char('n') {
                    PageMove::Next
                } else {
                    PageMove::Prev
                };
                match self.view_mode {
                    ViewMode::TaskList => self.send(AppCommand::TaskPage(mv)),
                    ViewMode::Securities => self.send(AppCommand::SecurityPage(mv)),
                    _ => {}
                }
                false
            }
            KeyCode::Char('i') => {
                if self.view_mode == ViewMode::Securities {
                    self.ask_confirm("确认启动证券导入？(y/n)".to_string(), AppCommand::ImportStart);
                }
                false
            }
            KeyCode::Char('g') => {
                self.refresh_current();
                false
            }
            _ => false,
        }
    }

    fn handle_login_key(&mut self, key: KeyCode) -> bool {
        match key {
            KeyCode::Tab | KeyCode::Up | KeyCode::Down => {
                self.login.field = match self.login.field {
                    LoginField::Username => LoginField::Password,
                    LoginField::Password => LoginField::Username,
                };
            }
            KeyCode::Enter => {
                if self.login.username.trim().is_empty() {
                    self.login.field = LoginField::Username;
                } else if self.login.password.is_empty() {
                    self.login.field = LoginField::Password;
                } else {
                    self.add_log(format!("正在登录: {}", self.login.username.trim()));
                    self.send(AppCommand::Login {
                        username: self.login.username.trim().to_string(),
                        password: self.login.password.clone(),
                    });
                }
            }
            KeyCode::Backspace => {
                match self.login.field {
                    LoginField::Username => self.login.username.pop(),
                    LoginField::Password => self.login.password.pop(),
                };
            }
            KeyCode::Esc => {
                self.login.password.clear();
            }
            // 空用户名时 `/` 进入命令模式（可 /quit）
            KeyCode::Char('/')
                if self.login.field == LoginField::Username && self.login.username.is_empty() =>
            {
                self.input_mode = InputMode::Command;
                self.command_input.clear();
                self.command_cursor = 0;
            }
            KeyCode::Char(c) => match self.login.field {
                LoginField::Username => self.login.username.push(c),
                LoginField::Password => self.login.password.push(c),
            },
            _ => {}
        }
        false
    }

    fn handle_command_key(&mut self, key: KeyCode) -> bool {
        match key {
            KeyCode::Enter => {
                let cmd_owned = self.command_input.trim().to_string();
                self.reset_command_line();
                if cmd_owned.is_empty() {
                    return false;
                }
                let app_cmd = AppCommand::from_str(&cmd_owned)
                    .unwrap_or_else(|_| AppCommand::Unknown(cmd_owned.clone()));
                // 登录命令不进入历史（含密码）
                if !matches!(app_cmd, AppCommand::Login { .. }) {
                    self.command_history.push(cmd_owned);
                }
                self.command_history_index = None;
                match app_cmd {
                    AppCommand::Quit => return true,
                    AppCommand::OpenTask { .. } => {
                        self.detail_scroll = 0;
                        self.view_mode = ViewMode::TaskDetail;
                        self.menu_selected_index = 1;
                        self.send(app_cmd);
                    }
                    AppCommand::CloseTask => self.close_detail(),
                    AppCommand::Stats => self.switch_view(ViewMode::TaskStats),
                    AppCommand::Securities => self.switch_view(ViewMode::Securities),
                    AppCommand::Exchanges { .. } => {
                        self.view_mode = ViewMode::Exchanges;
                        self.menu_selected_index = 4;
                        self.send(app_cmd);
                    }
                    AppCommand::Tasks => self.switch_view(ViewMode::TaskList),
                    other => self.send(other),
                }
                false
            }
            KeyCode::Esc => {
                self.reset_command_line();
                false
            }
            KeyCode::Tab => {
                if let Some(hint) = self.get_completion_hint() {
                    let insert = format!("{} ", hint);
                    let at = self.byte_index(self.command_cursor);
                    self.command_input.insert_str(at, &insert);
                    self.command_cursor += insert.chars().count();
                }
                false
            }
            KeyCode::Up => {
                if self.command_history.is_empty() {
                    return false;
                }
                let next = match self.command_history_index {
                    None => self.command_history.len().saturating_sub(1),
                    Some(i) => i.saturating_sub(1),
                };
                self.command_history_index = Some(next);
                if let Some(cmd) = self.command_history.get(next) {
                    self.command_input = cmd.clone();
                    self.command_cursor = self.command_input.chars().count();
                }
                false
            }
            KeyCode::Down => {
                let Some(i) = self.command_history_index else {
                    return false;
                };
                let n = i + 1;
                if n >= self.command_history.len() {
                    self.command_history_index = None;
                    self.command_input.clear();
                    self.command_cursor = 0;
                    return false;
                }
                self.command_history_index = Some(n);
                if let Some(cmd) = self.command_history.get(n) {
                    self.command_input = cmd.clone();
                    self.command_cursor = self.command_input.chars().count();
                }
                false
            }
            KeyCode::Backspace => {
                if self.command_cursor > 0 {
                    let at = self.byte_index(self.command_cursor - 1);
                    self.command_input.remove(at);
                    self.command_cursor -= 1;
                }
                false
            }
            KeyCode::Delete => {
                if self.command_cursor < self.command_input.chars().count() {
                    let at = self.byte_index(self.command_cursor);
                    self.command_input.remove(at);
                }
                false
            }
            KeyCode::Left => {
                self.command_cursor = self.command_cursor.saturating_sub(1);
                false
            }
            KeyCode::Right => {
                if self.command_cursor < self.command_input.chars().count() {
                    self.command_cursor += 1;
                }
                false
            }
            KeyCode::Home => {
                self.command_cursor = 0;
                false
            }
            KeyCode::End => {
                self.command_cursor = self.command_input.chars().count();
                false
            }
            KeyCode::Char(c) => {
                let at = self.byte_index(self.command_cursor);
                self.command_input.insert(at, c);
                self.command_cursor += 1;
                false
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::model::TaskType;

    fn task(id: &str, status: TaskStatus) -> TaskSummary {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "task_type": TaskType::SecuritiesImport,
            "status": status,
            "title": format!("task {}", id),
        }))
        .unwrap()
    }

    fn app_with(tasks: Vec<TaskSummary>) -> (App, mpsc::UnboundedReceiver<AppCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (_evt_tx, evt_rx) = mpsc::unbounded_channel();
        let mut app = App::new(Vec::new(), 25, cmd_tx, evt_rx);
        app.identity = Some("admin".to_string());
        app.view_mode = ViewMode::TaskList;
        app.apply_event(AppEvent::Tasks(TaskListSnapshot {
            items: tasks,
            pagination: PaginationMeta::from_window(2, 0, 25),
            window: PageWindow::new(25),
            filters: TaskFilters::default(),
        }));
        (app, cmd_rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<AppCommand>) -> Vec<AppCommand> {
        let mut out = Vec::new();
        while let Ok(cmd) = rx.try_recv() {
            out.push(cmd);
        }
        out
    }

    #[test]
    fn refresh_on_securities_follows_running_jobs() {
        let (mut app, mut rx) = app_with(Vec::new());
        app.view_mode = ViewMode::Securities;
        app.focus_area = FocusArea::MainView;
        app.apply_event(AppEvent::Ohlcv(
            serde_json::from_str(r#"{"task_id":"o1","status":"PROGRESS","progress":10}"#).unwrap(),
        ));
        assert_eq!(app.ohlcv_status.as_ref().map(|s| s.task_id.as_str()), Some("o1"));

        app.handle_key_event(KeyCode::Char('g'));
        assert_eq!(
            drain(&mut rx),
            vec![
                AppCommand::Securities,
                AppCommand::SecurityStats,
                AppCommand::OhlcvStatus { task_id: None },
            ]
        );
    }

    #[test]
    fn retry_only_offered_for_failed_tasks() {
        let (mut app, mut rx) = app_with(vec![task("ok", TaskStatus::Success), task("bad", TaskStatus::Failure)]);

        app.handle_key_event(KeyCode::Char('r'));
        assert!(drain(&mut rx).is_empty());

        app.handle_key_event(KeyCode::Down);
        app.handle_key_event(KeyCode::Char('r'));
        assert_eq!(
            drain(&mut rx),
            vec![AppCommand::Retry {
                id: "bad".to_string(),
                reason: None
            }]
        );
    }

    #[test]
    fn cancel_requires_running_task_and_confirmation() {
        let (mut app, mut rx) = app_with(vec![task("run", TaskStatus::Progress), task("done", TaskStatus::Success)]);

        app.handle_key_event(KeyCode::Char('k'));
        assert!(app.pending_confirm.is_some());
        app.handle_key_event(KeyCode::Char('y'));
        assert_eq!(
            drain(&mut rx),
            vec![AppCommand::Cancel {
                id: "run".to_string(),
                reason: None
            }]
        );

        app.handle_key_event(KeyCode::Down);
        app.handle_key_event(KeyCode::Char('k'));
        assert!(app.pending_confirm.is_none());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn delete_of_running_task_needs_force() {
        let (mut app, mut rx) = app_with(vec![task("run", TaskStatus::Started)]);

        app.handle_key_event(KeyCode::Char('d'));
        assert!(app.pending_confirm.is_none());

        app.handle_key_event(KeyCode::Char('D'));
        app.handle_key_event(KeyCode::Char('n'));
        assert!(drain(&mut rx).is_empty());

        app.handle_key_event(KeyCode::Char('D'));
        app.handle_key_event(KeyCode::Char('y'));
        assert_eq!(
            drain(&mut rx),
            vec![AppCommand::Delete {
                id: "run".to_string(),
                force: true
            }]
        );
    }

    #[test]
    fn navigate_to_login_resets_session_state() {
        let (mut app, _rx) = app_with(vec![task("a", TaskStatus::Failure)]);
        app.apply_event(AppEvent::TaskStats(TaskStats::default()));

        app.apply_event(AppEvent::Navigate("/auth/login".to_string()));

        assert_eq!(app.view_mode, ViewMode::Login);
        assert!(app.identity.is_none());
        assert!(app.tasks.items.is_empty());
        assert!(app.task_stats.is_none());
    }

    #[test]
    fn login_form_submits_credentials() {
        let (cmd_tx, mut rx) = mpsc::unbounded_channel();
        let (_evt_tx, evt_rx) = mpsc::unbounded_channel();
        let mut app = App::new(Vec::new(), 25, cmd_tx, evt_rx);

        for c in "admin".chars() {
            app.handle_key_event(KeyCode::Char(c));
        }
        app.handle_key_event(KeyCode::Enter);
        assert_eq!(app.login.field, LoginField::Password);
        for c in "s3cret".chars() {
            app.handle_key_event(KeyCode::Char(c));
        }
        app.handle_key_event(KeyCode::Enter);
        assert_eq!(
            drain(&mut rx),
            vec![AppCommand::Login {
                username: "admin".to_string(),
                password: "s3cret".to_string()
            }]
        );

        app.apply_event(AppEvent::LoggedIn("admin".to_string()));
        assert_eq!(app.view_mode, ViewMode::TaskList);
        assert!(app.login.password.is_empty());
        assert_eq!(drain(&mut rx), vec![AppCommand::Tasks]);
    }

    #[test]
    fn status_filter_cycles_through_all_statuses() {
        let (mut app, mut rx) = app_with(vec![]);
        app.handle_key_event(KeyCode::Char('f'));
        assert_eq!(
            drain(&mut rx),
            vec![AppCommand::TaskFilter(vec![("status".to_string(), "PENDING".to_string())])]
        );

        app.tasks.filters.status = Some(TaskStatus::Cancelled);
        app.handle_key_event(KeyCode::Char('f'));
        assert_eq!(
            drain(&mut rx),
            vec![AppCommand::TaskFilter(vec![("status".to_string(), String::new())])]
        );
    }

    #[test]
    fn command_line_handles_multibyte_input() {
        let (mut app, mut rx) = app_with(vec![]);
        app.handle_key_event(KeyCode::Char('/'));
        for c in "retry t1 数据修复".chars() {
            app.handle_key_event(KeyCode::Char(c));
        }
        app.handle_key_event(KeyCode::Backspace);
        app.handle_key_event(KeyCode::Enter);
        assert_eq!(
            drain(&mut rx),
            vec![AppCommand::Retry {
                id: "t1".to_string(),
                reason: Some("数据修".to_string())
            }]
        );
        assert_eq!(app.input_mode, InputMode::Normal);
    }
}
