use crate::app_state::{App, FocusArea, InputMode, LoginField, ViewMode, MENU_ITEMS};
use crate::format::{
    format_datetime, format_number, format_relative, log_severity, truncate, Severity,
};
use crate::securities::model::ImportStatus;
use crate::tasks::model::{BreakdownRow, TaskStatus};
use chrono::Utc;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table, Wrap},
    Frame,
};
use serde_json::Value;

pub fn draw(f: &mut Frame, app: &mut App) {
    // 创建布局
    let chunks = Layout::default()
        .direction(ratatui::layout::Direction::Vertical)
        .constraints([
            Constraint::Length(3), // 顶部标题栏
            Constraint::Min(0),    // 中间内容区域
            Constraint::Min(8),    // 底部命令/日志区域
        ])
        .split(f.size());

    render_top_bar(f, chunks[0], app);

    if app.view_mode == ViewMode::Login {
        render_login(f, chunks[1], app);
    } else {
        let middle_chunks = Layout::default()
            .direction(ratatui::layout::Direction::Horizontal)
            .constraints([Constraint::Length(20), Constraint::Min(0)])
            .split(chunks[1]);
        render_left_menu(f, middle_chunks[0], app);
        render_main_view(f, middle_chunks[1], app);
    }

    render_bottom_bar(f, chunks[2], app);
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Success => Color::Green,
        Severity::Info => Color::Cyan,
        Severity::Warning => Color::Yellow,
        Severity::Danger => Color::Red,
        Severity::Secondary => Color::Gray,
    }
}

fn status_symbol(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Success => "✓",
        TaskStatus::Failure => "✗",
        TaskStatus::Started | TaskStatus::Progress => "▶",
        TaskStatus::Pending | TaskStatus::Received => "○",
        TaskStatus::Retry => "↻",
        TaskStatus::Revoked | TaskStatus::Cancelled => "■",
    }
}

fn status_span(status: TaskStatus) -> Span<'static> {
    Span::styled(
        format!("{} {}", status_symbol(status), status.display()),
        Style::default().fg(severity_color(status.severity())),
    )
}

fn main_block(title: String, app: &App) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .title(title)
        .style(if app.focus_area == FocusArea::MainView {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::White)
        })
}

fn section(title: &str) -> Line<'static> {
    Line::from(vec![Span::styled(
        format!("--- {} ---", title),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )])
}

fn field<'a>(label: &'a str, value: String) -> Line<'a> {
    Line::from(vec![
        Span::styled(label, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(value),
    ])
}

/// 占比条：每 5% 一格
fn bar(percentage: u32) -> String {
    let filled = (percentage.min(100) / 5) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(20 - filled))
}

fn json_lines(value: &Value) -> Vec<Line<'static>> {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|_| value.to_string())
        .lines()
        .take(20)
        .map(|l| Line::from(format!("  {}", l)))
        .collect()
}

fn render_top_bar(f: &mut Frame, area: Rect, app: &App) {
    let title = Block::default()
        .borders(Borders::ALL)
        .style(Style::default().fg(Color::Cyan));

    let identity = match app.identity {
        Some(ref who) => Span::styled(format!("  [{}]", who), Style::default().fg(Color::Green)),
        None => Span::styled("  [未登录]", Style::default().fg(Color::Yellow)),
    };
    let title_text = Line::from(vec![
        Span::styled(
            " QuantPulse 管理控制台 ",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" - 任务与证券数据"),
        identity,
    ]);

    let paragraph = Paragraph::new(title_text)
        .block(title)
        .alignment(ratatui::layout::Alignment::Center);

    f.render_widget(paragraph, area);
}

fn render_login(f: &mut Frame, area: Rect, app: &App) {
    let vertical = Layout::default()
        .direction(ratatui::layout::Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(8),
            Constraint::Min(0),
        ])
        .split(area);
    let horizontal = Layout::default()
        .direction(ratatui::layout::Direction::Horizontal)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(50),
            Constraint::Min(0),
        ])
        .split(vertical[1]);

    let field_style = |which: LoginField| {
        if app.login.field == which {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        }
    };
    let masked = "*".repeat(app.login.password.chars().count());
    let lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled(" 用户名: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(format!("{:<30}", app.login.username), field_style(LoginField::Username)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled(" 密  码: ", Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(format!("{:<30}", masked), field_style(LoginField::Password)),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            " Tab 切换  Enter 登录  Esc 清空密码",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let form = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("登录")
            .style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(form, horizontal[1]);
}

fn render_left_menu(f: &mut Frame, area: Rect, app: &App) {
    let menu_items: Vec<ListItem> = MENU_ITEMS
        .iter()
        .enumerate()
        .map(|(i, (view, text))| {
            let is_selected = i == app.menu_selected_index;
            let is_active = *view == app.view_mode;

            let style = if is_selected {
                // 选中的菜单项
                if app.focus_area == FocusArea::Menu {
                    Style::default()
                        .fg(Color::Black)
                        .bg(Color::Magenta)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                        .fg(Color::Magenta)
                        .add_modifier(Modifier::BOLD)
                }
            } else if is_active {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::White)
            };

            let prefix = if is_active { "● " } else { "○ " };
            ListItem::new(format!("{}{}", prefix, text)).style(style)
        })
        .collect();

    let title = if app.focus_area == FocusArea::Menu {
        "菜单 (Enter 确认)"
    } else {
        "菜单 (← 切换)"
    };

    let menu =
        List::new(menu_items).block(Block::default().borders(Borders::ALL).title(title).style(
            if app.focus_area == FocusArea::Menu {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default().fg(Color::White)
            },
        ));

    f.render_widget(menu, area);
}

fn render_main_view(f: &mut Frame, area: Rect, app: &mut App) {
    match app.view_mode {
        ViewMode::TaskList => render_task_list(f, area, app),
        ViewMode::TaskDetail => render_task_detail(f, area, app),
        ViewMode::TaskStats => render_task_stats(f, area, app),
        ViewMode::Securities => render_securities(f, area, app),
        ViewMode::Exchanges => render_exchanges(f, area, app),
        ViewMode::Login => {}
    }
}

fn render_task_list(f: &mut Frame, area: Rect, app: &mut App) {
    let now = Utc::now();
    let rows: Vec<Row> = app
        .tasks
        .items
        .iter()
        .map(|t| {
            let progress = match t.step_progress() {
                Some(steps) => format!("{:>3}% ({})", t.progress_percentage, steps),
                None => format!("{:>3}%", t.progress_percentage),
            };
            Row::new(vec![
                Cell::from(status_span(t.status)),
                Cell::from(t.task_type.to_string()),
                Cell::from(truncate(&t.title, 40)),
                Cell::from(progress),
                Cell::from(format_relative(t.created_at, now)),
                Cell::from(t.duration_display()),
            ])
        })
        .collect();

    let p = &app.tasks.pagination;
    let title = format!(
        "任务列表 [{}] 第 {}/{} 页 共 {} 条{}",
        app.tasks.filters.describe(),
        p.page,
        p.pages.max(1),
        format_number(p.total),
        if app.focus_area == FocusArea::MainView {
            " (Enter 详情, f 状态, n/p 翻页)"
        } else {
            ""
        }
    );

    let header = Row::new(vec!["状态", "类型", "标题", "进度", "创建", "耗时"])
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    let table = Table::new(
        rows,
        [
            Constraint::Length(14),
            Constraint::Length(18),
            Constraint::Min(20),
            Constraint::Length(14),
            Constraint::Length(12),
            Constraint::Length(9),
        ],
    )
    .header(header)
    .block(main_block(title, app))
    .highlight_style(
        Style::default()
            .fg(Color::Black)
            .bg(Color::White)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol(">> ");

    if app.tasks.items.is_empty() {
        let empty = Paragraph::new("暂无任务（g 刷新, F 清除过滤）").block(main_block(
            format!("任务列表 [{}]", app.tasks.filters.describe()),
            app,
        ));
        f.render_widget(empty, area);
        return;
    }
    app.task_table_state.select(Some(app.selected_index));
    f.render_stateful_widget(table, area, &mut app.task_table_state);
}

fn render_task_detail(f: &mut Frame, area: Rect, app: &App) {
    let Some(ref snap) = app.detail else {
        let p = Paragraph::new("正在加载详情...").block(main_block("任务详情".to_string(), app));
        f.render_widget(p, area);
        return;
    };
    let d = &snap.detail;
    let t = &d.summary;
    let stats = d.summary_stats();

    let mut lines = vec![
        Line::from(vec![
            Span::styled(t.title.clone(), Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            status_span(t.status),
        ]),
        field("ID: ", t.id.clone()),
        field("类型: ", t.task_type.to_string()),
        field(
            "进度: ",
            format!(
                "{}% {}",
                t.progress_percentage,
                t.current_message.clone().unwrap_or_default()
            ),
        ),
        field("创建: ", format_datetime(t.created_at)),
        field("开始: ", format_datetime(t.started_at)),
        field(
            "完成: ",
            if t.status.is_completed() {
                format_datetime(t.completed_at)
            } else {
                "-".to_string()
            },
        ),
        field("耗时: ", t.duration_display()),
        field("重试次数: ", t.retry_count.to_string()),
        Line::from(""),
        Line::from(format!(
            "步骤 {}/{} 完成, {} 失败  日志 {} 条 ({} 错误, {} 警告)",
            stats.completed_steps,
            stats.total_steps,
            stats.failed_steps,
            stats.total_logs,
            stats.error_logs,
            stats.warning_logs
        )),
    ];

    if d.has_error_details() {
        lines.push(Line::from(""));
        lines.push(section("错误"));
        if let Some(ref msg) = d.error_message {
            lines.push(Line::from(Span::styled(msg.clone(), Style::default().fg(Color::Red))));
        }
        if let Some(ref tb) = d.error_traceback {
            for l in tb.lines() {
                lines.push(Line::from(Span::styled(
                    format!("  {}", l),
                    Style::default().fg(Color::LightRed),
                )));
            }
        }
    }

    if let Some(ref params) = d.input_parameters {
        lines.push(Line::from(""));
        lines.push(section("输入参数"));
        lines.extend(json_lines(params));
    }
    if let Some(ref result) = d.result_data {
        lines.push(Line::from(""));
        lines.push(section("结果"));
        lines.extend(json_lines(result));
    }

    lines.push(Line::from(""));
    lines.push(section("步骤"));
    if d.steps.is_empty() {
        lines.push(Line::from("  (无)"));
    }
    for step in d.ordered_steps() {
        lines.push(Line::from(vec![
            Span::raw(format!("  {:>2}. ", step.step_order)),
            status_span(step.status),
            Span::raw(format!(
                "  {}",
                if step.title.is_empty() { &step.step_name } else { &step.title }
            )),
        ]));
    }

    lines.push(Line::from(""));
    lines.push(section(&format!(
        "日志 [{}] (l 切换级别)",
        snap.log_level.as_deref().unwrap_or("ALL")
    )));
    if snap.logs.is_empty() {
        lines.push(Line::from("  (无)"));
    }
    for log in &snap.logs {
        lines.push(Line::from(vec![
            Span::styled(
                format!("  {} ", format_datetime(log.created_at)),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled(
                format!("{:<8}", log.level_display()),
                Style::default().fg(severity_color(log_severity(&log.level))),
            ),
            Span::raw(log.message.clone()),
        ]));
    }

    let title = if app.focus_area == FocusArea::MainView {
        "任务详情 (↑↓ 滚动, r 重试, k 取消, d 删除, x 返回)".to_string()
    } else {
        "任务详情".to_string()
    };
    let paragraph = Paragraph::new(lines)
        .block(main_block(title, app))
        .wrap(Wrap { trim: false })
        .scroll((app.detail_scroll, 0));
    f.render_widget(paragraph, area);
}

fn breakdown_lines(rows: &[BreakdownRow], color_of: impl Fn(&str) -> Color) -> Vec<Line<'static>> {
    if rows.is_empty() {
        return vec![Line::from("  (无数据)")];
    }
    rows.iter()
        .map(|r| {
            Line::from(vec![
                Span::raw(format!("  {:<20}", r.label)),
                Span::styled(bar(r.percentage), Style::default().fg(color_of(&r.label))),
                Span::raw(format!(" {:>6} {:>3}%", format_number(r.count), r.percentage)),
            ])
        })
        .collect()
}

fn render_task_stats(f: &mut Frame, area: Rect, app: &App) {
    let Some(ref stats) = app.task_stats else {
        let p = Paragraph::new("正在加载统计...").block(main_block("任务统计".to_string(), app));
        f.render_widget(p, area);
        return;
    };

    let mut lines = vec![
        section("概览"),
        Line::from(format!("  总任务    : {:>8}", format_number(stats.total_tasks))),
        Line::from(Span::styled(
            format!("  运行中    : {:>8}", format_number(stats.running_tasks)),
            Style::default().fg(Color::Cyan),
        )),
        Line::from(format!("  24h 新增  : {:>8}", format_number(stats.recent_tasks_24h))),
        Line::from(Span::styled(
            format!("  7d 失败   : {:>8}", format_number(stats.recent_failures_7d)),
            Style::default().fg(Color::Red),
        )),
        Line::from(Span::styled(
            format!("  成功率    : {:>7.1}%", stats.success_rate_percentage),
            Style::default().fg(Color::Green),
        )),
        Line::from(""),
        section("按状态"),
    ];
    lines.extend(breakdown_lines(&stats.status_rows(), |label| {
        label
            .parse::<TaskStatus>()
            .map(|s| severity_color(s.severity()))
            .unwrap_or(Color::Gray)
    }));
    lines.push(Line::from(""));
    lines.push(section("按类型"));
    lines.extend(breakdown_lines(&stats.type_rows(), |_| Color::Magenta));

    lines.push(Line::from(""));
    lines.push(section("运行中任务"));
    if stats.running_task_details.is_empty() {
        lines.push(Line::from("  (无)"));
    }
    for r in &stats.running_task_details {
        lines.push(Line::from(vec![
            Span::styled(
                format!("  {:>3}% ", r.progress_percentage.unwrap_or(0)),
                Style::default().fg(Color::Cyan),
            ),
            Span::raw(format!(
                "{} [{}] {}",
                r.title.as_deref().unwrap_or("-"),
                r.task_type.as_deref().unwrap_or("-"),
                r.current_message.as_deref().unwrap_or("")
            )),
        ]));
    }

    let paragraph = Paragraph::new(lines).block(main_block("任务统计 (g 刷新)".to_string(), app));
    f.render_widget(paragraph, area);
}

/// 后台作业一行：失败红、结束绿、进行中青
fn job_line(label: &str, st: &ImportStatus) -> Line<'static> {
    let color = if st.error.is_some() || st.status.eq_ignore_ascii_case("FAILURE") {
        Color::Red
    } else if st.is_finished() {
        Color::Green
    } else {
        Color::Cyan
    };
    Line::from(Span::styled(
        format!("{} {} [{}] {}% {}", label, st.task_id, st.status, st.progress, st.message),
        Style::default().fg(color),
    ))
}

fn render_securities(f: &mut Frame, area: Rect, app: &mut App) {
    let chunks = Layout::default()
        .direction(ratatui::layout::Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(0)])
        .split(area);

    let stats_line = match app.security_stats {
        Some(ref s) => format!(
            "总数 {}  活跃 {}  期货 {}  衍生品 {}",
            format_number(s.total),
            format_number(s.active),
            format_number(s.futures),
            format_number(s.derivatives)
        ),
        None => "统计加载中...".to_string(),
    };
    let import_line = match app.import_status {
        Some(ref st) => job_line("导入", st),
        None => Line::from(Span::styled("i 启动导入", Style::default().fg(Color::DarkGray))),
    };
    let ohlcv_line = match app.ohlcv_status {
        Some(ref st) => job_line("行情", st),
        None => Line::from(Span::styled(
            "/ohlcv daily|historical|weekly 启动行情作业",
            Style::default().fg(Color::DarkGray),
        )),
    };
    let header = Paragraph::new(vec![Line::from(stats_line), import_line, ohlcv_line])
        .block(Block::default().borders(Borders::ALL).title("证券概览"));
    f.render_widget(header, chunks[0]);

    let rows: Vec<Row> = app
        .securities
        .items
        .iter()
        .map(|s| {
            Row::new(vec![
                Cell::from(s.symbol.clone()),
                Cell::from(truncate(&s.name, 32)),
                Cell::from(s.exchange_code().to_string()),
                Cell::from(Span::styled(
                    s.security_type.clone(),
                    Style::default().fg(if s.is_derivative() { Color::Magenta } else { Color::White }),
                )),
                Cell::from(s.segment.clone()),
                Cell::from(s.sector.clone().unwrap_or_else(|| "-".to_string())),
                Cell::from(s.lot_size.to_string()),
                Cell::from(s.flags()),
            ])
        })
        .collect();

    let p = &app.securities.pagination;
    let title = format!(
        "证券 [{}] 第 {}/{} 页 共 {} 条",
        app.securities.filters.describe(),
        p.page,
        p.pages.max(1),
        format_number(p.total)
    );
    let table = Table::new(
        rows,
        [
            Constraint::Length(14),
            Constraint::Min(20),
            Constraint::Length(6),
            Constraint::Length(12),
            Constraint::Length(10),
            Constraint::Length(14),
            Constraint::Length(6),
            Constraint::Length(6),
        ],
    )
    .header(
        Row::new(vec!["代码", "名称", "交易所", "类型", "市场", "板块", "手数", "标记"])
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
    )
    .block(main_block(title, app))
    .highlight_style(
        Style::default()
            .fg(Color::Black)
            .bg(Color::White)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol(">> ");
    app.security_table_state.select(Some(app.security_index));
    f.render_stateful_widget(table, chunks[1], &mut app.security_table_state);
}

fn render_exchanges(f: &mut Frame, area: Rect, app: &App) {
    let rows: Vec<Row> = app
        .exchanges
        .iter()
        .map(|e| {
            Row::new(vec![
                Cell::from(e.code.clone()),
                Cell::from(e.name.clone()),
                Cell::from(e.country.clone().unwrap_or_else(|| "-".to_string())),
                Cell::from(e.timezone.clone().unwrap_or_else(|| "-".to_string())),
                Cell::from(e.currency.clone()),
                Cell::from(e.trading_hours()),
                Cell::from(Span::styled(
                    if e.is_active { "活跃" } else { "停用" },
                    Style::default().fg(if e.is_active { Color::Green } else { Color::Gray }),
                )),
            ])
        })
        .collect();
    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Min(24),
            Constraint::Length(10),
            Constraint::Length(16),
            Constraint::Length(6),
            Constraint::Length(13),
            Constraint::Length(6),
        ],
    )
    .header(
        Row::new(vec!["代码", "名称", "国家", "时区", "货币", "交易时间", "状态"])
            .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
    )
    .block(main_block(format!("交易所 ({})", app.exchanges.len()), app));
    f.render_widget(table, area);
}

fn view_hint(view: ViewMode) -> &'static str {
    match view {
        ViewMode::TaskList => "/命令 ↑↓选择 Enter详情 r重试 k取消 d删除 D强删 f状态 F清除 n/p翻页 g刷新 q退出",
        ViewMode::TaskDetail => "↑↓滚动 r重试 k取消 d删除 D强删 l日志级别 g刷新 x返回 q退出",
        ViewMode::Securities => "/命令 ↑↓选择 n/p翻页 F清除过滤 i导入 g刷新 q退出",
        _ => "/命令 ←→切换 ↑↓导航 Enter确认 g刷新 q退出",
    }
}

fn render_bottom_bar(f: &mut Frame, area: Rect, app: &App) {
    let bottom_chunks = Layout::default()
        .direction(ratatui::layout::Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(0)])
        .split(area);

    // 命令输入区域
    let command_prompt = if app.input_mode == InputMode::Command {
        let mut spans = vec![Span::styled(
            "命令: ",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )];
        let cur = app
            .command_input
            .char_indices()
            .nth(app.command_cursor)
            .map(|(i, _)| i)
            .unwrap_or(app.command_input.len());
        let (left, right) = app.command_input.split_at(cur);
        spans.push(Span::raw(left));
        spans.push(Span::styled("_", Style::default().fg(Color::Yellow)));
        spans.push(Span::raw(right));

        // 如果有建议，添加浅灰色幽灵文本
        if let Some(hint) = app.get_completion_hint() {
            spans.push(Span::styled(hint, Style::default().fg(Color::DarkGray)));
        }

        vec![
            Line::from(spans),
            Line::from("Enter执行 Esc取消 Tab补全 ←→光标 Home/End ↑历史 ↓下一条"),
        ]
    } else if let Some((ref prompt, _)) = app.pending_confirm {
        vec![
            Line::from(Span::styled(
                prompt.clone(),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )),
            Line::from("y 确认，其他键取消"),
        ]
    } else if app.view_mode == ViewMode::Login {
        vec![
            Line::from(vec![
                Span::styled("命令: ", Style::default().fg(Color::Yellow)),
                Span::raw("(用户名为空时按 / 进入命令模式)"),
            ]),
            Line::from("Tab切换 Enter登录 /quit退出"),
        ]
    } else {
        vec![
            Line::from(vec![
                Span::styled("命令: ", Style::default().fg(Color::Yellow)),
                Span::raw("(按 / 进入命令模式, /help 查看命令)"),
            ]),
            Line::from(view_hint(app.view_mode)),
        ]
    };
    let command_paragraph = Paragraph::new(command_prompt).block(
        Block::default()
            .borders(Borders::ALL)
            .title(if app.input_mode == InputMode::Command {
                "命令输入模式"
            } else {
                "命令输入"
            })
            .style(if app.input_mode == InputMode::Command {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::White)
            }),
    );
    f.render_widget(command_paragraph, bottom_chunks[0]);

    // 日志区域 - 最新的在顶部，最多 20 条
    let log_items: Vec<ListItem> = app
        .log_messages
        .iter()
        .rev()
        .take(20)
        .map(|msg| {
            let style = if msg.starts_with("✓") {
                Style::default().fg(Color::Green)
            } else if msg.starts_with("✗") {
                Style::default().fg(Color::Red)
            } else if msg.starts_with("⚠") {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(msg.as_str()).style(style)
        })
        .collect();

    let log = List::new(log_items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("日志 (共 {} 条)", app.log_messages.len()))
            .style(Style::default().fg(Color::White)),
    );
    f.render_widget(log, bottom_chunks[1]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bar_scales_to_twenty_cells() {
        assert_eq!(bar(0).chars().filter(|c| *c == '█').count(), 0);
        assert_eq!(bar(50).chars().filter(|c| *c == '█').count(), 10);
        assert_eq!(bar(150).chars().count(), 20);
    }

    #[test]
    fn badge_colors_follow_status_severity() {
        assert_eq!(severity_color(TaskStatus::Failure.severity()), Color::Red);
        assert_eq!(severity_color(TaskStatus::Progress.severity()), Color::Cyan);
        assert_eq!(severity_color(TaskStatus::Cancelled.severity()), Color::Gray);
    }

    #[test]
    fn job_line_colors_by_outcome() {
        let status = |body: &str| -> ImportStatus { serde_json::from_str(body).unwrap() };
        let color = |line: Line<'static>| line.spans[0].style.fg;

        let running = status(r#"{"task_id":"o1","status":"PROGRESS","progress":40,"message":"Processing..."}"#);
        assert_eq!(color(job_line("行情", &running)), Some(Color::Cyan));
        assert!(job_line("行情", &running).spans[0].content.contains("40%"));

        let failed = status(r#"{"task_id":"o1","status":"FAILURE","error":"boom"}"#);
        assert_eq!(color(job_line("行情", &failed)), Some(Color::Red));

        let done = status(r#"{"task_id":"o1","status":"SUCCESS","progress":100}"#);
        assert_eq!(color(job_line("导入", &done)), Some(Color::Green));
    }
}
