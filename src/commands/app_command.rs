use crate::ohlcv::OhlcvJob;
use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMove {
    Next,
    Prev,
    To(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Login {
        username: String,
        password: String,
    },
    Logout,
    Tasks,
    TaskFilter(Vec<(String, String)>),
    TaskFilterClear,
    TaskPage(PageMove),
    TaskLimit(u64),
    OpenTask {
        id: String,
    },
    CloseTask,
    Retry {
        id: String,
        reason: Option<String>,
    },
    Cancel {
        id: String,
        reason: Option<String>,
    },
    Delete {
        id: String,
        force: bool,
    },
    Logs {
        level: Option<String>,
    },
    Steps,
    Stats,
    Securities,
    SecurityFilter(Vec<(String, String)>),
    SecurityFilterClear,
    SecurityPage(PageMove),
    SecurityLimit(u64),
    SecurityStats,
    Exchanges {
        active_only: bool,
    },
    ImportStart,
    ImportStatus {
        task_id: Option<String>,
    },
    ImportCancel {
        task_id: Option<String>,
    },
    OhlcvStart(OhlcvJob),
    OhlcvStatus {
        task_id: Option<String>,
    },
    OhlcvCancel {
        task_id: Option<String>,
    },
    /// 修改轮询间隔（秒），0 表示关闭
    PollInterval(u64),
    Poll,
    Help,
    Quit,
    Unknown(String),
}

pub const HELP_TEXT: &str = "可用命令: login <user> <password> | logout | tasks | filter k=v ... | filter clear | page next|prev|<n> | limit <n> | open <id> | close | retry <id> [reason] | cancel <id> [reason] | delete <id> [--force] | logs [level|all] | steps | stats | securities | sfilter k=v ... | sfilter clear | spage next|prev|<n> | slimit <n> | sstats | exchanges [all] | import | import status [id] | import cancel [id] | ohlcv daily | ohlcv historical [from=YYYY-MM-DD] [to=YYYY-MM-DD] [batch=n] | ohlcv weekly [weeks=n] | ohlcv status [id] | ohlcv cancel [id] | poll <interval|off> | help | quit";

fn pair_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([A-Za-z_]+)=(?:"([^"]*)"|(\S*))"#).expect("filter pair pattern")
    })
}

/// `status=FAILURE name="daily import"` -> [(status, FAILURE), (name, daily import)]
///
/// 夹在键值对之间的其他文本会被拒绝，不做静默丢弃。
pub fn parse_pairs(args: &str) -> Result<Vec<(String, String)>, String> {
    let mut pairs = Vec::new();
    let mut last = 0;
    for cap in pair_regex().captures_iter(args) {
        let Some(whole) = cap.get(0) else { continue };
        let stray = args[last..whole.start()].trim();
        if !stray.is_empty() {
            return Err(format!("无法解析的参数 `{}`，需要 key=value 形式", stray));
        }
        last = whole.end();
        let value = cap
            .get(2)
            .or_else(|| cap.get(3))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        pairs.push((cap[1].to_string(), value));
    }
    let stray = args[last..].trim();
    if !stray.is_empty() && !pairs.is_empty() {
        return Err(format!("无法解析的参数 `{}`，需要 key=value 形式", stray));
    }
    if pairs.is_empty() {
        return Err(format!("需要 key=value 形式的参数: {}", args.trim()));
    }
    Ok(pairs)
}

fn parse_page_move(arg: Option<&&str>) -> Option<PageMove> {
    match arg.copied() {
        Some("next") | Some("n") | None => Some(PageMove::Next),
        Some("prev") | Some("p") => Some(PageMove::Prev),
        Some(n) => n.parse::<u64>().ok().filter(|n| *n > 0).map(PageMove::To),
    }
}

fn parse_limit(arg: Option<&&str>) -> Option<u64> {
    arg.and_then(|s| s.parse::<u64>().ok())
        .filter(|n| (1..=1000).contains(n))
}

fn rest_text(parts: &[&str], from: usize) -> Option<String> {
    let text = parts.get(from..).map(|p| p.join(" ")).unwrap_or_default();
    (!text.trim().is_empty()).then_some(text)
}

impl FromStr for AppCommand {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        if parts.is_empty() {
            return Ok(AppCommand::Unknown("".to_string()));
        }
        let args = trimmed[parts[0].len()..].trim();

        match parts[0] {
            "login" => match (parts.get(1), parts.get(2)) {
                (Some(u), Some(_)) => Ok(AppCommand::Login {
                    username: u.to_string(),
                    password: parts[2..].join(" "),
                }),
                _ => Ok(AppCommand::Unknown("用法: login <user> <password>".to_string())),
            },
            "logout" => Ok(AppCommand::Logout),
            "tasks" | "t" => Ok(AppCommand::Tasks),
            "filter" => match parts.get(1) {
                Some(&"clear") | Some(&"--clear") => Ok(AppCommand::TaskFilterClear),
                None => Ok(AppCommand::Unknown("用法: filter k=v ... | filter clear".to_string())),
                Some(_) => Ok(parse_pairs(args)
                    .map(AppCommand::TaskFilter)
                    .unwrap_or_else(AppCommand::Unknown)),
            },
            "page" => Ok(parse_page_move(parts.get(1))
                .map(AppCommand::TaskPage)
                .unwrap_or_else(|| AppCommand::Unknown("用法: page next|prev|<n>".to_string()))),
            "limit" => Ok(parse_limit(parts.get(1))
                .map(AppCommand::TaskLimit)
                .unwrap_or_else(|| AppCommand::Unknown("用法: limit <1-1000>".to_string()))),
            "open" => match parts.get(1) {
                Some(id) => Ok(AppCommand::OpenTask { id: id.to_string() }),
                None => Ok(AppCommand::Unknown("用法: open <task_id>".to_string())),
            },
            "close" => Ok(AppCommand::CloseTask),
            "retry" => match parts.get(1) {
                Some(id) => Ok(AppCommand::Retry {
                    id: id.to_string(),
                    reason: rest_text(&parts, 2),
                }),
                None => Ok(AppCommand::Unknown("用法: retry <task_id> [reason]".to_string())),
            },
            "cancel" => match parts.get(1) {
                Some(id) => Ok(AppCommand::Cancel {
                    id: id.to_string(),
                    reason: rest_text(&parts, 2),
                }),
                None => Ok(AppCommand::Unknown("用法: cancel <task_id> [reason]".to_string())),
            },
            "delete" | "rm" => {
                let force = parts[1..].iter().any(|p| *p == "--force" || *p == "-f");
                match parts[1..].iter().find(|p| !p.starts_with('-')) {
                    Some(id) => Ok(AppCommand::Delete {
                        id: id.to_string(),
                        force,
                    }),
                    None => Ok(AppCommand::Unknown("用法: delete <task_id> [--force]".to_string())),
                }
            }
            "logs" => {
                let level = parts
                    .get(1)
                    .filter(|l| !l.eq_ignore_ascii_case("all"))
                    .map(|l| l.to_ascii_uppercase());
                Ok(AppCommand::Logs { level })
            }
            "steps" => Ok(AppCommand::Steps),
            "stats" => Ok(AppCommand::Stats),
            "securities" | "sec" => Ok(AppCommand::Securities),
            "sfilter" => match parts.get(1) {
                Some(&"clear") | Some(&"--clear") => Ok(AppCommand::SecurityFilterClear),
                None => Ok(AppCommand::Unknown("用法: sfilter k=v ... | sfilter clear".to_string())),
                Some(_) => Ok(parse_pairs(args)
                    .map(AppCommand::SecurityFilter)
                    .unwrap_or_else(AppCommand::Unknown)),
            },
            "spage" => Ok(parse_page_move(parts.get(1))
                .map(AppCommand::SecurityPage)
                .unwrap_or_else(|| AppCommand::Unknown("用法: spage next|prev|<n>".to_string()))),
            "slimit" => Ok(parse_limit(parts.get(1))
                .map(AppCommand::SecurityLimit)
                .unwrap_or_else(|| AppCommand::Unknown("用法: slimit <1-1000>".to_string()))),
            "sstats" => Ok(AppCommand::SecurityStats),
            "exchanges" => Ok(AppCommand::Exchanges {
                active_only: parts.get(1) != Some(&"all"),
            }),
            "import" => match parts.get(1) {
                None | Some(&"start") => Ok(AppCommand::ImportStart),
                Some(&"status") => Ok(AppCommand::ImportStatus {
                    task_id: parts.get(2).map(|s| s.to_string()),
                }),
                Some(&"cancel") => Ok(AppCommand::ImportCancel {
                    task_id: parts.get(2).map(|s| s.to_string()),
                }),
                Some(other) => Ok(AppCommand::Unknown(format!("未知的 import 子命令: {}", other))),
            },
            "ohlcv" => match parts.get(1) {
                None => Ok(AppCommand::Unknown(
                    "用法: ohlcv daily|historical [from=..] [to=..] [batch=..]|weekly [weeks=..]|status [id]|cancel [id]"
                        .to_string(),
                )),
                Some(&"status") => Ok(AppCommand::OhlcvStatus {
                    task_id: parts.get(2).map(|s| s.to_string()),
                }),
                Some(&"cancel") => Ok(AppCommand::OhlcvCancel {
                    task_id: parts.get(2).map(|s| s.to_string()),
                }),
                Some(kind) => {
                    let rest = args[kind.len()..].trim();
                    let pairs = if rest.is_empty() { Ok(Vec::new()) } else { parse_pairs(rest) };
                    Ok(pairs
                        .and_then(|p| OhlcvJob::parse(kind, &p))
                        .map(AppCommand::OhlcvStart)
                        .unwrap_or_else(AppCommand::Unknown))
                }
            },
            "poll" => match parts.get(1) {
                Some(&"off") => Ok(AppCommand::PollInterval(0)),
                Some(raw) => Ok(parse_interval_seconds(raw)
                    .map(AppCommand::PollInterval)
                    .unwrap_or_else(|| AppCommand::Unknown(format!("无效的轮询间隔: {}", raw)))),
                None => Ok(AppCommand::Poll),
            },
            "help" | "h" => Ok(AppCommand::Help),
            "quit" | "q" | "exit" => Ok(AppCommand::Quit),
            _ => Ok(AppCommand::Unknown(format!("未知命令: {}", parts[0]))),
        }
    }
}

fn parse_interval_seconds(s: &str) -> Option<u64> {
    let raw = s.trim();
    if raw.is_empty() {
        return None;
    }
    let t = raw.to_ascii_lowercase();
    if let Ok(v) = t.parse::<u64>() {
        return Some(v);
    }

    let parse_num = |x: &str| x.trim().parse::<u64>().ok();

    for (suffix, mul) in [
        ("secs", 1u64),
        ("sec", 1u64),
        ("s", 1u64),
        ("mins", 60u64),
        ("min", 60u64),
        ("m", 60u64),
    ] {
        if let Some(prefix) = t.strip_suffix(suffix) {
            if let Some(v) = parse_num(prefix) {
                return v.checked_mul(mul);
            }
        }
    }

    None
}
