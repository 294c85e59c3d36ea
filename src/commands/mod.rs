pub mod app_command;

pub use app_command::{AppCommand, PageMove, HELP_TEXT};
