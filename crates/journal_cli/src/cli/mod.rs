use clap::{Parser, Subcommand, ValueEnum};
use journal_core::model::TaskKind;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,

    /// Sign in as this user id
    #[arg(long, global = true, env = "JOURNAL_USER")]
    pub user: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage tasks
    Task {
        #[command(subcommand)]
        task: TaskCommand,
    },
    /// Manage goals
    Goal {
        #[command(subcommand)]
        goal: GoalCommand,
    },
    /// Manage the offline-only task list
    Local {
        #[command(subcommand)]
        local: LocalCommand,
    },
    /// Show unplanned task and active goal counts
    ///
    /// Example: journal summary
    Summary,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Add a new task
    ///
    /// Example: journal task add "Buy milk"
    /// Example: journal task add "Review" --kind dated --date 2024-01-05
    /// Example: journal task add "Swim" --kind recurring --slot 2024-01-01,07:00,08:00
    Add {
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_enum, default_value_t = KindArg::Single)]
        kind: KindArg,
        #[arg(long = "date", value_name = "DATE")]
        dates: Vec<String>,
        #[arg(long = "slot", value_name = "DATE[,START,END]")]
        slots: Vec<String>,
    },
    /// List tasks
    ///
    /// Example: journal task list today
    /// Example: journal task list on 2024-01-05
    List {
        #[command(subcommand)]
        list: ListCommand,
    },
    /// Show details of a task
    ///
    /// Example: journal task show doc-1
    Show { id: String },
    /// Edit a task's title
    ///
    /// Example: journal task edit doc-1 "Buy oat milk"
    Edit { id: String, new_title: String },
    /// Mark a task as completed
    ///
    /// Example: journal task done doc-1
    Done { id: String },
    /// Delete a task
    ///
    /// Example: journal task delete doc-1
    Delete { id: String },
    /// Flip completion of one scheduled occurrence
    ///
    /// Example: journal task toggle-instance doc-1 2024-01-01
    ToggleInstance { id: String, date: String },
    /// Remove one occurrence; the task is deleted with its last one
    ///
    /// Example: journal task delete-instance doc-1 2024-01-01
    DeleteInstance { id: String, date: String },
}

#[derive(Subcommand, Debug)]
pub enum ListCommand {
    /// Tasks scheduled for today
    Today,
    /// Tasks on a given date
    On { date: String },
    /// Tasks without plain dates
    Unplanned,
    /// Every task
    All,
}

#[derive(Subcommand, Debug)]
pub enum GoalCommand {
    /// Add a new goal
    ///
    /// Example: journal goal add "Run a marathon" --deadline 2024-10-01
    Add {
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        deadline: Option<String>,
    },
    /// List goals
    List,
    /// Edit a goal's title and deadline
    ///
    /// Example: journal goal edit doc-3 "Run a half marathon" --deadline 2024-06-01
    Edit {
        id: String,
        new_title: String,
        #[arg(long)]
        deadline: Option<String>,
    },
    /// Mark a goal as completed
    Done { id: String },
    /// Delete a goal
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum LocalCommand {
    /// Add a task to the offline list
    Add {
        title: Option<String>,
        #[arg(long = "date", value_name = "DATE")]
        dates: Vec<String>,
    },
    /// List the offline tasks with their positions
    List,
    /// Flip completion of the task at a position
    Done { index: usize },
    /// Delete the task at a position
    Delete { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Single,
    Recurring,
    Dated,
}

impl From<KindArg> for TaskKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Single => TaskKind::Single,
            KindArg::Recurring => TaskKind::Recurring,
            KindArg::Dated => TaskKind::Dated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    SessionTimeout,
    UserId,
    Remote(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let value = value_raw.trim().to_string();
    let (field, remainder) = key_raw
        .split_once('.')
        .map(|(field, rest)| (field.trim(), Some(rest.trim())))
        .unwrap_or((key_raw.trim(), None));

    let canonical_field =
        canonicalize_flag_name(field).ok_or_else(|| "override key cannot be empty".to_string())?;

    match canonical_field.as_str() {
        "session_timeout_ms" | "session_timeout" | "timeout" => {
            if remainder.is_some() {
                Err("session timeout override cannot have subfields".to_string())
            } else {
                Ok(ParsedConfigOverride {
                    target: ConfigOverrideTarget::SessionTimeout,
                    value,
                })
            }
        }
        "user_id" | "user" => {
            if remainder.is_some() {
                Err("user override cannot have subfields".to_string())
            } else {
                Ok(ParsedConfigOverride {
                    target: ConfigOverrideTarget::UserId,
                    value,
                })
            }
        }
        "remote" => {
            let remote_field = remainder
                .and_then(canonicalize_flag_name)
                .ok_or_else(|| "remote override requires a field name".to_string())?;
            Ok(ParsedConfigOverride {
                target: ConfigOverrideTarget::Remote(remote_field),
                value,
            })
        }
        other => Err(format!("unknown config field '{other}'")),
    }
}

fn canonicalize_flag_name(name: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
