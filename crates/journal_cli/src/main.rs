use clap::{CommandFactory, Parser};
use journal_cli::cli::{
    Cli, Command, ConfigOverrideTarget, GoalCommand, ListCommand, LocalCommand, TaskCommand,
    parse_config_override,
};
use journal_core::config::{self, Config, ConfigOverrides};
use journal_core::context::AppContext;
use journal_core::error::AppError;
use journal_core::model::{Goal, NewGoal, Occurrence, Schedule, Task, TaskFields};
use journal_core::remote::file::{FileDocumentStore, store_path};
use journal_core::remote::{LocalAuth, User};
use journal_core::storage::key_value::local_path;
use journal_core::storage::{FileKeyValueStorage, LocalTaskStore};
use journal_core::store::StoreFailure;
use std::io::{self, BufRead};
use std::sync::Arc;
use tabled::{Table, Tabled};
use time::macros::format_description;
use time::{Date, OffsetDateTime, Time, UtcOffset};

const LOG_ENV_VAR: &str = "JOURNAL_LOG";
const USER_ENV_VAR: &str = "JOURNAL_USER";

type Context = AppContext<FileDocumentStore, LocalAuth>;

/// Owns the application context for one process; stores load on first use.
struct Runtime {
    context: Context,
    loaded: bool,
}

impl Runtime {
    fn new(config: &Config) -> Result<Self, AppError> {
        let auth = match config.user_id.as_deref() {
            Some(uid) => LocalAuth::signed_in(User::new(uid)),
            None => LocalAuth::signed_out(),
        };
        let remote = FileDocumentStore::new(store_path(config)?);
        tracing::debug!(
            path = %remote.path().display(),
            endpoint = config.remote.endpoint().as_deref().unwrap_or("-"),
            "using document store"
        );

        Ok(Self {
            context: AppContext::new(Arc::new(remote), Arc::new(auth), config),
            loaded: false,
        })
    }

    async fn context(&mut self) -> Result<&mut Context, AppError> {
        if !self.loaded {
            self.context.init().await;
            check(self.context.tasks.error())?;
            check(self.context.goals.error())?;
            self.loaded = true;
        }
        Ok(&mut self.context)
    }
}

fn check(failure: Option<&StoreFailure>) -> Result<(), AppError> {
    match failure {
        Some(failure) => Err(failure.source.clone()),
        None => Ok(()),
    }
}

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Schedule")]
    schedule: String,
}

#[derive(Tabled)]
struct GoalRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Status")]
    status: &'static str,
    #[tabled(rename = "Deadline")]
    deadline: String,
}

fn status_label(completed: bool) -> &'static str {
    if completed { "completed" } else { "pending" }
}

fn schedule_label(fields: &TaskFields) -> String {
    match &fields.schedule {
        Schedule::Unscheduled => "-".to_string(),
        Schedule::Dates(dates) => dates.join(", "),
        Schedule::Occurrences(occurrences) => occurrences
            .iter()
            .map(|occurrence| {
                let mut label = occurrence.date.clone();
                if let (Some(start), Some(end)) = (&occurrence.start_time, &occurrence.end_time) {
                    label.push_str(&format!(" {start}-{end}"));
                }
                if occurrence.completed {
                    label.push_str(" (done)");
                }
                label
            })
            .chain(fields.carried_dates.iter().cloned())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn task_row(id: String, task: &Task) -> TaskRow {
    TaskRow {
        id,
        title: task.fields.title.clone(),
        kind: task.fields.kind.as_str().to_string(),
        status: status_label(task.fields.completed),
        schedule: schedule_label(&task.fields),
    }
}

fn task_json(task: &Task) -> Result<serde_json::Value, AppError> {
    let mut value = serde_json::to_value(task.to_document())?;
    if let Some(object) = value.as_object_mut() {
        object.insert("id".to_string(), serde_json::json!(task.id));
    }
    Ok(value)
}

fn goal_json(goal: &Goal) -> Result<serde_json::Value, AppError> {
    let mut value = serde_json::to_value(goal.to_document())?;
    if let Some(object) = value.as_object_mut() {
        object.insert("id".to_string(), serde_json::json!(goal.id));
    }
    Ok(value)
}

fn print_task_json(task: &Task) -> Result<(), AppError> {
    println!("{}", task_json(task)?);
    Ok(())
}

fn print_goal_json(goal: &Goal) -> Result<(), AppError> {
    println!("{}", goal_json(goal)?);
    Ok(())
}

fn print_tasks_json(tasks: &[&Task]) -> Result<(), AppError> {
    let mut payload = Vec::with_capacity(tasks.len());
    for task in tasks {
        payload.push(task_json(task)?);
    }
    println!("{}", serde_json::Value::Array(payload));
    Ok(())
}

fn print_tasks_plain(tasks: &[&Task]) {
    if tasks.is_empty() {
        println!("No tasks.");
        return;
    }
    let rows = tasks
        .iter()
        .map(|task| task_row(task.id.clone().unwrap_or_default(), task));
    println!("{}", Table::new(rows));
}

fn print_goals_json(goals: &[Goal]) -> Result<(), AppError> {
    let mut payload = Vec::with_capacity(goals.len());
    for goal in goals {
        payload.push(goal_json(goal)?);
    }
    println!("{}", serde_json::Value::Array(payload));
    Ok(())
}

fn print_goals_plain(goals: &[Goal]) {
    if goals.is_empty() {
        println!("No goals.");
        return;
    }
    let rows = goals.iter().map(|goal| GoalRow {
        id: goal.id.clone(),
        title: goal.fields.title.clone(),
        status: status_label(goal.fields.completed),
        deadline: goal.fields.deadline.clone().unwrap_or_else(|| "-".to_string()),
    });
    println!("{}", Table::new(rows));
}

fn print_local_json(tasks: &[Task]) -> Result<(), AppError> {
    let mut payload = Vec::with_capacity(tasks.len());
    for (index, task) in tasks.iter().enumerate() {
        let mut value = task_json(task)?;
        if let Some(object) = value.as_object_mut() {
            object.remove("id");
            object.insert("index".to_string(), serde_json::json!(index));
        }
        payload.push(value);
    }
    println!("{}", serde_json::Value::Array(payload));
    Ok(())
}

fn print_local_plain(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks.");
        return;
    }
    let rows = tasks
        .iter()
        .enumerate()
        .map(|(index, task)| task_row(format!("#{index}"), task));
    println!("{}", Table::new(rows));
}

fn required_title(title: Option<String>) -> Result<String, AppError> {
    match title {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(AppError::invalid_argument("title is required")),
    }
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

fn parse_date(raw: &str) -> Result<String, AppError> {
    let date = Date::parse(raw.trim(), format_description!("[year]-[month]-[day]")).map_err(
        |_| AppError::invalid_argument(format!("date must be YYYY-MM-DD, got '{}'", raw.trim())),
    )?;
    Ok(date.to_string())
}

fn parse_clock(raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim();
    Time::parse(trimmed, format_description!("[hour]:[minute]")).map_err(|_| {
        AppError::invalid_argument(format!("time must be HH:MM, got '{trimmed}'"))
    })?;
    Ok(trimmed.to_string())
}

fn parse_slot(raw: &str) -> Result<Occurrence, AppError> {
    let parts: Vec<&str> = raw.split(',').collect();
    match parts.as_slice() {
        [date] => Ok(Occurrence::on(&parse_date(date)?)),
        [date, start, end] => Ok(Occurrence::with_times(
            &parse_date(date)?,
            &parse_clock(start)?,
            &parse_clock(end)?,
        )),
        _ => Err(AppError::invalid_argument(format!(
            "slot must be DATE or DATE,START,END, got '{raw}'"
        ))),
    }
}

fn build_schedule(dates: &[String], slots: &[String]) -> Result<Schedule, AppError> {
    if !dates.is_empty() && !slots.is_empty() {
        return Err(AppError::invalid_argument(
            "use either --date or --slot, not both",
        ));
    }

    if !slots.is_empty() {
        let occurrences = slots
            .iter()
            .map(|raw| parse_slot(raw))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Schedule::Occurrences(occurrences));
    }

    if !dates.is_empty() {
        let dates = dates
            .iter()
            .map(|raw| parse_date(raw))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Schedule::Dates(dates));
    }

    Ok(Schedule::Unscheduled)
}

fn today() -> String {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetDateTime::now_utc().to_offset(offset).date().to_string()
}

fn find_task<'a>(context: &'a Context, id: &str) -> Result<&'a Task, AppError> {
    context
        .tasks
        .task(id)
        .ok_or_else(|| AppError::not_found(format!("task {} not found", id.trim())))
}

fn find_goal<'a>(context: &'a Context, id: &str) -> Result<&'a Goal, AppError> {
    context
        .goals
        .goal(id)
        .ok_or_else(|| AppError::not_found(format!("goal {} not found", id.trim())))
}

fn resolve_config(raw_overrides: &[String], user: Option<&str>) -> Result<Config, AppError> {
    let loaded = config::load_config_with_fallback();
    if let Some(err) = &loaded.error {
        tracing::warn!(error = %err, "falling back to default configuration");
    }

    let mut overrides = ConfigOverrides::default();
    for raw in raw_overrides {
        let parsed = parse_config_override(raw).map_err(AppError::invalid_argument)?;
        match parsed.target {
            ConfigOverrideTarget::SessionTimeout => {
                let millis = parsed.value.parse::<u64>().map_err(|_| {
                    AppError::invalid_argument(format!(
                        "session timeout must be milliseconds, got '{}'",
                        parsed.value
                    ))
                })?;
                overrides.session_timeout_ms = Some(millis);
            }
            ConfigOverrideTarget::UserId => overrides.user_id = Some(parsed.value),
            ConfigOverrideTarget::Remote(field) => {
                overrides.remote.insert(field, parsed.value);
            }
        }
    }

    if let Some(user) = user {
        overrides.user_id = Some(user.to_string());
    }

    config::merge_overrides(&loaded.config, &overrides)
}

async fn run_task(runtime: &mut Runtime, command: TaskCommand, json: bool) -> Result<(), AppError> {
    match command {
        TaskCommand::Add {
            title,
            description,
            kind,
            dates,
            slots,
        } => {
            let fields = TaskFields {
                title: required_title(title)?,
                description: optional_text(description),
                kind: kind.into(),
                schedule: build_schedule(&dates, &slots)?,
                ..TaskFields::default()
            };

            let context = runtime.context().await?;
            let id = context.tasks.add_task(fields).await;
            check(context.tasks.error())?;
            let id = id.ok_or_else(|| AppError::remote("task was not stored"))?;

            let task = find_task(context, &id)?;
            if json {
                print_task_json(task)?;
            } else {
                println!("Added task: {} ({})", task.fields.title, id);
            }
        }
        TaskCommand::List { list } => {
            let context = runtime.context().await?;
            let tasks: Vec<&Task> = match list {
                ListCommand::Today => context.tasks.tasks_on(&today()),
                ListCommand::On { date } => context.tasks.tasks_on(&parse_date(&date)?),
                ListCommand::Unplanned => context
                    .tasks
                    .tasks()
                    .iter()
                    .filter(|task| task.fields.plain_dates().is_empty())
                    .collect(),
                ListCommand::All => context.tasks.tasks().iter().collect(),
            };

            if json {
                print_tasks_json(&tasks)?;
            } else {
                print_tasks_plain(&tasks);
            }
        }
        TaskCommand::Show { id } => {
            let context = runtime.context().await?;
            let task = find_task(context, &id)?;
            if json {
                print_task_json(task)?;
            } else {
                println!("ID: {}", task.id.as_deref().unwrap_or("-"));
                println!("Title: {}", task.fields.title);
                println!(
                    "Description: {}",
                    task.fields.description.as_deref().unwrap_or("-")
                );
                println!("Kind: {}", task.fields.kind.as_str());
                println!("Status: {}", status_label(task.fields.completed));
                println!("Schedule: {}", schedule_label(&task.fields));
            }
        }
        TaskCommand::Edit { id, new_title } => {
            let title = required_title(Some(new_title))?;
            let context = runtime.context().await?;
            let mut fields = find_task(context, &id)?.fields.clone();
            fields.title = title;

            context.tasks.update_task(&id, fields).await;
            check(context.tasks.error())?;

            let task = find_task(context, &id)?;
            if json {
                print_task_json(task)?;
            } else {
                println!("Updated task: {} ({})", task.fields.title, id.trim());
            }
        }
        TaskCommand::Done { id } => {
            let context = runtime.context().await?;
            if find_task(context, &id)?.fields.completed {
                return Err(AppError::invalid_argument("task already completed"));
            }

            context.tasks.toggle_task_completion(&id).await;
            check(context.tasks.error())?;

            let task = find_task(context, &id)?;
            if json {
                print_task_json(task)?;
            } else {
                println!("Completed task: {} ({})", task.fields.title, id.trim());
            }
        }
        TaskCommand::Delete { id } => {
            let context = runtime.context().await?;
            let task = find_task(context, &id)?.clone();

            context.tasks.delete_task(&id).await;
            check(context.tasks.error())?;

            if json {
                print_task_json(&task)?;
            } else {
                println!("Deleted task: {} ({})", task.fields.title, id.trim());
            }
        }
        TaskCommand::ToggleInstance { id, date } => {
            let date = parse_date(&date)?;
            let context = runtime.context().await?;
            let mut schedule = find_task(context, &id)?.fields.schedule.clone();
            if !schedule.toggle_instance(&date) {
                return Err(AppError::invalid_argument(format!(
                    "task {} has no time slot on {date}",
                    id.trim()
                )));
            }

            context.tasks.toggle_task_instance_completion(&id, &date).await;
            check(context.tasks.error())?;

            let task = find_task(context, &id)?;
            if json {
                print_task_json(task)?;
            } else {
                println!(
                    "Toggled {date} for task: {} ({})",
                    task.fields.title,
                    id.trim()
                );
            }
        }
        TaskCommand::DeleteInstance { id, date } => {
            let date = parse_date(&date)?;
            let context = runtime.context().await?;
            let title = find_task(context, &id)?.fields.title.clone();

            context.tasks.delete_task_instance(&id, &date).await?;
            check(context.tasks.error())?;

            match context.tasks.task(&id) {
                Some(task) if json => print_task_json(task)?,
                Some(task) => println!(
                    "Removed {date} from task: {} ({})",
                    task.fields.title,
                    id.trim()
                ),
                None if json => println!(
                    "{}",
                    serde_json::json!({ "id": id.trim(), "title": title, "deleted": true })
                ),
                None => println!("Deleted task: {} ({})", title, id.trim()),
            }
        }
    }

    Ok(())
}

async fn run_goal(runtime: &mut Runtime, command: GoalCommand, json: bool) -> Result<(), AppError> {
    match command {
        GoalCommand::Add {
            title,
            description,
            deadline,
        } => {
            let goal = NewGoal {
                title: required_title(title)?,
                description: optional_text(description),
                deadline: optional_text(deadline)
                    .map(|raw| parse_date(&raw))
                    .transpose()?,
            };

            let context = runtime.context().await?;
            let id = context.goals.add_goal(goal).await;
            check(context.goals.error())?;
            let id = id.ok_or_else(|| AppError::remote("goal was not stored"))?;

            let goal = find_goal(context, &id)?;
            if json {
                print_goal_json(goal)?;
            } else {
                println!("Added goal: {} ({})", goal.fields.title, id);
            }
        }
        GoalCommand::List => {
            let context = runtime.context().await?;
            if json {
                print_goals_json(context.goals.goals())?;
            } else {
                print_goals_plain(context.goals.goals());
            }
        }
        GoalCommand::Edit {
            id,
            new_title,
            deadline,
        } => {
            let title = required_title(Some(new_title))?;
            let deadline = optional_text(deadline)
                .map(|raw| parse_date(&raw))
                .transpose()?;

            let context = runtime.context().await?;
            let mut fields = find_goal(context, &id)?.fields.clone();
            fields.title = title;
            if deadline.is_some() {
                fields.deadline = deadline;
            }

            context.goals.update_goal(&id, fields).await;
            check(context.goals.error())?;

            let goal = find_goal(context, &id)?;
            if json {
                print_goal_json(goal)?;
            } else {
                println!("Updated goal: {} ({})", goal.fields.title, id.trim());
            }
        }
        GoalCommand::Done { id } => {
            let context = runtime.context().await?;
            if find_goal(context, &id)?.fields.completed {
                return Err(AppError::invalid_argument("goal already completed"));
            }

            context.goals.toggle_goal_completion(&id).await;
            check(context.goals.error())?;

            let goal = find_goal(context, &id)?;
            if json {
                print_goal_json(goal)?;
            } else {
                println!("Completed goal: {} ({})", goal.fields.title, id.trim());
            }
        }
        GoalCommand::Delete { id } => {
            let context = runtime.context().await?;
            let goal = find_goal(context, &id)?.clone();

            context.goals.delete_goal(&id).await;
            check(context.goals.error())?;

            if json {
                print_goal_json(&goal)?;
            } else {
                println!("Deleted goal: {} ({})", goal.fields.title, id.trim());
            }
        }
    }

    Ok(())
}

fn run_local(command: LocalCommand, json: bool) -> Result<(), AppError> {
    let mut store = LocalTaskStore::new(FileKeyValueStorage::new(local_path()?));
    store.load_tasks()?;

    match command {
        LocalCommand::Add { title, dates } => {
            let fields = TaskFields {
                title: required_title(title)?,
                schedule: build_schedule(&dates, &[])?,
                ..TaskFields::default()
            };
            let index = store.add_task(fields)?;
            let task = &store.tasks()[index];
            if json {
                print_task_json(task)?;
            } else {
                println!("Added local task: {} (#{index})", task.fields.title);
            }
        }
        LocalCommand::List => {
            if json {
                print_local_json(store.tasks())?;
            } else {
                print_local_plain(store.tasks());
            }
        }
        LocalCommand::Done { index } => {
            store.toggle_task_completion(index)?;
            let task = &store.tasks()[index];
            if json {
                print_task_json(task)?;
            } else {
                println!(
                    "Marked local task {}: {} (#{index})",
                    status_label(task.fields.completed),
                    task.fields.title
                );
            }
        }
        LocalCommand::Delete { index } => {
            let task = store.delete_task(index)?;
            if json {
                print_task_json(&task)?;
            } else {
                println!("Deleted local task: {} (#{index})", task.fields.title);
            }
        }
    }

    Ok(())
}

async fn run_command(runtime: &mut Runtime, command: Command, json: bool) -> Result<(), AppError> {
    match command {
        Command::Task { task } => run_task(runtime, task, json).await,
        Command::Goal { goal } => run_goal(runtime, goal, json).await,
        Command::Local { local } => run_local(local, json),
        Command::Summary => {
            let summary = runtime.context().await?.summary();
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "unplanned_tasks": summary.unplanned_tasks,
                        "active_goals": summary.active_goals,
                    })
                );
            } else {
                println!("Unplanned tasks: {}", summary.unplanned_tasks);
                println!("Active goals: {}", summary.active_goals);
            }
            Ok(())
        }
    }
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_argument(message)
}

fn split_command_line(line: &str) -> Result<Vec<String>, AppError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escape = false;

    for ch in line.chars() {
        if escape {
            if ch != '"' && ch != '\\' {
                current.push('\\');
            }
            current.push(ch);
            escape = false;
            continue;
        }

        if in_quotes && ch == '\\' {
            escape = true;
            continue;
        }

        if ch == '"' {
            in_quotes = !in_quotes;
            continue;
        }

        if ch.is_whitespace() && !in_quotes {
            if !current.is_empty() {
                args.push(std::mem::take(&mut current));
            }
            continue;
        }

        current.push(ch);
    }

    if in_quotes {
        return Err(AppError::invalid_argument("unterminated quote in command"));
    }

    if !current.is_empty() {
        args.push(current);
    }

    Ok(args)
}

fn print_help() {
    let mut cmd = Cli::command();
    let help = cmd.render_help();
    println!("{help}");
}

/// Reads commands from stdin against one shared context, so stores load once
/// per session. Identity and overrides come from the environment and config.
async fn run_interactive() -> Result<(), AppError> {
    let user = std::env::var(USER_ENV_VAR).ok();
    let config = resolve_config(&[], user.as_deref())?;
    let mut runtime = Runtime::new(&config)?;

    let mut input = String::new();
    let stdin = io::stdin();
    let mut stdin_lock = stdin.lock();

    loop {
        input.clear();
        let bytes = stdin_lock
            .read_line(&mut input)
            .map_err(|err| AppError::io(err.to_string()))?;

        if bytes == 0 {
            break;
        }

        let line = input.trim();
        if line.is_empty() {
            continue;
        }

        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        if line == "help" || line == "?" {
            print_help();
            continue;
        }

        let args = match split_command_line(line) {
            Ok(args) => args,
            Err(err) => {
                eprintln!("ERROR: {}", err);
                continue;
            }
        };

        if args.is_empty() {
            continue;
        }

        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push("journal".to_string());
        argv.extend(args);

        let cli = match Cli::try_parse_from(argv) {
            Ok(cli) => cli,
            Err(err) => {
                eprintln!("ERROR: {}", normalize_parse_error(err));
                continue;
            }
        };

        if !cli.config_override.is_empty() {
            tracing::warn!("config overrides are ignored in interactive mode");
        }

        if let Err(err) = run_command(&mut runtime, cli.command, cli.json).await {
            eprintln!("ERROR: {}", err);
        }
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

async fn run_once(cli: Cli) -> Result<(), AppError> {
    let config = resolve_config(&cli.config_override, cli.user.as_deref())?;
    let mut runtime = Runtime::new(&config)?;
    run_command(&mut runtime, cli.command, cli.json).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();

    let mut args = std::env::args_os();
    args.next();
    if args.next().is_none() {
        if let Err(err) = run_interactive().await {
            eprintln!("ERROR: {}", err);
            std::process::exit(1);
        }
        return;
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    if let Err(err) = run_once(cli).await {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
