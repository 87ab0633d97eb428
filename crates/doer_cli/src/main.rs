//! Command-line front end over `doer_core`.
//!
//! # Responsibility
//! - Open the Data Store and wire repositories and the ordering service.
//! - Expose inbox ordering commands and a reproducible ordering walkthrough.
//!
//! # Invariants
//! - Logging starts only when `--log-dir` is given.
//! - `demo` never touches the `--db` file.
//! - Every command re-reads stored positions before printing.

use clap::{Parser, Subcommand};
use doer_core::db::{open_db, open_db_in_memory};
use doer_core::{
    core_version, default_log_level, init_logging, ping, position_between, MoveTarget, NewTask,
    OrderingScope, OrderingService, ProjectRepository, RebalancePolicy, SqliteOrderingRepository,
    SqliteProjectRepository, SqliteTaskRepository, TaskRepository,
};
use log::info;
use rusqlite::Connection;
use std::error::Error;
use std::path::PathBuf;
use uuid::Uuid;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser, Debug)]
#[command(name = "doer", version, about = "Ordered to-do lists backed by SQLite")]
struct Cli {
    /// SQLite file; an in-memory store is used when omitted
    #[arg(long)]
    db: Option<PathBuf>,

    /// trace|debug|info|warn|error; needs --log-dir
    #[arg(long, requires = "log_dir")]
    log_level: Option<String>,

    /// Absolute directory for rolling log files
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Owner of the inbox the commands operate on
    #[arg(long, default_value_t = Uuid::nil())]
    user: Uuid,

    /// Only rebalance when `rebalance` is run explicitly
    #[arg(long)]
    manual_rebalance: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print core linkage check and version
    Ping,
    /// Append a task to the inbox
    Add {
        title: String,
    },
    /// List inbox tasks in order
    List,
    /// Move an inbox task to start, end or a slot index
    Move {
        id: Uuid,
        #[arg(long, value_parser = parse_target)]
        to: MoveTarget,
    },
    /// Reassign evenly spaced positions to the inbox
    Rebalance,
    /// Walk through append, insert-between, degeneration and rebalance
    /// on a throwaway in-memory store
    Demo,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> CliResult<()> {
    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, &log_dir.to_string_lossy())?;
    }

    if let Commands::Ping = cli.command {
        println!("doer_core ping={}", ping());
        println!("doer_core version={}", core_version());
        return Ok(());
    }

    let policy = if cli.manual_rebalance {
        RebalancePolicy::Manual
    } else {
        RebalancePolicy::AfterMutation
    };
    info!(
        "event=cli_command module=cli status=start command={:?} policy={:?}",
        cli.command, policy
    );

    let conn = match (&cli.command, &cli.db) {
        (Commands::Demo, _) | (_, None) => open_db_in_memory()?,
        (_, Some(path)) => open_db(path)?,
    };
    let inbox = SqliteProjectRepository::try_new(&conn)?.get_or_create_inbox(cli.user)?;
    let scope = OrderingScope::tasks(inbox.id, None);
    let service =
        OrderingService::new(SqliteOrderingRepository::try_new(&conn)?).with_policy(policy);

    match cli.command {
        Commands::Ping => {}
        Commands::Add { title } => {
            let task = SqliteTaskRepository::try_new(&conn)?
                .create_task(&NewTask::new(inbox.id, title))?;
            println!("{} position={}", task.id, task.position);
        }
        Commands::List => print_scope(&conn, &scope)?,
        Commands::Move { id, to } => {
            let outcome = service.move_item(&scope, id, to)?;
            println!(
                "{id} position={} rebalanced={}",
                outcome.position, outcome.rebalanced
            );
        }
        Commands::Rebalance => {
            let updates = service.rebalance_scope(&scope)?;
            println!("rebalanced {} tasks", updates.len());
        }
        Commands::Demo => run_demo(&conn, inbox.id, &service)?,
    }
    Ok(())
}

fn run_demo(
    conn: &Connection,
    project_id: Uuid,
    service: &OrderingService<SqliteOrderingRepository<'_>>,
) -> CliResult<()> {
    let tasks = SqliteTaskRepository::try_new(conn)?;
    let scope = OrderingScope::tasks(project_id, None);

    let a = tasks.create_task(&NewTask::new(project_id, "A"))?;
    let b = tasks.create_task(&NewTask::new(project_id, "B"))?;
    let c = tasks.create_task(&NewTask::new(project_id, "C"))?;
    println!(
        "between A and B -> {}",
        position_between(Some(a.position), Some(b.position))
    );
    service.move_item(
        &scope,
        c.id,
        MoveTarget::Between {
            before: Some(a.id),
            after: Some(b.id),
        },
    )?;
    print_scope(conn, &scope)?;

    // Keep pushing the current last task to the top until the scope degenerates.
    let mut moves = 0;
    loop {
        let Some(last) = service.list_positions(&scope)?.last().copied() else {
            break;
        };
        let outcome = service.move_item(&scope, last.id, MoveTarget::Start)?;
        moves += 1;
        if outcome.rebalanced || service.needs_rebalance(&scope)? {
            println!(
                "degenerate after {moves} top inserts (rebalanced={})",
                outcome.rebalanced
            );
            break;
        }
    }
    if service.needs_rebalance(&scope)? {
        service.rebalance_scope(&scope)?;
    }
    print_scope(conn, &scope)
}

fn print_scope(conn: &Connection, scope: &OrderingScope) -> CliResult<()> {
    let tasks = SqliteTaskRepository::try_new(conn)?.list_tasks(scope, true)?;
    for task in &tasks {
        let mark = if task.is_completed { "x" } else { " " };
        println!("[{mark}] {:>12} {} {}", task.position, task.title, task.id);
    }
    Ok(())
}

fn parse_target(value: &str) -> Result<MoveTarget, String> {
    match value {
        "start" => Ok(MoveTarget::Start),
        "end" => Ok(MoveTarget::End),
        other => other
            .parse::<usize>()
            .map(MoveTarget::Index)
            .map_err(|_| format!("expected start, end or an index, got `{other}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_target, run, Cli};
    use clap::Parser;
    use doer_core::MoveTarget;

    #[test]
    fn parse_target_accepts_keywords_and_indexes() {
        assert_eq!(parse_target("start"), Ok(MoveTarget::Start));
        assert_eq!(parse_target("end"), Ok(MoveTarget::End));
        assert_eq!(parse_target("3"), Ok(MoveTarget::Index(3)));
        assert!(parse_target("top").is_err());
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::try_parse_from(["doer", "--manual-rebalance", "--db", "/tmp/doer.db", "list"])
            .unwrap();
        assert!(cli.manual_rebalance);
        assert_eq!(cli.db.unwrap().to_str(), Some("/tmp/doer.db"));
    }

    #[test]
    fn log_level_without_log_dir_is_rejected() {
        let err = Cli::try_parse_from(["doer", "--log-level", "debug", "list"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let cli = Cli::try_parse_from([
            "doer",
            "--log-level",
            "debug",
            "--log-dir",
            "/tmp/doer-logs",
            "list",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn demo_leaves_db_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("real.db");
        let path_arg = path.to_str().unwrap();

        let cli = Cli::try_parse_from(["doer", "--db", path_arg, "demo"]).unwrap();
        run(cli).unwrap();
        assert!(!path.exists());

        let cli = Cli::try_parse_from(["doer", "--db", path_arg, "list"]).unwrap();
        run(cli).unwrap();
        assert!(path.exists());
    }
}
