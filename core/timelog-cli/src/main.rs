//! timelog: command-line time tracker for study, game and other sessions.
//!
//! Thin adapter over `timelog-core`. Every subcommand runs one core operation
//! against the data file under `~/.timelog/` (or `$TIMELOG_HOME`).
//!
//! ## Subcommands
//!
//! - `start` / `stop` / `status`: live session tracking
//! - `add` / `show` / `edit` / `delete`: manage recorded sessions
//! - `stats` / `log` / `chart` / `export`: reports
//! - `audit` / `clear`: maintenance

mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use timelog_core::{
    load_config, Category, JsonFileRepository, LedgerService, StorageConfig, SystemClock,
};

use commands::{CliResult, Context, ExportFormat};

#[derive(Parser, Debug)]
#[command(name = "timelog")]
#[command(about = "Track study, game and other time")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a session, stopping the one in progress
    Start {
        #[arg(value_name = "TASK")]
        task: String,

        /// study, game or other (default from config)
        #[arg(short, long)]
        category: Option<Category>,
    },

    /// Stop the session in progress
    Stop,

    /// Show the session in progress and today's totals
    Status,

    /// Per-day totals
    Stats {
        /// A single day (YYYY-MM-DD)
        #[arg(long, conflicts_with = "days")]
        date: Option<String>,

        /// Number of days ending today
        #[arg(long)]
        days: Option<u32>,
    },

    /// Recent sessions, newest first
    Log {
        #[arg(long)]
        days: Option<u32>,
    },

    /// Text bar chart of hours per day
    Chart {
        #[arg(long)]
        days: Option<u32>,
    },

    /// Record a session with explicit times
    Add {
        #[arg(value_name = "TASK")]
        task: String,

        #[arg(short, long)]
        category: Category,

        /// Start time (timestamp or HH:MM today)
        #[arg(long)]
        start: String,

        /// End time (timestamp or HH:MM on the start date); omit for a running session
        #[arg(long)]
        end: Option<String>,
    },

    /// Show one session
    Show {
        /// Session id, id prefix, or @N position
        #[arg(value_name = "SESSION")]
        session: String,
    },

    /// Change a recorded session
    Edit {
        #[arg(value_name = "SESSION")]
        session: String,

        #[arg(long)]
        task: Option<String>,

        #[arg(long)]
        category: Option<Category>,

        #[arg(long)]
        start: Option<String>,

        #[arg(long, conflicts_with = "reopen")]
        end: Option<String>,

        /// Clear the end time so the session is running again
        #[arg(long)]
        reopen: bool,
    },

    /// Delete a session
    Delete {
        #[arg(value_name = "SESSION")]
        session: String,
    },

    /// Export sessions as CSV or JSON
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,

        #[arg(long)]
        days: Option<u32>,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check daily aggregates against the session log
    Audit {
        /// Rebuild aggregates that disagree
        #[arg(long)]
        fix: bool,
    },

    /// Delete all sessions and statistics
    Clear {
        #[arg(long)]
        yes: bool,
    },
}

fn dispatch(
    ctx: &Context<JsonFileRepository, SystemClock>,
    command: Commands,
) -> CliResult<String> {
    match command {
        Commands::Start { task, category } => ctx.start(&task, category),
        Commands::Stop => ctx.stop(),
        Commands::Status => ctx.status(),
        Commands::Stats { date, days } => ctx.stats(date.as_deref(), days),
        Commands::Log { days } => ctx.log(days),
        Commands::Chart { days } => ctx.chart(days),
        Commands::Add {
            task,
            category,
            start,
            end,
        } => ctx.add(&task, category, &start, end.as_deref()),
        Commands::Show { session } => ctx.show(&session),
        Commands::Edit {
            session,
            task,
            category,
            start,
            end,
            reopen,
        } => ctx.edit(
            &session,
            task,
            category,
            start.as_deref(),
            end.as_deref(),
            reopen,
        ),
        Commands::Delete { session } => ctx.delete(&session),
        Commands::Export {
            format,
            days,
            output,
        } => ctx.export(format, days, output.as_deref()),
        Commands::Audit { fix } => ctx.audit(fix),
        Commands::Clear { yes } => ctx.clear(yes),
    }
}

fn run(storage: StorageConfig, command: Commands) -> CliResult<String> {
    let config = load_config(&storage)?;
    let repo = JsonFileRepository::new(config.data_path(&storage));
    let ctx = Context {
        service: LedgerService::with_system_clock(repo),
        config,
    };
    dispatch(&ctx, command)
}

fn main() {
    let cli = Cli::parse();

    let storage = match StorageConfig::from_env() {
        Ok(storage) => storage,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };
    let _logging_guard = logging::init(&storage);

    match run(storage, cli.command) {
        Ok(output) => print!("{}", output),
        Err(e) => {
            if e.is_user_error() {
                tracing::warn!(error = %e, "timelog command rejected");
            } else {
                tracing::error!(error = %e, "timelog command failed");
            }
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}
