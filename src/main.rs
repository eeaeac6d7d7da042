use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use focuslog::auth::ApiUser;
use focuslog::clock::minus_millis;
use focuslog::config::TrackerConfig;
use focuslog::driver::{drive, DriveOutcome};
use focuslog::engine::{input, ActivityTimer, Countdown, Pomodoro, PomodoroConfig, Stopwatch};
use focuslog::format::{format_compact, format_duration};
use focuslog::models::{ActivityType, NewSession};
use focuslog::{init_logging, Tracker, TrackerError, TrackerResult};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing::warn;

#[derive(Parser)]
#[command(
    name = "focuslog",
    version = env!("CARGO_PKG_VERSION"),
    about = "Track study and work time per project, locally first",
    long_about = None
)]
struct Cli {
    /// Override database path
    #[arg(global = true, long = "db")]
    db: Option<PathBuf>,

    /// Override the remote API base URL
    #[arg(global = true, long = "api")]
    api: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Stopwatch,
    Countdown,
    Pomodoro,
}

#[derive(Subcommand)]
enum Commands {
    /// List projects with their tracked totals
    Projects,

    /// Create a local project
    Add {
        name: String,
        #[arg(long, short = 'd', default_value = "")]
        description: String,
    },

    /// Create the remote copy of a project so its time is mirrored
    Link {
        project: String,
        /// Signed-in user id; stored with the token for later runs
        #[arg(long, requires = "token")]
        uid: Option<String>,
        #[arg(long, requires = "uid")]
        token: Option<String>,
    },

    /// Run a timer for a project until it finishes or Ctrl-C
    Track {
        project: String,
        #[arg(long, value_enum, default_value = "stopwatch")]
        mode: Mode,
        /// Countdown length (or pomodoro focus length) in minutes
        #[arg(long)]
        minutes: Option<String>,
        /// Countdown hours; combined with --mins-part and --secs
        #[arg(long)]
        hours: Option<String>,
        #[arg(long = "mins-part")]
        mins_part: Option<String>,
        #[arg(long)]
        secs: Option<String>,
        /// Pomodoro break length in minutes
        #[arg(long = "break")]
        break_minutes: Option<String>,
        #[arg(long)]
        cycles: Option<String>,
    },

    /// Log a finished run as a single session
    Log {
        project: String,
        /// Length in minutes, ending now
        #[arg(long)]
        minutes: String,
        #[arg(long = "type", value_enum, default_value = "stopwatch")]
        activity: Mode,
        #[arg(long)]
        notes: Option<String>,
    },
}

impl From<Mode> for ActivityType {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Stopwatch => ActivityType::Stopwatch,
            Mode::Countdown => ActivityType::Countdown,
            Mode::Pomodoro => ActivityType::Pomodoro,
        }
    }
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> TrackerResult<()> {
    let mut config = TrackerConfig::from_env();
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(api) = cli.api {
        config.sync.api_base_url = api;
    }
    let drain_timeout = Duration::from_secs(config.sync.http_timeout_secs + 1);

    let (tracker, worker) = Tracker::open(config)?;
    let worker = tokio::spawn(worker.run());

    let result = dispatch(&tracker, cli.command).await;

    // Let queued mirrors finish before exiting.
    drop(tracker);
    match tokio::time::timeout(drain_timeout, worker).await {
        Ok(Ok(report)) if report.failed > 0 => {
            eprintln!("{} remote update(s) failed; local data is intact", report.failed)
        }
        Ok(_) => {}
        Err(_) => warn!("[MIRROR] Pending remote updates abandoned at exit"),
    }
    result
}

fn find_project(tracker: &Tracker, id_or_name: &str) -> TrackerResult<String> {
    if let Some(p) = tracker.get_project_by_id(id_or_name) {
        return Ok(p.id);
    }
    tracker
        .list_projects()
        .into_iter()
        .find(|p| p.name.eq_ignore_ascii_case(id_or_name))
        .map(|p| p.id)
        .ok_or_else(|| TrackerError::ProjectNotFound(id_or_name.to_string()))
}

async fn dispatch(tracker: &Tracker, command: Commands) -> TrackerResult<()> {
    match command {
        Commands::Projects => {
            let projects = tracker.list_projects();
            if projects.is_empty() {
                println!("No projects yet. Create one with `focuslog add <name>`.");
            }
            for p in projects {
                let link = if p.remote_id.is_some() { "linked" } else { "local" };
                println!(
                    "{}  {:<24} {:>10}  {:>3} session(s)  [{}]",
                    p.id,
                    p.name,
                    format_duration(p.total_ms),
                    p.sessions.len(),
                    link
                );
            }
            Ok(())
        }
        Commands::Add { name, description } => {
            let p = tracker.add_project(&name, &description);
            println!("Created project {} ({})", p.name, p.id);
            Ok(())
        }
        Commands::Link {
            project,
            uid,
            token,
        } => {
            if let (Some(uid), Some(token)) = (uid, token) {
                tracker.set_principal(Some(ApiUser { uid, token }));
            }
            let id = find_project(tracker, &project)?;
            let linked = tracker.link_project(&id).await?;
            println!(
                "Project {} linked to remote {}",
                linked.name,
                linked.remote_id.unwrap_or_default()
            );
            Ok(())
        }
        Commands::Track {
            project,
            mode,
            minutes,
            hours,
            mins_part,
            secs,
            break_minutes,
            cycles,
        } => {
            let id = find_project(tracker, &project)?;
            let timer: ActivityTimer = match mode {
                Mode::Stopwatch => Stopwatch::new().into(),
                Mode::Countdown => {
                    let ms = match minutes {
                        Some(m) => input::minutes_to_ms(&m),
                        None => input::hms_to_ms(
                            hours.as_deref().unwrap_or(""),
                            mins_part.as_deref().unwrap_or(""),
                            secs.as_deref().unwrap_or(""),
                        ),
                    };
                    Countdown::new(ms).into()
                }
                Mode::Pomodoro => {
                    let defaults = PomodoroConfig::default();
                    let config = PomodoroConfig::new(
                        minutes.as_deref().map_or(defaults.focus_minutes(), input::parse_minutes),
                        break_minutes
                            .as_deref()
                            .map_or(defaults.break_minutes(), input::parse_break_minutes),
                        cycles.as_deref().map_or(defaults.cycles(), input::parse_cycles),
                    );
                    Pomodoro::new(config).into()
                }
            };
            track(tracker, &id, timer).await
        }
        Commands::Log {
            project,
            minutes,
            activity,
            notes,
        } => {
            let id = find_project(tracker, &project)?;
            let duration_ms = input::minutes_to_ms(&minutes);
            let end = Utc::now();
            let session = NewSession {
                activity: activity.into(),
                start: minus_millis(end, duration_ms),
                end,
                duration_ms,
                notes,
            };
            match tracker.add_session_to_project(&id, session) {
                Some(record) => println!("Logged {}", format_duration(record.duration_ms)),
                None => println!("Nothing logged"),
            }
            Ok(())
        }
    }
}

async fn track(tracker: &Tracker, project_id: &str, timer: ActivityTimer) -> TrackerResult<()> {
    let mut session = tracker
        .start_session(project_id, timer)
        .ok_or_else(|| TrackerError::ProjectNotFound(project_id.to_string()))?;

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stop_tx.send(true);
        }
    });

    let config = tracker.config();
    let clock = tracker.clock();
    let outcome = drive(
        &mut session,
        clock.as_ref(),
        Duration::from_millis(config.tick_interval_ms),
        Duration::from_millis(config.display_interval_ms),
        stop_rx,
        |snap| {
            let extra = match (snap.phase, snap.completed_cycles, snap.target_cycles) {
                (Some(phase), Some(done), Some(target)) => {
                    format!("  {:?} {}/{}", phase, done, target)
                }
                _ => String::new(),
            };
            print!("\r{} {}{}   ", snap.activity, snap.display, extra);
            let _ = std::io::stdout().flush();
        },
    )
    .await;
    println!();
    session.close(clock.now());

    match outcome {
        DriveOutcome::Rejected => println!("Timer did not start (nothing to count down?)"),
        DriveOutcome::Finished => println!("Done."),
        DriveOutcome::Stopped => println!("Stopped."),
    }
    if let Some(p) = tracker.get_project_by_id(project_id) {
        println!("{} total: {}", p.name, format_compact(p.total_ms));
    }
    Ok(())
}
