use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rollcall_core::SystemClock;
use rollcall_session::{
    spawn_engine, AttendanceScanner, Config, EngineHandle, EventBus, Registrar, Roster,
    SessionEvent, StatusLevel,
};
use rollcall_store::{AttendanceLog, DescriptorStore, KeyValueStore, SqliteStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

mod replay;

#[derive(Parser)]
#[command(name = "rollcall", about = "Face-recognition attendance")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered students
    Students,
    /// Show the attendance log, newest first
    Log {
        /// Only entries for this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Register a student from the first face in a recorded feed
    Register {
        #[arg(short, long)]
        name: String,
        /// Unique roll number
        #[arg(short, long)]
        roll: String,
        /// Recorded detection feed (JSON)
        #[arg(long)]
        feed: PathBuf,
    },
    /// Remove a registered student
    Delete {
        /// Roll number to remove
        roll: String,
    },
    /// Scan a recorded feed and mark attendance
    Scan {
        /// Recorded detection feed (JSON)
        #[arg(long)]
        feed: PathBuf,
        /// Restart the feed when it ends; stop with Ctrl-C
        #[arg(long = "loop")]
        looping: bool,
    },
    /// Show configuration and store summary
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let kv: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open(&config.db_path)?);
    let students = DescriptorStore::new(kv.clone());
    let log = AttendanceLog::new(kv);

    match cli.command {
        Commands::Students => {
            let events = EventBus::default();
            let printer = spawn_printer(&events);
            let roster = Roster::new(students, events);
            let all = roster.students();
            drop(roster);
            let _ = printer.await;
            let all = all?;
            if all.is_empty() {
                println!("No students registered");
            }
            for s in all {
                println!("{:<24} {:<12} {} dims", s.name, s.roll, s.descriptor.len());
            }
        }
        Commands::Log { date } => {
            let entries = match date {
                Some(d) => log.on_date(d)?,
                None => log.list()?,
            };
            for e in entries.iter().rev() {
                println!("{:<24} {} {}  Present", e.name, e.date, e.time);
            }
        }
        Commands::Register { name, roll, feed } => {
            let events = EventBus::default();
            let printer = spawn_printer(&events);
            let engine = open_feed(&feed, false, &config)?;
            let registrar = Registrar::new(students, engine, events, config.match_settings());
            let result = registrar.register(&name, &roll).await;
            drop(registrar);
            let _ = printer.await;
            // Already reported through the status printer.
            if result.is_err() {
                std::process::exit(1);
            }
        }
        Commands::Delete { roll } => {
            let events = EventBus::default();
            let printer = spawn_printer(&events);
            let roster = Roster::new(students, events);
            let removed = roster.delete(&roll);
            drop(roster);
            let _ = printer.await;
            if removed? {
                println!("Removed {roll}");
            } else {
                println!("No student with roll number {roll}");
            }
        }
        Commands::Scan { feed, looping } => {
            let events = EventBus::default();
            let printer = spawn_printer(&events);
            let engine = open_feed(&feed, looping, &config)?;
            let mut scanner = AttendanceScanner::new(
                students,
                log,
                Arc::new(SystemClock),
                engine,
                events,
                config.scanner_settings(),
            );
            let result = match scanner.arm() {
                Ok(()) => {
                    scanner
                        .run(async {
                            let _ = tokio::signal::ctrl_c().await;
                            tracing::info!("interrupted");
                        })
                        .await
                }
                Err(e) => Err(e),
            };
            drop(scanner);
            let _ = printer.await;
            // Already reported through the status printer.
            if result.is_err() {
                std::process::exit(1);
            }
        }
        Commands::Status => {
            let registered = students.load()?;
            let attendance = log.load()?;
            println!(
                "{}",
                serde_json::json!({
                    "version": env!("CARGO_PKG_VERSION"),
                    "db_path": config.db_path,
                    "distance_threshold": config.distance_threshold,
                    "scan_interval_ms": config.scan_interval_ms,
                    "refresh_on_change": config.refresh_on_change,
                    "students": registered.items.len(),
                    "attendance_entries": attendance.items.len(),
                    "warnings": ([registered.corruption, attendance.corruption]
                        .iter()
                        .flatten()
                        .map(|c| c.to_string())
                        .collect::<Vec<_>>()),
                })
            );
        }
    }

    Ok(())
}

fn open_feed(path: &Path, looping: bool, config: &Config) -> Result<EngineHandle> {
    let (camera, detector) = replay::open(path, looping)?;
    Ok(spawn_engine(
        Box::new(camera),
        Box::new(detector),
        config.warmup_frames,
    )?)
}

/// Print session events until every sender is dropped.
fn spawn_printer(events: &EventBus) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(SessionEvent::Status(status)) => match status.level {
                    StatusLevel::Error | StatusLevel::Warning => eprintln!("{}", status.message),
                    _ => println!("{}", status.message),
                },
                Ok(SessionEvent::AttendanceChanged(entry)) => {
                    println!("Present: {} {} {}", entry.name, entry.date, entry.time);
                }
                Ok(SessionEvent::Overlay(hits)) => {
                    for hit in hits {
                        tracing::debug!(%hit, "face");
                    }
                }
                Ok(SessionEvent::StudentsChanged) => tracing::debug!("student list changed"),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event printer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
