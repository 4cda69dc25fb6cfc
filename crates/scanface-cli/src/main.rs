use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use scanface_core::{Encoder, EuclideanMatcher, ScanAction, SystemClock};
use scanface_service::{
    AttendanceError, AttendanceService, Config, DetectionDumpEncoder, IdentityPatch,
    WebhookNotifier,
};
use scanface_store::Store;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "scanface", about = "Face-scan classroom attendance")]
struct Cli {
    /// Database file (overrides SCANFACE_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new face from a detector output file
    Register {
        /// JSON array of per-face encodings
        faces: PathBuf,
    },
    /// Check a scanned face in to or out of a class
    Scan {
        /// JSON array of per-face encodings
        faces: PathBuf,
        /// Class name (defaults to SCANFACE_DEFAULT_CLASS)
        #[arg(short, long)]
        class: Option<String>,
        /// enter or exit
        #[arg(short, long, default_value = "enter")]
        action: ScanAction,
        /// Reference to the captured image, stored with the session
        #[arg(long)]
        image: Option<String>,
    },
    /// Manage enrolled students
    #[command(subcommand)]
    Students(StudentCommands),
    /// Show attendance logs, newest first
    Logs {
        #[arg(short, long)]
        limit: Option<u32>,
        /// Only sessions of this day (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// Show today's attendance
    Today {
        #[arg(short, long)]
        class: Option<String>,
    },
    /// Show database and settings summary
    Status,
}

#[derive(Subcommand)]
enum StudentCommands {
    /// List enrolled students
    List,
    /// Show one student
    Show { id: String },
    /// Attach a student ID and name to a registered face
    Update {
        id: String,
        #[arg(long)]
        student_id: Option<String>,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    /// Delete a student and all of their attendance
    Delete { id: String },
    /// Replace a student's registered face
    Reenroll { id: String, faces: PathBuf },
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_faces(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("reading {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    tracing::debug!(db = %config.db_path.display(), "loading attendance database");

    let store = Store::open(&config.db_path).await?;
    let notifier = WebhookNotifier::new(config.webhook_url.clone(), config.webhook_timeout)?;
    let service = AttendanceService::new(
        store,
        EuclideanMatcher,
        notifier,
        SystemClock,
        config.settings(),
    );

    match cli.command {
        Commands::Register { faces } => {
            let identity = service
                .register_image(&DetectionDumpEncoder, &read_faces(&faces)?)
                .await?;
            println!("Face registered. Ask an administrator to add your details.");
            print_json(&identity)?;
        }
        Commands::Scan {
            faces,
            class,
            action,
            image,
        } => {
            let receipt = service
                .scan_image(
                    &DetectionDumpEncoder,
                    &read_faces(&faces)?,
                    class.as_deref(),
                    action,
                    image,
                )
                .await?;
            match action {
                ScanAction::Enter => println!("Checked in: {}", receipt.identity.display_name()),
                ScanAction::Exit => println!("Checked out: {}", receipt.identity.display_name()),
            }
            print_json(&receipt)?;
        }
        Commands::Students(cmd) => match cmd {
            StudentCommands::List => print_json(&service.list_identities().await?)?,
            StudentCommands::Show { id } => print_json(&service.get_identity(&id).await?)?,
            StudentCommands::Update {
                id,
                student_id,
                first_name,
                last_name,
            } => {
                let patch = IdentityPatch {
                    external_id: student_id,
                    first_name,
                    last_name,
                };
                print_json(&service.update_identity(&id, patch).await?)?;
            }
            StudentCommands::Delete { id } => {
                service.delete_identity(&id).await?;
                println!("Deleted {id}");
            }
            StudentCommands::Reenroll { id, faces } => {
                let encoding = DetectionDumpEncoder
                    .encode(&read_faces(&faces)?)
                    .map_err(AttendanceError::from)?;
                print_json(&service.reenroll_face(&id, encoding).await?)?;
            }
        },
        Commands::Logs { limit, date } => {
            print_json(&service.attendance_logs(limit, date).await?)?;
        }
        Commands::Today { class } => {
            print_json(&service.today_attendance(class.as_deref()).await?)?;
        }
        Commands::Status => print_json(&service.status().await?)?,
    }

    Ok(())
}
