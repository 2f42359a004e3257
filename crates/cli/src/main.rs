use anyhow::Context;
use clap::{Parser, Subcommand};
use clinic_core::{
    constants, open_store, ClinicStore, CoreConfig, Nric, NricChecksum, NricPrefix, Seed,
    ShardableUuid, StoreKind, SubmissionFilter, SubmissionStatus, UserService,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "clinic")]
#[command(about = "Clinic medical-exam submissions CLI")]
struct Cli {
    /// Data directory (overrides CLINIC_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// NRIC/FIN checksum tools
    Nric {
        #[command(subcommand)]
        command: NricCommands,
    },
    /// Create clinics and users from a YAML seed file
    Seed {
        /// Path to the seed file
        file: PathBuf,
    },
    /// Inspect stored submissions
    Submissions {
        #[command(subcommand)]
        command: SubmissionCommands,
    },
}

#[derive(Subcommand)]
enum NricCommands {
    /// Check an identifier's checksum letter
    Validate {
        /// Identifier, e.g. S1234567D
        nric: String,
    },
    /// Append the checksum letter to a prefix and seven digits
    Generate {
        /// One of S, T, F, G, M
        prefix: NricPrefix,
        /// Exactly seven digits
        digits: String,
    },
    /// Generate random valid identifiers for test data
    Random {
        #[arg(long, default_value = "S")]
        prefix: NricPrefix,
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
}

#[derive(Subcommand)]
enum SubmissionCommands {
    /// List submissions, newest first
    List {
        /// Only this status (draft, pending_approval, submitted, rejected)
        #[arg(long)]
        status: Option<SubmissionStatus>,
        /// Only this clinic
        #[arg(long)]
        clinic: Option<ShardableUuid>,
    },
    /// Print a submission's audit trail
    Audit {
        /// Submission id
        id: ShardableUuid,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic_core=warn".parse()?)
                .add_directive("clinic_cli=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Nric { command }) => return Ok(run_nric(command)),
        Some(Commands::Seed { file }) => {
            let store = open_file_store(cli.data_dir)?;
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading seed file {}", file.display()))?;
            let seed = Seed::parse(&text)?;
            tracing::info!("Applying seed file {}", file.display());
            let report = Seed::apply(&UserService::new(store), seed)?;
            println!(
                "Clinics: {} created, {} existing. Users: {} created, {} skipped.",
                report.clinics_created,
                report.clinics_existing,
                report.users_created,
                report.users_skipped
            );
        }
        Some(Commands::Submissions { command }) => {
            let store = open_file_store(cli.data_dir)?;
            run_submissions(store.as_ref(), command)?;
        }
        None => {
            println!("Use 'clinic --help' for commands");
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn run_nric(command: NricCommands) -> ExitCode {
    match command {
        NricCommands::Validate { nric } => match Nric::parse(&nric) {
            Ok(valid) => {
                println!("{} is valid", valid);
                ExitCode::SUCCESS
            }
            Err(e) => {
                println!("{} is invalid: {}", nric.trim(), e);
                ExitCode::FAILURE
            }
        },
        NricCommands::Generate { prefix, digits } => {
            match NricChecksum::generate(prefix, &digits) {
                Ok(nric) => {
                    println!("{}", nric);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("Error generating NRIC: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        NricCommands::Random { prefix, count } => {
            let mut rng = rand::thread_rng();
            for _ in 0..count {
                println!("{}", NricChecksum::random(prefix, &mut rng));
            }
            ExitCode::SUCCESS
        }
    }
}

fn run_submissions(store: &dyn ClinicStore, command: SubmissionCommands) -> anyhow::Result<()> {
    match command {
        SubmissionCommands::List { status, clinic } => {
            let filter = SubmissionFilter {
                clinic_id: clinic,
                status,
                created_by: None,
            };
            let submissions = store.list_submissions(&filter)?;
            if submissions.is_empty() {
                println!("No submissions found.");
            }
            for s in submissions {
                println!(
                    "ID: {}, Exam: {}, Patient: {} ({}), Status: {}, Created: {}",
                    s.id,
                    s.exam_type,
                    s.patient_name,
                    s.patient_nric.masked(),
                    s.status,
                    s.created_date.to_rfc3339()
                );
            }
        }
        SubmissionCommands::Audit { id } => {
            for entry in store.list_audit_entries(&id)? {
                println!(
                    "{} {} by {}: {}",
                    entry.timestamp.to_rfc3339(),
                    entry.event_type,
                    entry.user_id,
                    serde_json::to_string(&entry.changes)?
                );
            }
        }
    }
    Ok(())
}

/// The CLI always works against the file store; a memory store would be empty.
fn open_file_store(data_dir: Option<PathBuf>) -> anyhow::Result<Arc<dyn ClinicStore>> {
    let data_dir = match data_dir {
        Some(dir) => dir,
        None => PathBuf::from(
            std::env::var("CLINIC_DATA_DIR")
                .unwrap_or_else(|_| constants::DEFAULT_CLINIC_DATA_DIR.into()),
        ),
    };
    let cfg = CoreConfig::new(data_dir, StoreKind::File)?;
    tracing::debug!("Opening file store at {}", cfg.data_dir().display());
    Ok(open_store(&cfg)?)
}
