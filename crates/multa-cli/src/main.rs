//! Operator CLI for the fine ledger and evidence store

use clap::{Parser, Subcommand};
use multa_cli::{commands, config};
use multa_core::{Environment, FineFields, FineState};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "multa")]
#[command(about = "Multa - traffic fines on a ledger with content-addressed evidence", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (TOML); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload evidence and register a fine
    Register {
        /// Evidence file (photo, video)
        #[arg(short, long)]
        evidence: PathBuf,

        /// Vehicle plate, e.g. ABC123
        #[arg(short, long)]
        plate: String,

        /// Where the infraction happened
        #[arg(short, long)]
        location: String,

        /// Infraction code, e.g. EXCESO_VELOCIDAD
        #[arg(short, long)]
        infraction: String,

        /// Cost in whole currency units
        #[arg(long)]
        cost: u64,

        /// Vehicle owner identifier
        #[arg(short, long)]
        owner: String,

        /// Identifier in an external system
        #[arg(long)]
        external_id: Option<String>,
    },

    /// Change the status of a fine
    UpdateStatus {
        /// Fine id
        fine_id: u64,

        /// New status, by name (PAID) or code (1)
        #[arg(short, long)]
        state: FineState,

        /// Reason recorded in the status log
        #[arg(short, long)]
        reason: String,
    },

    /// Show a fine and the amount currently due
    Show {
        /// Fine id
        fine_id: u64,
    },

    /// List fines page by page
    List {
        #[arg(long, default_value = "1")]
        page: u64,

        #[arg(long, default_value = "10")]
        page_size: u64,
    },

    /// Fines recorded for a plate
    ByPlate {
        /// Vehicle plate
        plate: String,
    },

    /// Status log of a fine
    History {
        /// Fine id
        fine_id: u64,

        #[arg(long, default_value = "1")]
        page: u64,

        #[arg(long, default_value = "10")]
        page_size: u64,
    },

    /// Cross-check a fine against its status log
    Integrity {
        /// Fine id
        fine_id: u64,
    },

    /// Download evidence by CID
    Evidence {
        /// Content identifier
        cid: String,

        /// Destination file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Newest status events across all fines
    Recent,

    /// Probe the ledger, the evidence store and SIMIT
    Health,

    /// SIMIT lookups
    Simit {
        #[command(subcommand)]
        command: SimitCommands,
    },
}

#[derive(Subcommand)]
enum SimitCommands {
    /// Fines SIMIT holds for a plate
    Lookup {
        /// Vehicle plate
        plate: String,
    },

    /// Move a fine to a new status, recording a SIMIT identifier as the reason
    Link {
        /// Fine id
        fine_id: u64,

        /// SIMIT identifier
        simit_id: String,

        /// New status, by name (PAID) or code (1); must differ from the current one
        #[arg(short, long)]
        state: FineState,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let loaded = config::load(cli.config.as_deref());
    tracing_subscriber::fmt()
        .with_env_filter(config::log_filter(cli.verbose, loaded.as_ref().ok()))
        .with_writer(std::io::stderr)
        .init();

    let settings = loaded?;
    let environment = settings.environment;
    let service = config::build_service(&settings)?;

    let result = match cli.command {
        Commands::Register {
            evidence,
            plate,
            location,
            infraction,
            cost,
            owner,
            external_id,
        } => {
            let fields = FineFields {
                plate_number: plate,
                location,
                infraction_type: infraction,
                cost,
                owner_identifier: owner,
                external_system_id: external_id,
            };
            commands::fines::register(&service, &evidence, fields).await
        }
        Commands::UpdateStatus {
            fine_id,
            state,
            reason,
        } => commands::fines::update_status(&service, fine_id, state, &reason).await,
        Commands::Show { fine_id } => {
            let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
            commands::fines::show(&service, fine_id, now).await
        }
        Commands::List { page, page_size } => {
            commands::fines::list(&service, page, page_size).await
        }
        Commands::ByPlate { plate } => commands::fines::by_plate(&service, &plate).await,
        Commands::History {
            fine_id,
            page,
            page_size,
        } => commands::history::history(&service, fine_id, page, page_size).await,
        Commands::Integrity { fine_id } => {
            commands::history::integrity(&service, fine_id).await
        }
        Commands::Evidence { cid, output } => {
            commands::evidence::fetch(&service, &cid, &output).await
        }
        Commands::Recent => commands::history::recent(&service).await,
        Commands::Health => commands::health::health(&service).await,
        Commands::Simit { command } => match command {
            SimitCommands::Lookup { plate } => commands::simit::lookup(&service, &plate).await,
            SimitCommands::Link {
                fine_id,
                simit_id,
                state,
            } => commands::simit::link(&service, fine_id, state, &simit_id).await,
        },
    };

    Ok(report(result, environment))
}

fn report(result: multa_core::Result<serde_json::Value>, environment: Environment) -> ExitCode {
    match result {
        Ok(value) => {
            println!("{}", commands::render(&value));
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::debug!(error = ?err, "Command failed");
            println!("{}", commands::render_error(&err, environment));
            ExitCode::from(commands::exit_code(&err))
        }
    }
}
