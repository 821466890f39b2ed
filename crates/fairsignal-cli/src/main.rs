//! FairSignal CLI — command-line interface for candidate-screening actions.
//!
//! Reuses the same core domain logic (fairsignal-core) that powers the
//! recruiting product's server handlers: the resilient text client for
//! assessments and summaries, and the workflow-run engine for multi-step
//! actions.

mod commands;

use clap::{Parser, Subcommand};

/// FairSignal CLI — candidate-screening action orchestration
#[derive(Parser)]
#[command(
    name = "fairsignal",
    version,
    about = "FairSignal CLI — candidate-screening action orchestration"
)]
pub struct Cli {
    /// Path to the SQLite database file backing simulated runs
    #[arg(long, env = "FAIRSIGNAL_DB_PATH", default_value = "fairsignal.db")]
    db: String,

    /// Force the deterministic offline text tier (no credentials needed)
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a structured screening assessment for a candidate
    Screen {
        /// Candidate description or resume text
        #[arg(long)]
        prompt: String,
        /// Role the candidate is being screened for
        #[arg(long)]
        role: Option<String>,
    },

    /// Summarize free-form recruiting notes
    Summarize {
        /// Text to summarize
        #[arg(long)]
        text: String,
        /// Sentence budget (clamped to 1..=5)
        #[arg(long, default_value_t = 3)]
        max_sentences: u8,
    },

    /// Manage workflow runs
    Run {
        #[command(subcommand)]
        action: RunAction,
    },
}

#[derive(Subcommand)]
enum RunAction {
    /// Start a new run
    Start {
        /// Step names (comma-separated)
        #[arg(long, value_delimiter = ',')]
        steps: Vec<String>,
        /// Zero-based indices of steps requiring approval (comma-separated)
        #[arg(long, value_delimiter = ',')]
        approval_steps: Vec<usize>,
        /// Run input payload as a JSON string
        #[arg(long, default_value = "{}")]
        input: String,
        /// Approve approval-gated steps automatically
        #[arg(long)]
        auto_approve: bool,
        /// Create the run without advancing it
        #[arg(long)]
        no_advance: bool,
        /// Drive the run to a terminal status (polls remote runs)
        #[arg(long)]
        wait: bool,
        /// Idempotency token for remote run creation
        #[arg(long)]
        client_token: Option<String>,
    },

    /// Advance the active step of a simulated run
    Advance {
        /// Run ID
        id: String,
        /// Approve the active step if it is waiting for approval
        #[arg(long)]
        approve: bool,
        /// Inject a failure at the given step index
        #[arg(long)]
        fail_at: Option<usize>,
    },

    /// Fetch a run by ID
    Get {
        /// Run ID
        id: String,
    },

    /// Pause a queued or running simulated run
    Pause {
        /// Run ID
        id: String,
    },

    /// Resume a paused run
    Resume {
        /// Run ID
        id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fairsignal_core=warn,fairsignal_cli=info".into()),
        )
        .init();

    let result = match cli.command {
        Commands::Screen { prompt, role } => {
            commands::screen::run(cli.offline, &prompt, role.as_deref()).await
        }

        Commands::Summarize {
            text,
            max_sentences,
        } => commands::screen::summarize(cli.offline, &text, max_sentences).await,

        Commands::Run { action } => {
            let engine = commands::init_engine(&cli.db);
            match action {
                RunAction::Start {
                    steps,
                    approval_steps,
                    input,
                    auto_approve,
                    no_advance,
                    wait,
                    client_token,
                } => {
                    commands::run::start(
                        &engine,
                        steps,
                        &approval_steps,
                        &input,
                        auto_approve,
                        no_advance,
                        wait,
                        client_token,
                    )
                    .await
                }
                RunAction::Advance { id, approve, fail_at } => {
                    commands::run::advance(&engine, &id, approve, fail_at).await
                }
                RunAction::Get { id } => commands::run::get(&engine, &id).await,
                RunAction::Pause { id } => commands::run::pause(&engine, &id).await,
                RunAction::Resume { id } => commands::run::resume(&engine, &id).await,
            }
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
