use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tallyfolio::core::log::init_logging;
use tallyfolio::core::transaction::ImportCandidate;
use tallyfolio::ingest::export::ExportFormat;
use tallyfolio::ingest::tabular::TabularFormat;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Raw transaction fields; validated before anything is stored.
#[derive(Args)]
struct TransactionArgs {
    #[arg(long)]
    name: String,
    /// Signed amount; negative for spending
    #[arg(long, allow_hyphen_values = true)]
    amount: String,
    /// Date or timestamp (defaults to now)
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    category: Option<String>,
    /// cash, stock or crypto
    #[arg(long)]
    asset_type: String,
    /// Currency code or ticker symbol
    #[arg(long)]
    currency: String,
}

impl From<TransactionArgs> for ImportCandidate {
    fn from(args: TransactionArgs) -> Self {
        ImportCandidate {
            name: Some(args.name),
            amount: Some(args.amount),
            date: args.date,
            category: args.category,
            asset_type: Some(args.asset_type),
            currency: Some(args.currency),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Add a single transaction
    Add(TransactionArgs),
    /// List all transactions
    List,
    /// Replace the fields of a transaction
    Update {
        id: String,
        #[command(flatten)]
        fields: TransactionArgs,
    },
    /// Delete a transaction
    Delete { id: String },
    /// List categories in use
    Categories,
    /// Review a CSV or Markdown table without saving it
    Import {
        path: PathBuf,
        /// csv or markdown (guessed from the extension by default)
        #[arg(short, long)]
        format: Option<TabularFormat>,
        /// Save the review report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Save a reviewed JSON batch; rejected whole if any record is invalid
    Commit { path: PathBuf },
    /// Export all transactions
    Export {
        /// csv, markdown or json
        #[arg(short, long, default_value = "csv")]
        format: ExportFormat,
        /// File or directory to write to (stdout by default)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Display balances in the base currency
    Balance {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Display income and spend over a date window
    Performance {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    /// Refresh and display conversion rates
    Rates {
        /// Clear all cached rates instead
        #[arg(long)]
        reset: bool,
    },
}

impl From<Commands> for tallyfolio::AppCommand {
    fn from(cmd: Commands) -> tallyfolio::AppCommand {
        use tallyfolio::AppCommand;
        match cmd {
            Commands::Add(fields) => AppCommand::Add(fields.into()),
            Commands::List => AppCommand::List,
            Commands::Update { id, fields } => AppCommand::Update {
                id,
                fields: fields.into(),
            },
            Commands::Delete { id } => AppCommand::Delete { id },
            Commands::Categories => AppCommand::Categories,
            Commands::Import {
                path,
                format,
                output,
            } => AppCommand::Import {
                path,
                format,
                output,
            },
            Commands::Commit { path } => AppCommand::Commit { path },
            Commands::Export { format, output } => AppCommand::Export { format, output },
            Commands::Balance { json } => AppCommand::Balance { json },
            Commands::Performance { from, to } => AppCommand::Performance { from, to },
            Commands::Rates { reset } => AppCommand::Rates { reset },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => tallyfolio::cli::setup::setup_at_path(path),
            None => tallyfolio::cli::setup::setup(),
        },
        Some(cmd) => tallyfolio::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
