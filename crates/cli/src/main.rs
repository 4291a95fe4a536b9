use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::env;
use std::path::PathBuf;

mod board;
mod report;
mod settings;

const SETTINGS_ENV: &str = "BOARD_LENS_SETTINGS";
const DEFAULT_SETTINGS_FILE: &str = "board-lens.settings.json";

#[derive(Parser)]
#[command(name = "board-lens")]
#[command(about = "WIP limits and owner badges for kanban boards", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for output)
    #[arg(long, global = true)]
    quiet: bool,

    /// Settings file (overrides BOARD_LENS_SETTINGS)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one pass over a board snapshot and print the report
    Evaluate(EvaluateArgs),

    /// Observe a board snapshot and print every pass until the time runs out
    Watch(WatchArgs),

    /// Manage owner and group limits
    #[command(subcommand)]
    Limits(LimitsCommand),

    /// Manage custom owner colors
    #[command(subcommand)]
    Colors(ColorsCommand),

    /// Print the JSON schema of the settings file
    Schema,
}

#[derive(Args)]
struct BoardArgs {
    /// Board snapshot (serialized render tree, JSON)
    #[arg(long)]
    board: PathBuf,

    /// Horizontal gap in pixels that separates columns
    #[arg(long)]
    column_gap: Option<f64>,
}

#[derive(Args)]
struct EvaluateArgs {
    #[command(flatten)]
    board: BoardArgs,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,

    /// Write the annotated snapshot to this path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct WatchArgs {
    #[command(flatten)]
    board: BoardArgs,

    /// How long to keep watching
    #[arg(long, default_value_t = 5_000)]
    duration_ms: u64,

    /// Debounce window for change bursts
    #[arg(long, default_value_t = 500)]
    debounce_ms: u64,
}

#[derive(Subcommand)]
enum LimitsCommand {
    /// List configured limits
    List {
        #[arg(long)]
        json: bool,
    },

    /// Add a per-owner limit
    #[command(name = "add-owner")]
    AddOwner(AddOwnerArgs),

    /// Add a limit over a group of columns
    #[command(name = "add-group")]
    AddGroup(AddGroupArgs),

    /// Remove an owner or group limit by id
    Remove { id: String },

    /// Turn a feature on
    Enable { feature: Feature },

    /// Turn a feature off
    Disable { feature: Feature },
}

#[derive(Args)]
struct AddOwnerArgs {
    /// Limit id (assigned when omitted)
    #[arg(long)]
    id: Option<String>,

    /// Resolved owner id, as printed by `evaluate`
    #[arg(long)]
    user_id: String,

    /// Display name
    #[arg(long)]
    name: String,

    /// Column ids (comma separated)
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// Column names, used when no ids are given (comma separated)
    #[arg(long, value_delimiter = ',')]
    column_names: Vec<String>,

    #[arg(long)]
    limit: i64,

    /// Highlight color (#RRGGBB)
    #[arg(long)]
    color: Option<String>,
}

#[derive(Args)]
struct AddGroupArgs {
    /// Limit id (assigned when omitted)
    #[arg(long)]
    id: Option<String>,

    #[arg(long)]
    name: String,

    /// Column ids (comma separated)
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// Column names, used when no ids are given (comma separated)
    #[arg(long, value_delimiter = ',')]
    column_names: Vec<String>,

    #[arg(long)]
    limit: i64,

    /// Border color while within the limit
    #[arg(long)]
    base_color: Option<String>,

    /// Border color once the limit is reached
    #[arg(long)]
    warning_color: Option<String>,
}

#[derive(Subcommand)]
enum ColorsCommand {
    /// Set the custom color of an owner
    Set { owner_id: String, color: String },

    /// Return an owner to the palette color
    Clear { owner_id: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Feature {
    OwnerLimits,
    GroupLimits,
    Workload,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let settings_path = cli
        .settings
        .clone()
        .or_else(|| env::var_os(SETTINGS_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
    log::debug!("Using settings file {}", settings_path.display());

    match cli.command {
        Commands::Evaluate(args) => board::run_evaluate(args, &settings_path)?,
        Commands::Watch(args) => board::run_watch(args, &settings_path).await?,
        Commands::Limits(cmd) => settings::run_limits(cmd, &settings_path)?,
        Commands::Colors(cmd) => settings::run_colors(cmd, &settings_path)?,
        Commands::Schema => settings::run_schema()?,
    }

    Ok(())
}
