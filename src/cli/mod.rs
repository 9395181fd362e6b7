use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// probeanno: probe-to-gene annotation of microarray expression matrices
#[derive(Parser, Debug)]
#[command(name = "probeanno")]
#[command(about = "Annotate microarray expression matrices with gene symbols")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Annotate every configured dataset
    Annotate(AnnotateArgs),

    /// Run quality checks on existing annotated tables
    Verify(VerifyArgs),
}

/// Annotation arguments
#[derive(Parser, Debug)]
pub struct AnnotateArgs {
    /// Run configuration (JSON)
    #[arg(short, long, required = true)]
    pub config: PathBuf,

    /// Output directory, overriding the configuration
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Verify the exports after annotation
    #[arg(long)]
    pub verify: bool,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Verification arguments
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Directory holding *_annotated.tsv files
    #[arg(short, long, required = true)]
    pub input: PathBuf,

    /// Lowest expected expression value
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    pub min_value: f64,

    /// Highest expected expression value
    #[arg(long, default_value = "20.0", allow_hyphen_values = true)]
    pub max_value: f64,

    /// Number of most represented genes to report
    #[arg(long, default_value = "10")]
    pub top_n: usize,

    /// Output file for the quality report (defaults to <input>/quality_report.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Setup logging based on verbosity
pub fn setup_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
