use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "deputes-etl")]
#[command(about = "Download the list of French deputies from open-data sources into CSV files")]
pub struct CliArgs {
    /// Path to a TOML configuration file (built-in sources are used otherwise)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Override the output directory
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Fetch and print one deputy's details, e.g. `jean-dupont`
    #[arg(long, value_name = "SLUG")]
    pub depute: Option<String>,

    /// Show the source plan without fetching anything
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}
