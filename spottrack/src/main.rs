use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use common::FileFormat;

use spottrack::{BatchConfig, BatchRunner};

#[derive(Parser)]
#[command(name = "spottrack")]
#[command(about = "Detect particles in time-lapse microscopy stacks and link them into tracks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze every stack in a directory.
    Run(RunArgs),

    /// Print the default configuration.
    DefaultConfig {
        #[arg(long, value_enum, default_value_t = FormatArg::Yaml)]
        format: FormatArg,
    },
}

#[derive(Debug, Clone, Args)]
struct RunArgs {
    /// Directory holding the `.nd` stacks.
    #[arg(long)]
    input: PathBuf,

    /// YAML or JSON configuration; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write results (default: the input directory).
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Process stacks concurrently.
    #[arg(long)]
    parallel: bool,

    /// Base log level; `RUST_LOG` takes precedence.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Directory for rolling log files.
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Yaml,
    Json,
}

impl From<FormatArg> for FileFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Yaml => FileFormat::Yaml,
            FormatArg::Json => FileFormat::Json,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run(args),
        Commands::DefaultConfig { format } => {
            let text = BatchConfig::default().to_text(format.into())?;
            print!("{text}");
            Ok(())
        }
    }
}

fn run(args: RunArgs) -> Result<()> {
    common::log_setup::setup_logging(&args.log_level, &args.log_dir, "spottrack")?;

    let mut config = match &args.config {
        Some(path) => BatchConfig::load(path)?,
        None => BatchConfig::default(),
    };
    config.parallel |= args.parallel;

    let report = BatchRunner::new(config)
        .run(&args.input, args.output_dir.as_deref())
        .with_context(|| format!("Batch over {} aborted", args.input.display()))?;

    println!(
        "Analysis complete: {} channel(s) exported, {} failed, {} unreadable file(s)",
        report.exported_channels(),
        report.failed_channels(),
        report.failed_files()
    );
    Ok(())
}
