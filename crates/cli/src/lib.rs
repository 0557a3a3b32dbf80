pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use affilink_core::config::{AppConfig, LoadOptions, LogFormat};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "affilink",
    about = "Affilink operator CLI",
    long_about = "Categorize products, mint sub-ids and build affiliate links from the command line.",
    after_help = "Examples:\n  affilink doctor --json\n  affilink suggest --text \"fone bluetooth\"\n  affilink sequential --products produtos.json --start 1"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, template, catalog and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Suggest a category for a product text using catalog keywords")]
    Suggest {
        #[arg(long)]
        text: String,
    },
    #[command(about = "Assign categories to products that have none or an unknown one")]
    Repair {
        #[arg(long, help = "JSON file with the product list")]
        products: PathBuf,
        #[arg(long, help = "Store the repaired products in the database")]
        apply: bool,
    },
    #[command(about = "Issue the next sub-id tuple for a category")]
    Subids {
        #[arg(long)]
        category: String,
        #[arg(long, help = "Category sigla; derived from the name when omitted")]
        sigla: Option<String>,
    },
    #[command(about = "Inspect or reset sub-id sequence counters")]
    Counters {
        #[command(subcommand)]
        action: CountersAction,
    },
    #[command(about = "Build an affiliate link for an offer URL")]
    Link {
        #[arg(long)]
        url: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        sigla: Option<String>,
    },
    #[command(about = "Generate and store links for a product list with seqNNN sub-ids")]
    Sequential {
        #[arg(long, help = "JSON file with the product list")]
        products: PathBuf,
        #[arg(long, default_value_t = 1)]
        start: u32,
        #[arg(long)]
        campaign: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum CountersAction {
    Show,
    Reset {
        #[arg(long, help = "global or category")]
        scope: String,
        #[arg(long)]
        sigla: Option<String>,
    },
}

/// Installs the stderr subscriber described by `logging`. A subscriber that
/// is already installed is kept.
pub fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Suggest { text } => commands::suggest::run(&text),
        Command::Repair { products, apply } => commands::repair::run(&products, apply),
        Command::Subids { category, sigla } => {
            commands::subids::run(&category, sigla.as_deref())
        }
        Command::Counters { action: CountersAction::Show } => commands::counters::show(),
        Command::Counters { action: CountersAction::Reset { scope, sigla } } => {
            commands::counters::reset(&scope, sigla.as_deref())
        }
        Command::Link { url, category, sigla } => {
            commands::link::run(&url, &category, sigla.as_deref())
        }
        Command::Sequential { products, start, campaign } => {
            commands::sequential::run(&products, start, campaign.as_deref())
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
