mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use prometheus::Registry;
use std::path::PathBuf;
use std::time::Duration;
use verdict_common::config::ClientConfig;
use verdict_common::types::JobKind;

#[derive(Parser)]
#[command(name = "verdict-cli")]
#[command(about = "Verdict CLI - Submit code to the judge and follow it until it settles", long_about = None)]
struct Cli {
    /// Judge API base URL (overrides VERDICT_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token (overrides VERDICT_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Status check interval in milliseconds
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_ms: Option<u64>,

    /// Stop waiting on a job after this many status checks
    #[arg(long, global = true)]
    max_attempts: Option<u32>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value = "false")]
    json_logs: bool,

    /// Print tracker metrics in Prometheus text format before exiting
    #[arg(long, global = true, default_value = "false")]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run code against the sample test cases
    Run {
        /// Problem id
        #[arg(short, long)]
        problem: u64,

        /// Judge language id
        #[arg(short, long)]
        language: u64,

        /// Source file to send
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Submit code for full judging
    Submit {
        /// Problem id
        #[arg(short, long)]
        problem: u64,

        /// Judge language id
        #[arg(short, long)]
        language: u64,

        /// Source file to send
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Validate a problem's reference solutions, one job per language
    Validate {
        /// Problem id
        #[arg(short, long)]
        problem: u64,

        /// Judge language ids (repeatable)
        #[arg(short, long = "language", required = true, num_args = 1..)]
        languages: Vec<u64>,
    },

    /// Wait for boilerplate generation to finish
    Boilerplates {
        /// Problem id
        #[arg(short, long)]
        problem: u64,

        /// Number of languages expected to be generated
        #[arg(short, long)]
        expect: u32,
    },

    /// Convert a bulk test case JSON file into canonical test cases
    Import {
        /// JSON file with test cases
        #[arg(short, long, required_unless_present = "template")]
        file: Option<PathBuf>,

        /// Function parameter as name[:type], in signature order (repeatable)
        #[arg(long = "param")]
        params: Vec<String>,

        /// Print an example file for the given parameters instead of importing
        #[arg(long, default_value = "false")]
        template: bool,

        /// Return type used to shape the template's expected_output
        #[arg(long)]
        return_type: Option<String>,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // stdout is reserved for command output
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut config = ClientConfig::from_env();
    if let Some(url) = cli.api_url {
        config.base_url = url;
    }
    if let Some(token) = cli.token {
        config = config.with_token(token);
    }
    if let Some(ms) = cli.poll_interval_ms {
        config = config.with_poll_interval(Duration::from_millis(ms));
    }
    if let Some(max) = cli.max_attempts {
        config = config.with_submission_max_attempts(Some(max));
    }

    let registry = Registry::new();

    match cli.command {
        Commands::Run {
            problem,
            language,
            file,
        } => {
            commands::execute(&config, &registry, JobKind::Run, problem, language, &file).await?;
        }
        Commands::Submit {
            problem,
            language,
            file,
        } => {
            commands::execute(&config, &registry, JobKind::Submit, problem, language, &file).await?;
        }
        Commands::Validate { problem, languages } => {
            commands::validate(&config, &registry, problem, &languages).await?;
        }
        Commands::Boilerplates { problem, expect } => {
            commands::boilerplates(&config, &registry, problem, expect).await?;
        }
        Commands::Import {
            file,
            params,
            template,
            return_type,
        } => {
            let parameters = commands::parse_params(&params)?;
            match file {
                Some(file) if !template => commands::import(&file, &parameters)?,
                _ => commands::template(&parameters, return_type.as_deref()),
            }
        }
    }

    if cli.metrics {
        commands::print_metrics(&registry)?;
    }

    Ok(())
}
