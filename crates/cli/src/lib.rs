pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use outreach_agent::pipeline::DEFAULT_INACTIVE_MARKER;

#[derive(Debug, Parser)]
#[command(
    name = "outreach",
    about = "Outreach lead queue operator CLI",
    long_about = "Inspect configuration, check lead sheet readiness, report queue statistics, \
                  return stale claims to the queue, and run the lead-generation pipeline.",
    after_help = "Examples:\n  outreach doctor --json\n  outreach stats\n  \
                  outreach pipeline filter chats.json inactive.json\n  \
                  outreach pipeline extract inactive.json leads.json\n  \
                  outreach pipeline import leads.json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, bot token readiness, and lead sheet connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Report queue statistics from the lead sheet")]
    Stats,
    #[command(about = "Return stale in-progress claims to the queue")]
    Reclaim,
    /// Lead generation from an exported chat list
    #[command(subcommand)]
    Pipeline(PipelineCommand),
}

#[derive(Debug, Subcommand)]
enum PipelineCommand {
    #[command(about = "Keep group chats whose title carries the inactive marker")]
    Filter {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, default_value = DEFAULT_INACTIVE_MARKER)]
        marker: String,
        #[arg(long, help = "Also write the intermediate group/channel list here")]
        groups_output: Option<PathBuf>,
    },
    #[command(about = "Extract names and companies from chat titles with the configured LLM")]
    Extract {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, help = "Titles per LLM request (defaults to llm.batch_size)")]
        batch_size: Option<usize>,
    },
    #[command(about = "Append extracted leads to the lead sheet")]
    Import { input: PathBuf },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Stats => commands::stats::run(),
        Command::Reclaim => commands::reclaim::run(),
        Command::Pipeline(PipelineCommand::Filter { input, output, marker, groups_output }) => {
            commands::pipeline::filter(&input, &output, &marker, groups_output.as_deref())
        }
        Command::Pipeline(PipelineCommand::Extract { input, output, batch_size }) => {
            commands::pipeline::extract(&input, &output, batch_size)
        }
        Command::Pipeline(PipelineCommand::Import { input }) => {
            commands::pipeline::import(&input)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Diagnostics go to stderr so stdout stays machine-readable.
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
