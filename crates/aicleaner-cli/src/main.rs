// AICleaner CLI entry point

use aicleaner_cli::{init_logging, output, Cli, CliError, CommandRouter, VerbosityLevel};
use anyhow::Context;
use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet, cli.log_level.as_deref());

    if let Err(e) = run(&cli).await {
        match e.downcast_ref::<CliError>() {
            Some(cli_error) => {
                output::print_error(&cli_error.user_message());
                if VerbosityLevel::Verbose.should_output() {
                    eprintln!("{}", cli_error.technical_details());
                }
            }
            None => output::print_error(&format!("{:#}", e)),
        }
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    CommandRouter::execute(cli)
        .await
        .map_err(anyhow::Error::from)
        .with_context(|| format!("aicleaner {} failed", cli.command.name()))
}
