//! CloudStack CLI binary entrypoint.
//!
//! This is the main entry point for the `cloudstack` command-line tool.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cs_api::CancellationToken;
use cs_cli::{Cli, connect, run};

fn main() -> ExitCode {
    // Parse CLI arguments; clap exits with status 2 on malformed input
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    // One command at a time, so a single-threaded runtime is enough
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let result = runtime.block_on(async {
        let ctrl_c = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                ctrl_c.cancel();
            }
        });

        let mut stdout = io::stdout().lock();
        let mut stderr = io::stderr();
        run(&cli, connect, cancel, &mut stdout, &mut stderr).await
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use cs_cli::Format;
    use cs_cli::cli::Commands;

    #[test]
    fn cli_parses_list_zones() {
        let cli = Cli::parse_from(["cloudstack", "listZones"]);
        assert!(matches!(cli.command, Commands::ListZones));
    }

    #[test]
    fn cli_respects_format_flag() {
        let cli = Cli::parse_from(["cloudstack", "--format", "json", "listZones"]);
        assert_eq!(cli.format, Format::Json);
    }

    #[test]
    fn cli_respects_verbose_flag() {
        let cli = Cli::parse_from(["cloudstack", "--verbose", "listZones"]);
        assert!(cli.verbose);
    }
}
