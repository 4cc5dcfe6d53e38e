//! Deployer - Entry Point
//!
//! Starts the deployment server, or runs a single deployment with `--once`.

use std::env;
use std::process::ExitCode;

use anyhow::Context;
use deployer::app::options::parse_args;
use deployer::app::run::{run, run_once};
use deployer::filesys::file::File;
use deployer::logs::init_logging;
use deployer::storage::settings::Settings;
use deployer::utils::version_info;

use tracing::{error, info};

const USAGE: &str = "\
Usage: deployer [options] [port]
  starts a deployment server on the given port, default 3470.
Options take their value as --option=value or --option value.
At least one of these options should be enabled:
    --dir <path>       Directory to deploy to
    --testdir <path>   Directory with a test environment
Optional options:
    --token <token>    Security token for the URL
    --name <name>      Package name to show in messages
    --noinst           Do not install dependencies
    --exec <command>   Command to run after success
    --update <command> Command that updates a directory, default git pull
    --install <command> Command that installs dependencies, default npm install
    --test <command>   Command that runs the tests, default npm test
    --timeout <secs>   Timeout for each command, default 60
    --quiet            Only show notices and errors
    --detail           Show log and diff of code to deploy
    --bind <address>   Address to listen on, default 0.0.0.0
    --config <path>    JSON settings file; flags override it
    --once             Deploy now and exit instead of serving
Email-related options:
    --from <email>     Email address that generates the message
    --to <email>       Destination for deployment message
    --host <host>      Host for email server; without it sendmail is used
    --user <user>      User for email server
    --password <pwd>   Password for email server
    --ssl [boolean]    true to use SSL with the email server
    --sendmail <cmd>   Command that sends the message, default sendmail -t -i";

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let cli_args = match parse_args(env::args().skip(1)) {
        Ok(cli_args) => cli_args,
        Err(e) => {
            println!("{e}");
            println!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    if cli_args.contains_key("help") || cli_args.contains_key("h") {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{version}"),
            Err(e) => println!("Failed to print version: {e}"),
        }
        return ExitCode::SUCCESS;
    }

    // Retrieve the settings file
    let settings = match cli_args.get("config") {
        Some(path) => match load_settings(path).await {
            Ok(settings) => settings,
            Err(e) => {
                println!("{e:#}");
                return ExitCode::FAILURE;
            }
        },
        None => Settings::default(),
    };

    // Initialize logging
    let _log_guard = match init_logging(settings.log_options()) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    let mut options = settings.app_options();
    if let Err(e) = options.apply_args(&cli_args) {
        error!("{}", e);
        println!("{USAGE}");
        return ExitCode::FAILURE;
    }

    if cli_args.contains_key("once") {
        let result = run_once(options).await;
        return if result.success {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    info!("Running deployment server with options: {:?}", options);
    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Failed to run the deployment server: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn load_settings(path: &str) -> anyhow::Result<Settings> {
    File::new(path)
        .read_json::<Settings>()
        .await
        .with_context(|| format!("Unable to read settings file {path}"))
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Failed to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
        }
        info!("Ctrl+C received, shutting down...");
    }
}
