//! license-activator - command-line front end for license activation

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use license_activator_lib::display::{Console, Labels, LineKind};
use license_activator_lib::licensing::config::{
    self, resolve_api_url, API_URL_ENV, DEFAULT_MAX_REFRESH_ATTEMPTS, SINK_FILE_NAME,
};
use license_activator_lib::licensing::{
    AuthManager, ConfigStore, FileCredentialSink, Fingerprint, LicenseClient,
};

/// License activation and token refresh
#[derive(Parser)]
#[command(name = "license-activator", version, about)]
struct Cli {
    /// License server base URL (overrides the stored URL and LICENSE_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Path of the credential document
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Where activated credentials are written for the host application
    #[arg(long, global = true)]
    sink_path: Option<PathBuf>,

    /// Output JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    /// Plain-text labels instead of emoji
    #[arg(long, global = true)]
    plain: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the license and activate a token on this machine
    Activate {
        /// Activation code (prompted for when needed and not given)
        #[arg(long)]
        code: Option<String>,
    },

    /// Forget the stored license and activate with a new code
    Reactivate {
        /// Activation code (prompted for when not given)
        #[arg(long)]
        code: Option<String>,
    },

    /// Show the stored license status
    Status,

    /// Verify a token and re-activate it if needed
    Refresh {
        /// Token to keep alive
        #[arg(long)]
        token: String,

        /// Maximum activation attempts
        #[arg(long, default_value_t = DEFAULT_MAX_REFRESH_ATTEMPTS)]
        attempts: u32,

        /// Pause between failed attempts, in milliseconds
        #[arg(long, default_value_t = 0)]
        retry_delay_ms: u64,
    },

    /// Print this machine's fingerprint
    Fingerprint,
}

fn prompt_activation_code() -> String {
    print!("Activation code: ");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
    line.trim().to_string()
}

fn code_source(code: Option<String>) -> impl FnOnce() -> String {
    move || code.unwrap_or_else(prompt_activation_code)
}

fn build_manager(
    config_path: Option<PathBuf>,
    sink_path: Option<PathBuf>,
    api_url: Option<&str>,
) -> Result<AuthManager<FileCredentialSink>> {
    let store = match config_path {
        Some(path) => ConfigStore::at(path),
        None => ConfigStore::new().context("Could not determine config directory")?,
    };

    let sink_path = match sink_path {
        Some(path) => path,
        None => config::config_dir()
            .context("Could not determine config directory")?
            .join(SINK_FILE_NAME),
    };

    // One load serves both the URL layering and the manager's record
    let record = store.load();
    let api_url = resolve_api_url(&record.api_url, std::env::var(API_URL_ENV).ok(), api_url);
    let client = LicenseClient::new(api_url).context("Failed to set up license client")?;

    Ok(AuthManager::with_parts(
        store,
        record,
        client,
        FileCredentialSink::new(sink_path),
        Fingerprint::compute(),
    ))
}

async fn run(cli: Cli, console: &mut Console<io::Stdout>) -> Result<bool> {
    let Cli {
        api_url,
        config: config_path,
        sink_path,
        command,
        ..
    } = cli;

    if let Commands::Fingerprint = command {
        console.value("fingerprint", &Fingerprint::compute());
        return Ok(true);
    }

    let mut manager = build_manager(config_path, sink_path, api_url.as_deref())?;

    let ok = match command {
        Commands::Activate { code } => {
            console.banner("License activation");
            manager.process(code_source(code)).await
        }
        Commands::Reactivate { code } => {
            console.banner("License re-activation");
            manager.reactivate(code_source(code)).await
        }
        Commands::Status => {
            let status = manager.check_license().await;
            console.status(&status);
            status.is_valid()
        }
        Commands::Refresh {
            token,
            attempts,
            retry_delay_ms,
        } => {
            let manager = manager.with_retry_delay(Duration::from_millis(retry_delay_ms));
            match manager.refresh(&token, attempts).await {
                Ok(token) => {
                    console.value("token", &token);
                    true
                }
                Err(e) => {
                    console.line(LineKind::Error, &e.to_string());
                    false
                }
            }
        }
        Commands::Fingerprint => true,
    };

    Ok(ok)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    license_activator_lib::init_tracing(if cli.verbose { "debug" } else { "warn" });

    let labels = if cli.plain { Labels::plain() } else { Labels::default() };
    let mut console = Console::new(io::stdout(), labels, cli.json);

    match run(cli, &mut console).await {
        Ok(true) => {
            console.line(LineKind::Success, "Done");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            console.line(LineKind::Error, "Failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            console.line(LineKind::Error, &format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
