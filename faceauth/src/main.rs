mod app;
mod prompt;
mod render;

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use faceauth_client::{ClientConfig, EventName, Session};

#[derive(Parser)]
#[command(name = "faceauth")]
#[command(about = "Enroll and verify faces against a face authentication service")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/faceauth/config.json, then /etc/faceauth/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Service base URL, e.g. http://localhost:8000/api
    #[arg(long, global = true)]
    url: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show service status and enrolled user count
    Health,
    /// List enrolled users
    Users,
    /// Enroll a face image
    Enroll {
        #[arg(short, long)]
        image: PathBuf,
        /// Defaults to the current login name
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Verify a face for an event
    Verify {
        /// Bearer token authorizing the event
        #[arg(short, long)]
        token: String,
        #[arg(short, long, default_value_t = EventName::LoginEvent)]
        event: EventName,
        #[arg(short, long, conflicts_with = "camera", required_unless_present = "camera")]
        image: Option<PathBuf>,
        /// Capture a frame from the configured camera
        #[arg(long)]
        camera: bool,
    },
    /// Delete a user's face data
    Delete {
        #[arg(short, long)]
        user: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// List video devices
    Cameras,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    let mut config = ClientConfig::discover(cli.config.as_deref())?;
    if let Some(url) = cli.url {
        config.service.base_url = url;
        config.validate()?;
    }

    init_logging(cli.verbose, config.logging.file.as_deref())?;
    log::debug!("Using service at {}", config.service.base_url);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    let session = Session::connect(&config);
    render::attach(session.notifier());

    runtime.block_on(app::execute(&session, cli.command))
}

fn init_logging(verbose: bool, file: Option<&Path>) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));

    if let Some(path) = file {
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        builder
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{} - {} - {} - {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                    record.target(),
                    record.level(),
                    record.args()
                )
            })
            .target(env_logger::Target::Pipe(Box::new(Tee { file: log_file })));
    }

    builder.init();
    Ok(())
}

/// Sends log output to stderr and the log file.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}
