use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use gcode_sender::{send_file, Config, FramingMode, TracingSink};

#[derive(Parser, Debug)]
#[command(name = "gcode-send", version, about = "Send a G-code file to a machine-control service")]
struct Args {
    /// G-code file to send
    #[arg(short, long)]
    file: PathBuf,

    /// IP address or host name of the machine-control computer
    #[arg(short, long)]
    address: Option<String>,

    /// Service port
    #[arg(short, long)]
    port: Option<u16>,

    /// JSON config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Deadline in seconds for connecting and for each read and write
    #[arg(long)]
    timeout: Option<f64>,

    /// How status and ack messages are framed
    #[arg(long, value_enum)]
    framing: Option<Framing>,

    /// Enable verbose logs
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Framing {
    SingleRead,
    Incremental,
}

impl From<Framing> for FramingMode {
    fn from(framing: Framing) -> Self {
        match framing {
            Framing::SingleRead => FramingMode::SingleRead,
            Framing::Incremental => FramingMode::Incremental,
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_config(args: &Args) -> gcode_sender::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    if let Some(address) = &args.address {
        config.host = address.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(framing) = args.framing {
        config.framing = framing.into();
    }
    if let Some(secs) = args.timeout {
        if !secs.is_finite() || secs <= 0.0 {
            return Err(gcode_sender::Error::config(format!(
                "timeout must be a positive number of seconds, got {}",
                secs
            )));
        }
        let timeout = Duration::try_from_secs_f64(secs).map_err(|e| {
            gcode_sender::Error::config(format!("timeout {} seconds is out of range: {}", secs, e))
        })?;
        config = config.with_timeout(timeout);
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(
        file = %args.file.display(),
        address = %config.host,
        port = config.port,
        "sending gcode file"
    );

    match send_file(&config, &args.file, TracingSink).await {
        Ok(report) => {
            debug!(
                size = report.bytes_sent,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "transfer acknowledged"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, kind = e.kind().as_str(), file = %args.file.display(), "transfer failed");
            ExitCode::FAILURE
        }
    }
}
