use chrono::Local;
use clap::{Parser, ValueEnum};
use serial_duplex::config::{Config, ConfigLoader};
use serial_duplex::{
    logging, DataBits, Notification, Parity, PortConfig, PortSession, SessionOptions, StopBits,
};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "serial-duplex",
    version,
    about = "Full-duplex serial terminal: stdin goes out, device data comes back.",
    long_about = "Opens one serial session (or two independent ones with --rx-port), sends every stdin line to the device and prints whatever the device sends back. Ctrl-C closes all sessions."
)]
struct Args {
    /// Device for the send channel; it also receives unless --rx-port is set.
    #[arg(short, long)]
    port: String,

    /// Separate device for a receive-only channel.
    #[arg(long)]
    rx_port: Option<String>,

    /// Baud rate (default from config).
    #[arg(short, long)]
    baud: Option<u32>,

    /// Data bits: 5, 6, 7 or 8.
    #[arg(long)]
    data_bits: Option<DataBits>,

    /// Parity: none, even, odd, space or mark.
    #[arg(long)]
    parity: Option<Parity>,

    /// Stop bits: 1, 1.5 or 2.
    #[arg(long)]
    stop_bits: Option<StopBits>,

    /// Terminator appended to each stdin line.
    #[arg(long, value_enum, default_value_t = LineEnding::Lf)]
    eol: LineEnding,

    /// Print received data as hex dumps.
    #[arg(long, conflicts_with = "json")]
    hex: bool,

    /// Print every notification as a JSON line.
    #[arg(long)]
    json: bool,

    /// Keep receiving after stdin ends, until Ctrl-C.
    #[arg(long)]
    keep_open: bool,

    /// Configuration file to use instead of the standard locations.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LineEnding {
    Lf,
    Crlf,
    None,
}

impl LineEnding {
    fn bytes(self) -> &'static [u8] {
        match self {
            Self::Lf => b"\n",
            Self::Crlf => b"\r\n",
            Self::None => b"",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Output {
    Text,
    Hex,
    Json,
}

impl Args {
    fn link(&self, config: &Config) -> PortConfig {
        let mut link = config.serial.port_config();
        if let Some(baud) = self.baud {
            link.baud_rate = baud;
        }
        if let Some(data_bits) = self.data_bits {
            link.data_bits = data_bits;
        }
        if let Some(parity) = self.parity {
            link.parity = parity;
        }
        if let Some(stop_bits) = self.stop_bits {
            link.stop_bits = stop_bits;
        }
        link
    }

    fn output(&self) -> Output {
        if self.json {
            Output::Json
        } else if self.hex {
            Output::Hex
        } else {
            Output::Text
        }
    }
}

// --- Main Application Entry Point ---
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?.into_config(),
        None => match ConfigLoader::load() {
            Ok(loader) => loader.into_config(),
            Err(e) => {
                eprintln!("Warning: Failed to load config, using defaults: {}", e);
                ConfigLoader::with_defaults().into_config()
            }
        },
    };
    logging::init(&config.logging);

    let link = args.link(&config);
    let options = config.serial.session_options();
    let output = args.output();

    let mut sessions = Vec::new();
    let mut printers = Vec::new();

    let tx_port = config.serial.resolve_port(&args.port);
    let rx_port = args.rx_port.as_deref().map(|name| config.serial.resolve_port(name));
    let channels = std::iter::once(("tx", tx_port)).chain(rx_port.map(|port| ("rx", port)));

    for (label, port) in channels {
        let (session, printer) = start_session(label, options, output);
        printers.push(printer);
        if !session.open(&port, link) {
            drop(session);
            shutdown(sessions, printers, None).await?;
            return Err(format!("could not open {port}").into());
        }
        info!("{} channel open on {} ({})", label, port, link);
        sessions.push(session);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    // Piped input must reach the device before the session closes
    let mut flush_before_close = None;
    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => {
                    let mut bytes = line.into_bytes();
                    bytes.extend_from_slice(args.eol.bytes());
                    sessions[0].send(bytes);
                }
                None if args.keep_open => stdin_open = false,
                None => {
                    flush_before_close = Some(options.close_timeout);
                    break;
                }
            },
            _ = shutdown_signal() => break,
        }
    }

    shutdown(sessions, printers, flush_before_close).await
}

/// Build a session whose notifications are printed by a background task.
fn start_session(
    label: &'static str,
    options: SessionOptions,
    output: Output,
) -> (PortSession, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let session = PortSession::builder().options(options).build_with_sink(tx);
    let printer = tokio::spawn(print_events(label, rx, output));
    (session, printer)
}

/// Close every session off the async runtime, then drain the printers.
///
/// With `flush` set, each session first gets that long to transmit what was
/// already sent.
async fn shutdown(
    sessions: Vec<PortSession>,
    printers: Vec<JoinHandle<()>>,
    flush: Option<Duration>,
) -> Result<(), Box<dyn std::error::Error>> {
    // flush() and close() both block on the pump
    tokio::task::spawn_blocking(move || {
        for session in &sessions {
            if let Some(timeout) = flush {
                if !session.flush(timeout) {
                    warn!(
                        "{} buffer(s) still unsent after {:?}; closing anyway",
                        session.stats().pending_writes(),
                        timeout
                    );
                }
            }
            session.close();
        }
    })
    .await?;

    for printer in printers {
        printer.await?;
    }
    Ok(())
}

async fn print_events(
    label: &'static str,
    mut events: mpsc::UnboundedReceiver<Notification>,
    output: Output,
) {
    while let Some(notification) = events.recv().await {
        let now = Local::now();
        match (output, notification) {
            (Output::Json, notification) => {
                let line = serde_json::json!({
                    "channel": label,
                    "at": now.to_rfc3339(),
                    "notification": notification,
                });
                println!("{}", line);
            }
            (Output::Text, Notification::DataReceived(bytes)) => {
                let mut stdout = std::io::stdout().lock();
                let _ = stdout.write_all(&bytes);
                let _ = stdout.flush();
            }
            (Output::Hex, Notification::DataReceived(bytes)) => {
                println!(
                    "[{}] {} RX {:>4} bytes: {}",
                    now.format("%H:%M:%S%.3f"),
                    label,
                    bytes.len(),
                    hex_dump(&bytes)
                );
            }
            (_, Notification::ErrorOccurred { message, .. }) => {
                eprintln!("[{}] {} error: {}", now.format("%H:%M:%S%.3f"), label, message);
            }
            (_, Notification::PortClosed) => {
                eprintln!("[{}] {} closed", now.format("%H:%M:%S%.3f"), label);
            }
        }
    }
}

fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

// --- Graceful Shutdown Handler ---
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    eprintln!("\nSignal received, closing sessions...");
}
