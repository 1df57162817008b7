use clap::{Args, Subcommand, ValueEnum};
use dockwire_frame::StreamKind;
use dockwire_session::CancelHandle;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crate::exit::{io_error, CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod demux;
pub mod envinfo;
pub mod progress;
pub mod version;
pub mod ws_probe;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Demultiplex a captured raw-stream body and print each frame.
    Demux(DemuxArgs),
    /// Drain a JSON progress or event stream and print each record.
    Progress(ProgressArgs),
    /// Perform a WebSocket upgrade against the engine and report the result.
    WsProbe(WsProbeArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Print build and environment diagnostics.
    Envinfo(EnvinfoArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Demux(args) => demux::run(args, format),
        Command::Progress(args) => progress::run(args, format),
        Command::WsProbe(args) => ws_probe::run(args, format),
        Command::Version(args) => version::run(args),
        Command::Envinfo(args) => envinfo::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct DemuxArgs {
    /// Read the body from a file instead of stdin.
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,
    /// Streams to print (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "stdout,stderr,stdin")]
    pub streams: Vec<StreamKind>,
    /// Stop after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Reject frames whose payload exceeds this many bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_payload: Option<usize>,
}

/// Record type carried by a progress stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProgressKind {
    Build,
    Pull,
    Push,
    Events,
}

impl ProgressKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Pull => "pull",
            Self::Push => "push",
            Self::Events => "events",
        }
    }
}

#[derive(Args, Debug)]
pub struct ProgressArgs {
    /// Record type of the stream.
    #[arg(long, value_enum)]
    pub kind: ProgressKind,
    /// Read the body from a file instead of stdin.
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,
    /// Reject JSON units larger than this many bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_unit_size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct WsProbeArgs {
    /// Engine address (unix:///path or tcp://host:port). Default: DOCKER_HOST.
    #[arg(long, value_name = "ADDRESS")]
    pub host: Option<String>,
    /// Endpoint path, e.g. /containers/ID/attach/ws.
    pub path: String,
    /// Query parameter as key=value (repeatable).
    #[arg(long, value_name = "KEY=VALUE", value_parser = parse_query_pair)]
    pub query: Vec<(String, String)>,
    /// Connect and handshake timeout (e.g. 30s, 500ms). Default: 30s.
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct EnvinfoArgs {}

/// Open the captured body: a file, or stdin when no path is given.
fn open_input(path: Option<&Path>) -> CliResult<Box<dyn Read + Send>> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .map_err(|err| io_error(&format!("cannot open {}", path.display()), err))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(std::io::stdin())),
    }
}

/// Cancel the running drain on Ctrl-C.
fn install_ctrlc_handler(handle: CancelHandle) -> CliResult<()> {
    ctrlc::set_handler(move || handle.cancel())
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

fn parse_query_pair(input: &str) -> Result<(String, String), String> {
    match input.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{input}'")),
    }
}
