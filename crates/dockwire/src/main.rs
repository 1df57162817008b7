mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "dockwire", version, about = "Container engine stream inspector")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use dockwire_frame::StreamKind;

    use super::*;
    use crate::cmd::ProgressKind;

    #[test]
    fn parses_demux_subcommand() {
        let cli = Cli::try_parse_from([
            "dockwire",
            "demux",
            "--input",
            "/tmp/attach.bin",
            "--streams",
            "stdout,stderr",
        ])
        .expect("demux args should parse");

        let Command::Demux(args) = cli.command else {
            panic!("expected demux");
        };
        assert_eq!(args.streams, vec![StreamKind::Stdout, StreamKind::Stderr]);
    }

    #[test]
    fn rejects_unknown_stream_name() {
        let err = Cli::try_parse_from(["dockwire", "demux", "--streams", "stdout,tty"])
            .expect_err("unknown stream should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn progress_requires_kind() {
        let err = Cli::try_parse_from(["dockwire", "progress"])
            .expect_err("missing --kind should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let cli = Cli::try_parse_from(["dockwire", "progress", "--kind", "pull"])
            .expect("progress args should parse");
        let Command::Progress(args) = cli.command else {
            panic!("expected progress");
        };
        assert_eq!(args.kind, ProgressKind::Pull);
    }

    #[test]
    fn parses_ws_probe_query_pairs() {
        let cli = Cli::try_parse_from([
            "dockwire",
            "--format",
            "json",
            "ws-probe",
            "/containers/abc/attach/ws",
            "--query",
            "stream=1",
            "--query",
            "stdout=1",
            "--timeout",
            "500ms",
        ])
        .expect("ws-probe args should parse");

        let Command::WsProbe(args) = cli.command else {
            panic!("expected ws-probe");
        };
        assert_eq!(args.query.len(), 2);
        assert_eq!(args.timeout.as_deref(), Some("500ms"));
    }
}
