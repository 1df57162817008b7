use std::net::Shutdown;
use std::time::{Duration, Instant};

use dockwire_session::websocket::{self, WebSocketConfig};
use dockwire_transport::{EngineAddress, EngineConfig, ENV_HOST};
use serde::Serialize;
use tracing::debug;

use crate::cmd::WsProbeArgs;
use crate::exit::{session_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{now_unix_seconds, OutputFormat};

#[derive(Serialize)]
struct ProbeOutput {
    address: String,
    transport: &'static str,
    path: String,
    upgraded: bool,
    elapsed_ms: u128,
    timestamp: String,
}

pub fn run(args: WsProbeArgs, format: OutputFormat) -> CliResult<i32> {
    let mut engine = resolve_engine(args.host.as_deref())?;
    if let Some(timeout) = args.timeout.as_deref() {
        engine.connect_timeout = parse_duration(timeout)?;
    }

    let config = WebSocketConfig::from(&engine);
    let address = &engine.address;
    let path = engine.versioned_path(&args.path);

    let started = Instant::now();
    let target = websocket::request_target(&path, args.query.clone());
    let stream = websocket::connect_with_config(address, &path, args.query, &config)
        .map_err(|err| session_error("websocket upgrade failed", err))?;
    let elapsed = started.elapsed();

    let output = ProbeOutput {
        address: address.to_string(),
        transport: stream.transport_name(),
        path: target,
        upgraded: true,
        elapsed_ms: elapsed.as_millis(),
        timestamp: now_unix_seconds(),
    };

    // The probe never speaks the WebSocket protocol; close right away.
    if let Err(err) = stream.shutdown(Shutdown::Both) {
        debug!(error = %err, "failed to close probed socket");
    }

    print_probe(&output, format);
    Ok(SUCCESS)
}

/// Engine settings from the environment, with `--host` taking precedence
/// over `DOCKER_HOST`.
fn resolve_engine(host: Option<&str>) -> CliResult<EngineConfig> {
    let Some(host) = host else {
        return EngineConfig::from_env()
            .map_err(|err| transport_error("invalid engine configuration", err));
    };

    let address: EngineAddress = host
        .parse()
        .map_err(|err| transport_error("invalid --host", err))?;
    let config = EngineConfig::from_lookup(|key| {
        if key == ENV_HOST {
            None
        } else {
            std::env::var(key).ok()
        }
    })
    .map_err(|err| transport_error("invalid engine configuration", err))?;
    Ok(config.with_address(address))
}

fn print_probe(output: &ProbeOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("websocket upgrade established\n");
            println!("  Address:    {}", output.address);
            println!("  Transport:  {}", output.transport);
            println!("  Path:       {}", output.path);
            println!("  Elapsed:    {} ms", output.elapsed_ms);
        }
        OutputFormat::Raw => println!("{}", output.upgraded),
    }
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(number) => (number, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
