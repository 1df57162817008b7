use std::collections::BTreeMap;

use dockwire_transport::{EngineConfig, ENV_API_VERSION, ENV_HOST};
use serde::Serialize;

use crate::cmd::EnvinfoArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

/// Variables reported verbatim. Credentials never appear here.
const REPORTED_ENV: [&str; 3] = [ENV_HOST, ENV_API_VERSION, "RUST_LOG"];

#[derive(Serialize)]
struct PlatformInfo {
    os: String,
    arch: String,
}

#[derive(Serialize)]
struct EngineInfo {
    address: String,
    transport: &'static str,
    api_version: Option<String>,
    connect_timeout_ms: u128,
    /// Debug rendering; registry credentials are redacted.
    resolved: String,
}

#[derive(Serialize)]
struct EnvInfoOutput {
    version: String,
    target: String,
    rust_version: String,
    git_hash: String,
    platform: PlatformInfo,
    features: Vec<String>,
    dependencies: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    engine: Option<EngineInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    engine_error: Option<String>,
    environment: BTreeMap<String, Option<String>>,
}

pub fn run(_args: EnvinfoArgs, format: OutputFormat) -> CliResult<i32> {
    let mut deps = BTreeMap::new();
    deps.insert("clap".to_string(), "4.5".to_string());
    deps.insert("serde_json".to_string(), "1.0".to_string());
    deps.insert("tokio-util".to_string(), "0.7".to_string());

    let environment = REPORTED_ENV
        .iter()
        .map(|key| (key.to_string(), std::env::var(key).ok()))
        .collect();

    let (engine, engine_error) = match EngineConfig::from_env() {
        Ok(config) => (Some(engine_info(&config)), None),
        Err(err) => (None, Some(err.to_string())),
    };

    let output = EnvInfoOutput {
        version: env!("CARGO_PKG_VERSION").to_string(),
        target: target_triple(),
        rust_version: option_env!("RUSTC_VERSION")
            .unwrap_or("unknown")
            .to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        platform: PlatformInfo {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        },
        features: active_features(),
        dependencies: deps,
        engine,
        engine_error,
        environment,
    };

    print_envinfo(&output, format);
    Ok(SUCCESS)
}

fn engine_info(config: &EngineConfig) -> EngineInfo {
    EngineInfo {
        address: config.address.to_string(),
        transport: config.address.transport_name(),
        api_version: config.api_version.clone(),
        connect_timeout_ms: config.connect_timeout.as_millis(),
        resolved: format!("{config:?}"),
    }
}

fn target_triple() -> String {
    if let Some(target) = option_env!("DOCKWIRE_BUILD_TARGET") {
        return target.to_string();
    }

    match (std::env::consts::ARCH, std::env::consts::OS) {
        ("aarch64", "macos") => "aarch64-apple-darwin".to_string(),
        ("x86_64", "macos") => "x86_64-apple-darwin".to_string(),
        ("aarch64", "linux") => "aarch64-unknown-linux-gnu".to_string(),
        ("x86_64", "linux") => "x86_64-unknown-linux-gnu".to_string(),
        (arch, os) => format!("{arch}-unknown-{os}"),
    }
}

fn print_envinfo(output: &EnvInfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("dockwire environment\n");
            println!("  Version:    {}", output.version);
            println!("  Target:     {}", output.target);
            println!("  Rust:       {}", output.rust_version);
            println!("  Git hash:   {}", output.git_hash);
            println!(
                "  Platform:   {} ({})",
                output.platform.os, output.platform.arch
            );
            println!("  Features:   {}", output.features.join(", "));
            println!("\n  Engine:");
            if let Some(engine) = &output.engine {
                println!("    {:<16} {}", "address", engine.address);
                println!("    {:<16} {}", "transport", engine.transport);
                println!(
                    "    {:<16} {}",
                    "api_version",
                    engine.api_version.as_deref().unwrap_or("(engine default)")
                );
                println!("    {:<16} {} ms", "connect_timeout", engine.connect_timeout_ms);
            }
            if let Some(err) = &output.engine_error {
                println!("    (invalid) {err}");
            }
            println!("\n  Dependencies:");
            for (k, v) in &output.dependencies {
                println!("    {:<12} {}", k, v);
            }
            println!("\n  Environment:");
            for (k, v) in &output.environment {
                println!("    {:<20} {}", k, v.as_deref().unwrap_or("(not set)"));
            }
        }
        OutputFormat::Raw => println!("{}", output.version),
    }
}

fn active_features() -> Vec<String> {
    let mut features = Vec::new();
    if cfg!(feature = "async") {
        features.push("async".to_string());
    }
    if cfg!(feature = "cli") {
        features.push("cli".to_string());
    }
    features
}
