use std::collections::BTreeMap;

use espat_command::{DESCRIPTORS, MAX_SEND_LEN};
use espat_transport::TX_CHUNK_MAX;
use serde::Serialize;

use crate::cmd::AboutArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct AboutOutput {
    schema_id: &'static str,
    name: &'static str,
    version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    build: Option<BuildInfo>,
}

#[derive(Serialize)]
struct BuildInfo {
    target: String,
    rust_version: String,
    git_hash: String,
    commands: Vec<&'static str>,
    limits: BTreeMap<&'static str, usize>,
    environment: BTreeMap<&'static str, Option<String>>,
}

pub fn run(args: AboutArgs, format: OutputFormat) -> CliResult<i32> {
    let output = AboutOutput {
        schema_id: "https://schemas.3leaps.dev/espat/cli/v1/about.schema.json",
        name: "espat",
        version: env!("CARGO_PKG_VERSION"),
        build: args.extended.then(build_info),
    };
    print_about(&output, format);
    Ok(SUCCESS)
}

fn build_info() -> BuildInfo {
    let mut limits = BTreeMap::new();
    limits.insert("tx_chunk_bytes", TX_CHUNK_MAX);
    limits.insert("max_payload_bytes", MAX_SEND_LEN);

    let mut environment = BTreeMap::new();
    for key in ["ESPAT_DEVICE", "ESPAT_CONFIG", "RUST_LOG"] {
        environment.insert(key, std::env::var(key).ok());
    }

    BuildInfo {
        target: target_triple(),
        rust_version: option_env!("RUSTC_VERSION")
            .unwrap_or("unknown")
            .to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        commands: DESCRIPTORS.iter().map(|d| d.name).collect(),
        limits,
        environment,
    }
}

fn target_triple() -> String {
    if let Some(target) = option_env!("ESPAT_BUILD_TARGET") {
        return target.to_string();
    }

    match (std::env::consts::ARCH, std::env::consts::OS) {
        ("aarch64", "macos") => "aarch64-apple-darwin".to_string(),
        ("x86_64", "macos") => "x86_64-apple-darwin".to_string(),
        ("aarch64", "linux") => "aarch64-unknown-linux-gnu".to_string(),
        ("x86_64", "linux") => "x86_64-unknown-linux-gnu".to_string(),
        ("x86_64", "windows") => "x86_64-pc-windows-msvc".to_string(),
        (arch, os) => format!("{arch}-unknown-{os}"),
    }
}

fn print_about(output: &AboutOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Raw => println!("{}", output.version),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("{} {}", output.name, output.version);
            let Some(build) = &output.build else {
                return;
            };
            println!();
            println!("  Target:     {}", build.target);
            println!("  Rust:       {}", build.rust_version);
            println!("  Git hash:   {}", build.git_hash);
            println!("  Commands:   {}", build.commands.join(", "));
            println!("\n  Limits:");
            for (k, v) in &build.limits {
                println!("    {:<18} {}", k, v);
            }
            println!("\n  Environment:");
            for (k, v) in &build.environment {
                println!("    {:<14} {}", k, v.as_deref().unwrap_or("(not set)"));
            }
        }
    }
}
