// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sc_logging::CliLoggingArgs;
use sc_probes::{registry, ProbeError};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "probe-manifest",
    about = "Describe the syscall contract probes and the fixture grants each one needs."
)]
struct Cli {
    #[command(flatten)]
    logging: CliLoggingArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every probe name with its contract family.
    List,
    /// Print the JSON manifest of one probe.
    Show { name: String },
    /// Write `<name>.json` for every probe into a directory.
    Write {
        #[arg(long)]
        out_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.logging.init("probe-manifest")?;

    match cli.command {
        Command::List => {
            for probe in registry::PROBES {
                println!("{}\t{}", probe.name, probe.family);
            }
        }
        Command::Show { name } => {
            let probe = registry::find(&name).ok_or(ProbeError::UnknownProbe(name))?;
            println!("{}", serde_json::to_string_pretty(&probe.manifest())?);
        }
        Command::Write { out_dir } => {
            fs::create_dir_all(&out_dir)
                .with_context(|| format!("creating {}", out_dir.display()))?;
            for probe in registry::PROBES {
                let path = out_dir.join(format!("{}.json", probe.name));
                let json = serde_json::to_string_pretty(&probe.manifest())?;
                fs::write(&path, json + "\n")
                    .with_context(|| format!("writing {}", path.display()))?;
                info!(probe = probe.name, path = %path.display(), "manifest written");
            }
        }
    }

    Ok(())
}
