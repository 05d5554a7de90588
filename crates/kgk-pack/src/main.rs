// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Bundle tooling for KGKB resource packs
// Run with: kgk-pack <command>

mod commands;
mod helpers;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::pack::PackOptions;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "kgk-pack", version, about = "Build, inspect, verify and unpack KGKB bundles")]
struct Cli {
    /// Log debug output (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pack source directories into a bundle (configured by Pack.toml).
    Pack {
        /// Directories to pack; overrides the manifest's `source_directories`.
        sources: Vec<PathBuf>,
        /// Output bundle; overrides the manifest's `output`.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Store every entry uncompressed.
        #[arg(long)]
        no_compress: bool,
        /// Manifest to read.
        #[arg(long, default_value = "Pack.toml")]
        manifest: PathBuf,
    },
    /// List the entries of a bundle.
    List { bundle: PathBuf },
    /// Check every entry's CRC32.
    Verify { bundle: PathBuf },
    /// Write every entry of a bundle below a directory.
    Extract { bundle: PathBuf, dest: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Command::Pack {
            sources,
            output,
            no_compress,
            manifest,
        } => commands::pack::pack(&PackOptions {
            manifest,
            sources,
            output,
            no_compress,
        }),
        Command::List { bundle } => commands::inspect::list(&bundle),
        Command::Verify { bundle } => commands::inspect::verify(&bundle),
        Command::Extract { bundle, dest } => commands::inspect::extract(&bundle, &dest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn pack_arguments_parse() {
        let cli = Cli::parse_from(["kgk-pack", "pack", "art", "-o", "art.kgkb", "--no-compress", "-v"]);
        assert!(cli.verbose);
        match cli.command {
            Command::Pack {
                sources,
                output,
                no_compress,
                manifest,
            } => {
                assert_eq!(sources, [PathBuf::from("art")]);
                assert_eq!(output, Some(PathBuf::from("art.kgkb")));
                assert!(no_compress);
                assert_eq!(manifest, PathBuf::from("Pack.toml"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
