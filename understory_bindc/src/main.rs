// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Precompiles the binding expressions in a directory of templates into a
//! JSON manifest.
//!
//! Set `RUST_LOG=understory_binding=debug` to see each file as it is scanned.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use understory_binding::precompile::{self, CompileOptions};

#[derive(Parser, Debug)]
#[command(name = "understory-bindc", version, about)]
struct Args {
    /// Directory containing the templates.
    root: PathBuf,

    /// Where to write the manifest.
    #[arg(short, long)]
    output: PathBuf,

    /// Template file extensions to scan, without the dot.
    #[arg(short, long = "extension", default_value = "uvml")]
    extensions: Vec<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let options = CompileOptions::new().with_extensions(args.extensions);
    let result = match precompile::compile_with(&args.root, &args.output, &options) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::from(2);
        }
    };

    for error in &result.errors {
        eprintln!("{error}");
    }
    match result.produced {
        Some(path) if result.succeeded => {
            println!("wrote {}", path.display());
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("{} binding error(s); no manifest written", result.errors.len());
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_default_to_templates() {
        let args = Args::try_parse_from(["understory-bindc", "ui", "-o", "out.json"]).unwrap();
        assert_eq!(args.extensions, ["uvml"]);
        assert_eq!(args.output, PathBuf::from("out.json"));

        let args = Args::try_parse_from([
            "understory-bindc",
            "ui",
            "--output",
            "out.json",
            "-e",
            "uvml",
            "-e",
            "xml",
        ])
        .unwrap();
        assert_eq!(args.extensions, ["uvml", "xml"]);
    }
}
