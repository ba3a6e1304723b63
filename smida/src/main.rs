//! Build font binaries from a glyph design source.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use smida::BuildError;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a font from a design source. The output extension picks the
    /// flavor: .ttf for TrueType outlines, anything else for PostScript.
    Build {
        /// The design source file.
        source: PathBuf,
        /// Font version, e.g. "1.007".
        version: String,
        /// The output font file.
        output: PathBuf,
    },
    /// Compress a compiled font into a WOFF2 container.
    Woff2 {
        /// The input font file.
        input: PathBuf,
        /// The output WOFF2 file.
        output: PathBuf,
    },
    /// Print the version recorded in a YAML configuration file.
    Version {
        /// The configuration file.
        config: PathBuf,
    },
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let result = match args.command {
        Command::Build {
            source,
            version,
            output,
        } => smida::assemble::compile(&source, &version, &output),
        Command::Woff2 { input, output } => smida::woff2::compress_file(&input, &output),
        Command::Version { config } => print_version(&config),
    };
    if let Err(err) = result {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn print_version(config: &Path) -> Result<(), BuildError> {
    let text = std::fs::read_to_string(config)?;
    let value: serde_yaml::Value = serde_yaml::from_str(&text)?;
    let version = value
        .get("version")
        .ok_or(BuildError::MissingField("version"))?;
    match version {
        serde_yaml::Value::String(version) => println!("{version}"),
        other => println!("{}", serde_yaml::to_string(other)?.trim_end()),
    }
    Ok(())
}
