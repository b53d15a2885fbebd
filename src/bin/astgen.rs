//! astgen CLI
//!
//! Reads the schema file and writes the generated Rust module to stdout.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use astgen::{load_schema, Generator};

#[derive(Parser)]
#[command(name = "astgen")]
#[command(about = "Generate a Rust AST module from a YAML ADT schema")]
struct Cli {
    /// Path to the schema file
    #[arg(default_value = "./ast.yaml")]
    schema: PathBuf,

    /// Write output to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Error on references to unknown types
    #[arg(long)]
    strict: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut schema = load_schema(&cli.schema)?;
    if cli.strict {
        schema.config.strict = true;
    }

    let generator = Generator::build(schema)?;
    let code = generator.emit();

    match cli.output {
        Some(path) => fs::write(path, code)?,
        None => print!("{}", code),
    }

    Ok(())
}
