//! rbridge CLI - inspect recorded bridge traffic

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rbridge::{BridgeConfig, Decoder, NoObjects};
use rbridge_protocol::{CallEnvelope, Operation, Value, WireValue};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rbridge")]
#[command(author, version, about = "Inspect and decode runtime/host bridge traffic")]
struct Cli {
    /// Bridge configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize each envelope in a JSON-lines capture
    Inspect {
        /// Captured traffic, one envelope per line
        input: PathBuf,
    },

    /// Decode results and call arguments into runtime values
    Decode {
        /// Captured traffic, one envelope per line
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => BridgeConfig::from_path(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => BridgeConfig::default(),
    };

    match cli.command {
        Commands::Inspect { input } => inspect(&input),
        Commands::Decode { input } => decode(&input, &config),
    }
}

/// Read every non-blank line of `path` as an envelope.
fn read_envelopes(path: &Path) -> Result<Vec<(usize, CallEnvelope)>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;

    let mut envelopes = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let envelope: CallEnvelope = serde_json::from_str(&line)
            .with_context(|| format!("Malformed envelope at line {}", index + 1))?;
        envelopes.push((index + 1, envelope));
    }
    tracing::debug!(count = envelopes.len(), "read capture");
    Ok(envelopes)
}

fn inspect(input: &Path) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for (line, envelope) in read_envelopes(input)? {
        write!(
            out,
            "{:>5}  id={:<6} wait={:<5} {:<12}",
            line,
            envelope.id,
            envelope.wait,
            envelope.operation_name()
        )?;
        match &envelope.operation {
            Operation::FunctionCall(call) => {
                let shapes: Vec<String> = call.arguments.iter().map(shape).collect();
                writeln!(out, " {}({})", call.function, shapes.join(", "))?;
            }
            Operation::Result(value) => writeln!(out, " {}", shape(value))?,
            Operation::Err(message) => writeln!(out, " {:?}", message)?,
            Operation::Code(code) => writeln!(out, " {} line(s)", code.lines.len())?,
            Operation::FunctionList(list) => {
                writeln!(out, " {} function(s)", list.functions.len())?
            }
            Operation::Console(_) => writeln!(out)?,
        }
    }

    Ok(())
}

fn decode(input: &Path, config: &BridgeConfig) -> Result<()> {
    let decoder = Decoder::new(&NoObjects, config);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for (line, envelope) in read_envelopes(input)? {
        match &envelope.operation {
            Operation::Result(value) => {
                writeln!(out, "[{}] result", line)?;
                writeln!(out, "{:#?}", decoder.decode(value))?;
            }
            Operation::FunctionCall(call) => {
                writeln!(out, "[{}] {}", line, call.function)?;
                for (position, argument) in call.arguments.iter().enumerate() {
                    writeln!(out, "  arg {}: {:#?}", position + 1, decoder.decode(argument))?;
                }
            }
            _ => {}
        }
    }

    Ok(())
}

/// One-word description of a wire value, with dimensions for arrays.
fn shape(value: &WireValue) -> String {
    match &value.value {
        Value::Array(array) => match array.shape() {
            (len, 0) => format!("arr[{}]", len),
            (rows, cols) => format!("arr[{}x{}]", rows, cols),
        },
        Value::ForeignObject(object) if !object.interface_name.is_empty() => {
            format!("comPointer<{}>", object.interface_name)
        }
        _ => value.kind_name().to_string(),
    }
}
