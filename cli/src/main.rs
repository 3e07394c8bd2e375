use std::fs::File;
use std::io::{self, BufRead, BufReader};

use caller::{CallError, Caller};
use clap::{Args, Parser, Subcommand};
use envelope::{CallEnvelope, CodecError};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Call(#[from] CallError),
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("line {line}: invalid call envelope: {source}")]
    InvalidLine {
        line: usize,
        #[source]
        source: CodecError,
    },
    #[error("failed to read input: {0}")]
    Input(#[from] io::Error),
    #[error("batch stopped at line {line}: {message}")]
    BatchFailed { line: usize, message: String },
}

#[derive(Parser, Debug)]
#[command(name = "netcall", about = "Call methods on objects served over WebSocket")]
struct Cli {
    #[arg(long, env = "NETCALL_URL", default_value = "ws://127.0.0.1:5555")]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Invoke one method and print its result.
    Call(CallArgs),
    /// Invoke one call envelope per input line and print each result envelope.
    Batch(BatchArgs),
}

#[derive(Args, Debug)]
struct CallArgs {
    /// Identifier the object is registered under.
    target: String,

    method: String,

    #[arg(help = "One JSON literal per argument; anything that is not JSON is sent as a string")]
    args: Vec<String>,
}

#[derive(Args, Debug)]
struct BatchArgs {
    #[arg(long, default_value = "-", help = "Input file path, or - for stdin")]
    input: String,

    #[arg(long, default_value_t = false, help = "Stop at the first remote error")]
    fail_fast: bool,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let mut caller = Caller::new();
    caller.connect(&cli.url).await?;

    let outcome = match cli.command {
        Command::Call(args) => run_call(&mut caller, args).await,
        Command::Batch(args) => run_batch(&mut caller, args).await,
    };

    if let Err(e) = caller.close().await {
        eprintln!("close failed: {e}");
    }
    outcome
}

async fn run_call(caller: &mut Caller, args: CallArgs) -> Result<(), CliError> {
    let values = args.args.iter().map(|raw| parse_arg(raw)).collect::<Vec<_>>();
    let result: Option<Value> = caller.call(&args.target, &args.method, values).await?;
    print_json(&result.unwrap_or(Value::Null))
}

async fn run_batch(caller: &mut Caller, args: BatchArgs) -> Result<(), CliError> {
    let mut reader: Box<dyn BufRead> = if args.input == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        Box::new(BufReader::new(File::open(&args.input)?))
    };

    let mut line_no = 0_usize;
    let mut calls = 0_usize;
    let mut errors = 0_usize;
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        line_no = line_no.saturating_add(1);

        let Some(call) = parse_call_line(line_no, &line)? else {
            continue;
        };

        let reply = caller.call_raw(&call).await?;
        println!("{}", envelope::encode_result(&reply).map_err(CallError::from)?);
        calls = calls.saturating_add(1);

        if reply.is_error() {
            errors = errors.saturating_add(1);
            if args.fail_fast {
                return Err(CliError::BatchFailed { line: line_no, message: reply.error });
            }
        }
    }

    eprintln!("batch complete: calls={calls} errors={errors} lines={line_no}");
    Ok(())
}

/// Interpret one command-line argument as JSON, falling back to a string.
fn parse_arg(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

/// Parse one JSONL input line. Blank lines yield `None`.
fn parse_call_line(line_no: usize, line: &str) -> Result<Option<CallEnvelope>, CliError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    envelope::decode_call(trimmed)
        .map(Some)
        .map_err(|source| CliError::InvalidLine { line: line_no, source })
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
