//! Command line runner: execute one function of a `.wasm` module.
//!
//! ```text
//! ferrule module.wasm --invoke add 1 2
//! ferrule module.wasm --index 0 --max-depth 64
//! ```
//!
//! Prints the typed result, `void`, or `trap: <reason>`. Exits with 0 when
//! the function returns and 1 when it traps or the module cannot be run.

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use ferrule::runtime::config::DEFAULT_CALL_DEPTH_LIMIT;
use ferrule::{execute, instantiate_with_config, parse, Config, ExecutionResult, TypedValue, Value};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "ferrule", version, about = "Run a function of a WebAssembly module")]
struct Cli {
    /// Path to the .wasm binary
    file: PathBuf,

    /// Name of the exported function to call
    #[arg(long, conflicts_with = "index")]
    invoke: Option<String>,

    /// Function index to call
    #[arg(long)]
    index: Option<u32>,

    /// Calls at this depth or deeper trap
    #[arg(long, default_value_t = DEFAULT_CALL_DEPTH_LIMIT)]
    max_depth: u32,

    /// Arguments, read according to the function's parameter types
    #[arg(allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the function completed without trapping.
fn run(cli: &Cli) -> Result<bool> {
    let bytes = fs::read(&cli.file).with_context(|| format!("reading {}", cli.file.display()))?;
    let module = parse(&bytes).with_context(|| format!("decoding {}", cli.file.display()))?;

    let func_idx = match (&cli.invoke, cli.index) {
        (Some(name), _) => module
            .find_exported_function(name)
            .ok_or_else(|| anyhow!("no exported function named {name:?}"))?,
        (None, Some(idx)) => idx,
        (None, None) => bail!("one of --invoke or --index is required"),
    };

    let config = Config::new().with_call_depth_limit(cli.max_depth);
    let instance = instantiate_with_config(module, vec![], config).context("instantiating module")?;
    let func_type = instance
        .function_type(func_idx)
        .ok_or_else(|| anyhow!("function {func_idx} does not exist"))?
        .clone();

    if cli.args.len() != func_type.parameters.len() {
        bail!(
            "function {func_idx} {func_type} takes {} arguments, got {}",
            func_type.parameters.len(),
            cli.args.len()
        );
    }
    let args = func_type
        .parameters
        .iter()
        .zip(&cli.args)
        .map(|(ty, text)| TypedValue::parse(*ty, text).map(Value::from).map_err(|e| anyhow!(e)))
        .collect::<Result<Vec<_>>>()?;

    if let ExecutionResult::Trapped(trap) = instance.run_start(0) {
        println!("trap: {trap}");
        return Ok(false);
    }

    info!("executing function {} {}", func_idx, func_type);
    match execute(&instance, func_idx, &args, 0) {
        ExecutionResult::Value(value) => {
            match func_type.result() {
                Some(ty) => println!("{}", TypedValue::from_value(value, ty)),
                None => println!("void"),
            }
            Ok(true)
        }
        ExecutionResult::Void => {
            println!("void");
            Ok(true)
        }
        ExecutionResult::Trapped(trap) => {
            println!("trap: {trap}");
            Ok(false)
        }
    }
}
