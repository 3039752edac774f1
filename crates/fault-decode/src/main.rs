//! CLI entry point for the fault-decode binary.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

use fault_core::{Arch, Decoder, RawFault};
use fault_decode::{
    category_names, format_mask, mask_of, parse_arch, parse_batch, parse_mask, parse_triple,
    render, Format,
};
use log::debug;
use serde_json as _;
use thiserror as _;
#[cfg(test)]
use tempfile as _;

const USAGE_TEXT: &str = "\
Usage: fault-decode <command> [options]

Commands:
  decode <category> <code> <subcode>  Decode one fault triple
  batch <file>                        Decode one triple per line of a file
  mask <category>...                  Print the registration mask for categories
  categories <mask>                   Print the categories in a mask

Options:
  --arch <arm64|x86_64>  Processor family (default: host)
  --json                 Print one JSON object per fault
  -h, --help             Show this help message

Codes are decimal, 0x hex, or negative; - or none marks an absent code.
Batch files skip blank lines and # comments.

Examples:
  fault-decode decode bad-instruction 1 0x4000 --arch x86_64
  fault-decode batch faults.txt --json
  fault-decode mask bad-access arithmetic
  fault-decode categories 0x4e
";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Decode(DecodeArgs),
    Batch(BatchArgs),
    Mask(Vec<String>),
    Categories(String),
}

#[derive(Debug, PartialEq, Eq)]
struct DecodeArgs {
    raw: RawFault,
    output: OutputArgs,
}

#[derive(Debug, PartialEq, Eq)]
struct BatchArgs {
    input: PathBuf,
    output: OutputArgs,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct OutputArgs {
    arch: Option<Arch>,
    format: Format,
}

impl OutputArgs {
    fn decoder(&self) -> Decoder {
        self.arch.map_or_else(Decoder::host, Decoder::for_arch)
    }
}

#[derive(Debug)]
enum ParseResult {
    Command(Command),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let first = args.next().ok_or_else(|| "missing command".to_string())?;

    if first == "--help" || first == "-h" {
        return Ok(ParseResult::Help);
    }

    let command_str = first.to_string_lossy().to_string();
    let (positional, output) = split_options(args)?;

    let command = match command_str.as_str() {
        "decode" => parse_decode_args(&positional, output).map(Command::Decode)?,
        "batch" => parse_batch_args(positional, output).map(Command::Batch)?,
        "mask" => {
            reject_output_options(&output, "mask")?;
            if positional.is_empty() {
                return Err("missing category".to_string());
            }
            Command::Mask(positional)
        }
        "categories" => {
            reject_output_options(&output, "categories")?;
            match <[String; 1]>::try_from(positional) {
                Ok([mask]) => Command::Categories(mask),
                Err(rest) if rest.is_empty() => return Err("missing mask".to_string()),
                Err(_) => return Err("expected exactly one mask".to_string()),
            }
        }
        other => return Err(format!("unknown command: {other}")),
    };
    Ok(ParseResult::Command(command))
}

/// Separates `--` options from positional words.
///
/// A lone `-` and negative numbers stay positional.
#[allow(clippy::while_let_on_iterator)]
fn split_options(
    mut args: impl Iterator<Item = OsString>,
) -> Result<(Vec<String>, OutputArgs), String> {
    let mut positional = Vec::new();
    let mut output = OutputArgs::default();

    while let Some(arg) = args.next() {
        if arg == "--help" || arg == "-h" {
            return Err(USAGE_TEXT.to_string());
        }

        if arg == "--json" {
            output.format = Format::Json;
            continue;
        }

        if arg == "--arch" {
            let value = args
                .next()
                .ok_or_else(|| "missing value for --arch".to_string())?;
            let arch = parse_arch(&value.to_string_lossy()).map_err(|e| e.to_string())?;
            output.arch = Some(arch);
            continue;
        }

        let word = arg.to_string_lossy().to_string();
        if word.starts_with("--") {
            return Err(format!("unknown option: {word}"));
        }
        positional.push(word);
    }

    Ok((positional, output))
}

fn reject_output_options(output: &OutputArgs, command: &str) -> Result<(), String> {
    if output == &OutputArgs::default() {
        Ok(())
    } else {
        Err(format!("{command} takes no --arch or --json"))
    }
}

fn parse_decode_args(positional: &[String], output: OutputArgs) -> Result<DecodeArgs, String> {
    match positional {
        [category, code, subcode] => {
            let raw = parse_triple(category, code, subcode).map_err(|e| e.to_string())?;
            Ok(DecodeArgs { raw, output })
        }
        _ => Err(format!(
            "decode expects <category> <code> <subcode>, got {} words",
            positional.len()
        )),
    }
}

fn parse_batch_args(positional: Vec<String>, output: OutputArgs) -> Result<BatchArgs, String> {
    let mut positional = positional.into_iter();
    let input = positional
        .next()
        .ok_or_else(|| "missing input path".to_string())?;
    if positional.next().is_some() {
        return Err("multiple input paths provided".to_string());
    }
    Ok(BatchArgs {
        input: PathBuf::from(input),
        output,
    })
}

fn print_fault(decoder: &Decoder, raw: &RawFault, format: Format) -> Result<(), i32> {
    match render(decoder, raw, format) {
        Ok(line) => {
            println!("{line}");
            Ok(())
        }
        Err(e) => {
            eprintln!("error: failed to encode {raw}: {e}");
            Err(1)
        }
    }
}

fn run_decode(args: &DecodeArgs) -> Result<(), i32> {
    let decoder = args.output.decoder();
    debug!("decoding {} for {:?}", args.raw, decoder.arch());
    print_fault(&decoder, &args.raw, args.output.format)
}

fn run_batch(args: &BatchArgs) -> Result<(), i32> {
    let text = match fs::read_to_string(&args.input) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("error: failed to read {}: {e}", args.input.display());
            return Err(1);
        }
    };

    let faults = match parse_batch(&text) {
        Ok(faults) => faults,
        Err(errors) => {
            for error in &errors {
                eprintln!("{}:{error}", args.input.display());
            }
            return Err(1);
        }
    };

    let decoder = args.output.decoder();
    for raw in &faults {
        print_fault(&decoder, raw, args.output.format)?;
    }
    Ok(())
}

fn run_mask(categories: &[String]) -> Result<(), i32> {
    match mask_of(categories) {
        Ok(mask) => {
            println!("{}", format_mask(mask));
            Ok(())
        }
        Err(e) => {
            eprintln!("error: {e}");
            Err(1)
        }
    }
}

fn run_categories(mask: &str) -> Result<(), i32> {
    match parse_mask(mask) {
        Ok(mask) => {
            for name in category_names(mask) {
                println!("{name}");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("error: {e}");
            Err(1)
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let exit_code = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{USAGE_TEXT}");
            0
        }
        Ok(ParseResult::Command(command)) => {
            let result = match &command {
                Command::Decode(args) => run_decode(args),
                Command::Batch(args) => run_batch(args),
                Command::Mask(categories) => run_mask(categories),
                Command::Categories(mask) => run_categories(mask),
            };
            match result {
                Ok(()) => 0,
                Err(code) => code,
            }
        }
        Err(error) => {
            if error.starts_with("Usage:") {
                println!("{error}");
            } else {
                eprintln!("error: {error}");
                eprintln!("{USAGE_TEXT}");
            }
            1
        }
    };

    std::process::exit(exit_code);
}
