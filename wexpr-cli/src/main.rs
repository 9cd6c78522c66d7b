// Copyright (c) 2024 the Wexpr Rust project contributors.
//
// Licensed under the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>. This file may not be copied,
// modified, or distributed except according to those terms.

//! `wexprTool`: read/convert/validate Wexpr documents from the command line
//! (spec §6 "CLI surface").
//!
//! Grounded on `WexprTool/Private/Application.cpp` and
//! `CommandLineParser.hpp` for the flag surface and I/O semantics (stdin/
//! stdout via the `-` sentinel, binary detection via the leading `0x83`
//! byte). The original snapshot in this pack parses `-s`/`-m` into
//! `CommandLineParser::Results` but never actually wires schema validation
//! into `main`'s command dispatch; here it's wired into every command (not
//! just `validate`), since spec.md presents `--schema` as a general flag
//! rather than one scoped to a single command.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::debug;

use wexpr_core::schema::{Schema, SchemaLoadCallbacks};
use wexpr_core::{to_binary, to_string, WriteFlags};
use wexpr_types::{Error, Expression};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Command {
    #[value(name = "humanReadable")]
    HumanReadable,
    #[value(name = "validate")]
    Validate,
    #[value(name = "mini")]
    Mini,
    #[value(name = "binary")]
    Binary,
}

/// Command-line surface for `wexprTool` (spec §6).
#[derive(Parser, Debug)]
#[command(name = "wexprTool", disable_version_flag = true)]
struct Cli {
    /// What to do with the parsed document.
    #[arg(short = 'c', long = "cmd", value_enum, default_value = "humanReadable")]
    cmd: Command,

    /// Input path, or `-` for stdin.
    #[arg(short = 'i', long = "input", default_value = "-")]
    input: String,

    /// Output path, or `-` for stdout.
    #[arg(short = 'o', long = "output", default_value = "-")]
    output: String,

    /// Schema id to validate against, or `(internal)` to use the
    /// document's own `$schema` key.
    #[arg(short = 's', long = "schema")]
    schema: Option<String>,

    /// `#(id path)` mapping overriding where a schema id is loaded from.
    /// May be repeated.
    #[arg(short = 'm', long = "schemaMap")]
    schema_map: Vec<String>,

    #[arg(short = 'v', long = "version")]
    version: bool,
}

const INTERNAL_SCHEMA_SENTINEL: &str = "(internal)";

fn read_all_input_from(path: &str) -> Result<Vec<u8>> {
    if path == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        Ok(fs::read(path).with_context(|| format!("reading input from {path}"))?)
    }
}

fn write_all_output_to(path: &str, data: &[u8]) -> Result<()> {
    if path == "-" {
        io::stdout().write_all(data)?;
        io::stdout().flush()?;
    } else {
        fs::write(path, data).with_context(|| format!("writing output to {path}"))?;
    }
    Ok(())
}

/// Parse every `-m '#(id path)'` flag into an id → filesystem path table.
fn parse_schema_map(entries: &[String]) -> Result<HashMap<String, PathBuf>> {
    let mut map = HashMap::new();
    for entry in entries {
        let parsed = wexpr_core::text::parse(entry.as_bytes(), Default::default(), None)
            .map_err(|e| anyhow!("invalid --schemaMap entry '{entry}': {e}"))?;
        if parsed.array_count() != 2 {
            bail!("invalid --schemaMap entry '{entry}': expected '#(id path)'");
        }
        let id = parsed.array_at(0).and_then(Expression::as_value).ok_or_else(|| anyhow!("--schemaMap entry '{entry}' has a non-value id"))?;
        let path = parsed
            .array_at(1)
            .and_then(Expression::as_value)
            .ok_or_else(|| anyhow!("--schemaMap entry '{entry}' has a non-value path"))?;
        map.insert(id.to_owned(), PathBuf::from(path));
    }
    Ok(map)
}

fn schema_load_callbacks(schema_map: HashMap<String, PathBuf>) -> SchemaLoadCallbacks {
    SchemaLoadCallbacks::new(move |id: &str| {
        schema_map.get(id).cloned().or_else(|| {
            let candidate = Path::new(id);
            candidate.exists().then(|| candidate.to_path_buf())
        })
    })
}

fn parse_input(data: &[u8]) -> Result<Expression, Error> {
    if data.first() == Some(&0x83) {
        wexpr_core::binary::read_file(data)
    } else {
        wexpr_core::text::parse(data, Default::default(), None)
    }
}

fn validate_against_schema(expr: &Expression, schema_id: &str, schema_map: HashMap<String, PathBuf>) -> Result<()> {
    let resolved_id = if schema_id == INTERNAL_SCHEMA_SENTINEL {
        expr.map_get("$schema")
            .and_then(Expression::as_value)
            .ok_or_else(|| anyhow!("(internal) schema requested but document has no $schema key"))?
            .to_owned()
    } else {
        schema_id.to_owned()
    };

    debug!("loading schema: {resolved_id}");
    let callbacks = schema_load_callbacks(schema_map);
    let schema = Schema::create_from_schema_id(&resolved_id, &callbacks).map_err(|e| anyhow!("{e}"))?;
    schema.validate_expression(expr).map_err(|e| anyhow!("{e}"))
}

fn run(cli: Cli) -> Result<()> {
    let is_validate = cli.cmd == Command::Validate;
    let input_bytes = read_all_input_from(&cli.input)?;

    let parse_result = parse_input(&input_bytes);

    let expr = match parse_result {
        Ok(expr) => expr,
        Err(err) => {
            if is_validate {
                write_all_output_to(&cli.output, b"false\n")?;
                std::process::exit(1);
            }
            let input_label = if cli.input == "-" { "(stdin)" } else { cli.input.as_str() };
            eprintln!("wexprTool: Error occurred with wexpr:");
            eprintln!("wexprTool: {input_label}:{}:{}: {}", err.line, err.column, err.message);
            std::process::exit(1);
        }
    };

    if let Some(schema_id) = &cli.schema {
        let schema_map = parse_schema_map(&cli.schema_map)?;
        if let Err(err) = validate_against_schema(&expr, schema_id, schema_map) {
            if is_validate {
                write_all_output_to(&cli.output, b"false\n")?;
                std::process::exit(1);
            }
            eprintln!("wexprTool: schema validation failed:");
            eprintln!("{err}");
            std::process::exit(1);
        }
    }

    match cli.cmd {
        Command::Validate => write_all_output_to(&cli.output, b"true\n")?,
        Command::HumanReadable => write_all_output_to(&cli.output, to_string(&expr, WriteFlags::human_readable()).as_bytes())?,
        Command::Mini => write_all_output_to(&cli.output, to_string(&expr, WriteFlags::NONE).as_bytes())?,
        Command::Binary => write_all_output_to(&cli.output, &to_binary(&expr))?,
    }

    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    if cli.version {
        println!("wexprTool {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    if let Err(err) = run(cli) {
        eprintln!("wexprTool: {err:#}");
        std::process::exit(1);
    }

    Ok(())
}
