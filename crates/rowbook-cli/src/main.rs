//! Rowbook CLI - JSON/spreadsheet conversion tool

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rowbook::prelude::*;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rowbook")]
#[command(author, version, about = "Convert between JSON row data and spreadsheet packages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all sheets in a package
    Sheets {
        /// Input spreadsheet file
        input: PathBuf,
    },

    /// List tables, optionally restricted to one sheet
    Tables {
        /// Input spreadsheet file
        input: PathBuf,

        /// Sheet name to restrict to
        #[arg(short, long)]
        sheet: Option<String>,
    },

    /// Dump a sheet's (or table's) rows as JSON to stdout or a file
    #[command(alias = "json")]
    ToJson {
        /// Input spreadsheet file
        input: PathBuf,

        /// Sheet name (default: first sheet)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Table name on the sheet
        #[arg(short, long)]
        table: Option<String>,

        /// Output JSON file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print the JSON
        #[arg(short, long)]
        pretty: bool,
    },

    /// Build a spreadsheet package from a JSON row file (.json or .json.gz)
    FromJson {
        /// Input JSON file: an array of row objects
        input: PathBuf,

        /// Output spreadsheet file
        #[arg(short, long)]
        output: PathBuf,

        /// Sheet name to place the rows on
        #[arg(short, long, default_value = "Sheet1")]
        sheet: String,

        /// Table name; when given the rows become a named table
        #[arg(short, long)]
        table: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Sheets { input } => list_sheets(&input),
        Commands::Tables { input, sheet } => list_tables(&input, sheet.as_deref()),
        Commands::ToJson {
            input,
            sheet,
            table,
            output,
            pretty,
        } => to_json(
            &input,
            sheet.as_deref(),
            table.as_deref(),
            output.as_deref(),
            pretty,
        ),
        Commands::FromJson {
            input,
            output,
            sheet,
            table,
        } => from_json(&input, &output, &sheet, table.as_deref()),
    }
}

fn open(input: &PathBuf) -> Result<Workbook> {
    Workbook::read(input).with_context(|| format!("Failed to open '{}'", input.display()))
}

fn list_sheets(input: &PathBuf) -> Result<()> {
    let workbook = open(input)?;
    for name in workbook.sheet_names() {
        println!("{}", name);
    }
    Ok(())
}

fn list_tables(input: &PathBuf, sheet: Option<&str>) -> Result<()> {
    let workbook = open(input)?;
    for name in workbook.table_names(sheet) {
        println!("{}", name);
    }
    Ok(())
}

fn to_json(
    input: &PathBuf,
    sheet: Option<&str>,
    table: Option<&str>,
    output: Option<&std::path::Path>,
    pretty: bool,
) -> Result<()> {
    let workbook = open(input)?;

    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => match workbook.sheet_names().first() {
            Some(first) => first.clone(),
            None => bail!("'{}' contains no sheets", input.display()),
        },
    };

    let rows = workbook
        .get_data(&sheet_name, table)
        .with_context(|| match table {
            Some(t) => format!("No table '{}' on sheet '{}'", t, sheet_name),
            None => format!("No sheet '{}'", sheet_name),
        })?;

    let json = if pretty {
        serde_json::to_string_pretty(rows)?
    } else {
        serde_json::to_string(rows)?
    };

    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write '{}'", path.display()))?;
            eprintln!("Wrote {} rows to '{}'", rows.len(), path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

fn from_json(
    input: &PathBuf,
    output: &std::path::Path,
    sheet: &str,
    table: Option<&str>,
) -> Result<()> {
    let rows = load_rows(input).with_context(|| format!("Failed to load '{}'", input.display()))?;
    let count = rows.len();

    let mut workbook = Workbook::new();
    workbook
        .set_data(sheet, table, rows)
        .with_context(|| format!("Failed to place rows on sheet '{}'", sheet))?;
    workbook
        .write(output)
        .with_context(|| format!("Failed to write '{}'", output.display()))?;

    eprintln!("Wrote {} rows to '{}'", count, output.display());
    Ok(())
}
