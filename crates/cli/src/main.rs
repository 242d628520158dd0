mod render;
mod schema;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cmdtree_argparse::{CommandTree, ParseOutcome};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt};

use crate::render::{CheckReport, ParseReport};
use crate::schema::{DEFAULT_SCHEMA_NAME, LoadedSchema, build_tree, load_schema};

/// Exit status of `cmdtree parse` when the command line is rejected.
const PARSE_FAILURE: u8 = 2;

#[derive(Parser)]
#[command(name = "cmdtree")]
#[command(
    version,
    about = "Parse command lines against a JSON-declared command tree",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a sample cmdtree.json
    Init(InitArgs),

    /// Validate a schema and list its commands
    Check(CheckArgs),

    /// Parse arguments against a schema and print the result as JSON
    Parse(ParseArgs),
}

#[derive(Parser)]
struct InitArgs {
    /// Target directory (default: current directory)
    #[arg(value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Overwrite an existing cmdtree.json
    #[arg(long)]
    force: bool,
}

#[derive(Parser)]
struct CheckArgs {
    /// Path to the schema (default: ./cmdtree.json)
    #[arg(short, long, env = "CMDTREE_SCHEMA", value_name = "FILE")]
    schema: Option<PathBuf>,

    /// Only output JSON (no human-readable output)
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct ParseArgs {
    /// Path to the schema (default: ./cmdtree.json)
    #[arg(short, long, env = "CMDTREE_SCHEMA", value_name = "FILE")]
    schema: Option<PathBuf>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,

    /// Arguments to parse, after `--`
    #[arg(last = true, value_name = "ARGS")]
    args: Vec<String>,
}

fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Init(args) => init(args).map(|()| ExitCode::SUCCESS),
        Commands::Check(args) => check(args).map(|()| ExitCode::SUCCESS),
        Commands::Parse(args) => parse(args),
    }
}

fn init(args: InitArgs) -> Result<()> {
    let dir = args.dir.unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create directory: {}", dir.display()))?;

    let path = schema::write_default_schema(&dir, args.force)?;

    eprintln!("Created: {}", path.display());
    eprintln!("\nNext steps:");
    eprintln!("  1. Edit {DEFAULT_SCHEMA_NAME} to describe your commands");
    eprintln!("  2. Run: cmdtree check");
    eprintln!("  3. Run: cmdtree parse -- <args>");
    Ok(())
}

fn load_tree(schema_path: Option<PathBuf>) -> Result<(LoadedSchema, CommandTree)> {
    let loaded = load_schema(schema_path.as_deref())?;
    let tree = build_tree(&loaded.document)
        .with_context(|| format!("invalid schema: {}", loaded.path.display()))?;
    tracing::debug!(commands = tree.len(), "command tree built");
    Ok((loaded, tree))
}

fn check(args: CheckArgs) -> Result<()> {
    let (loaded, tree) = load_tree(args.schema)?;
    let report = CheckReport::new(loaded.path.display().to_string(), &tree);

    if args.json {
        print_json(&report, true)?;
        return Ok(());
    }

    eprintln!("Schema: {}", report.schema);
    for command in &report.commands {
        let mut line = format!("  {}", command.path.join(" "));
        if !command.aliases.is_empty() {
            line.push_str(&format!(" (aliases: {})", command.aliases.join(", ")));
        }
        line.push_str(&format!(
            ": {} args, {} subcommands",
            command.args.len(),
            command.subcommands
        ));
        if command.subcommand_required {
            line.push_str(", subcommand required");
        }
        eprintln!("{line}");
        for arg in &command.args {
            if arg.help.is_empty() {
                eprintln!("    {}", arg.name);
            } else {
                eprintln!("    {:<16} {}", arg.name, arg.help);
            }
        }
    }
    eprintln!("OK: {} commands", report.commands.len());
    Ok(())
}

fn parse(args: ParseArgs) -> Result<ExitCode> {
    let (_, tree) = load_tree(args.schema)?;

    match tree.parse(&args.args) {
        Ok(outcome) => {
            if let ParseOutcome::Matches(parsed) = &outcome {
                tracing::debug!(command = %parsed.command_path().join(" "), "arguments matched");
            }
            print_json(&ParseReport::from_outcome(&outcome), args.pretty)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            tracing::debug!(kind = %err.kind(), "arguments rejected");
            print_json(&ParseReport::from_error(&err), args.pretty)?;
            Ok(ExitCode::from(PARSE_FAILURE))
        }
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
