//! TagForge CLI - Compile and render comment-tag templates
//!
//! Commands: compile, blocks, render
//! Outputs JSON to stdout (or marker text with `--format text`)
//! Exit code 2 on compile/render failure, 1 on usage or I/O failure

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use tagforge_core::{Bindings, Compiler, CompilerConfig, Renderer};

#[derive(Parser)]
#[command(name = "tagforge-cli")]
#[command(about = "TagForge CLI - Comment-Tag Template Compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Fail on missing includes and recursion-limit breaches
    #[arg(long, global = true)]
    strict: bool,

    /// Trace every pipeline stage to stderr (added on top of RUST_LOG)
    #[arg(long, global = true)]
    debug: bool,

    /// CompilerConfig as JSON; --strict and --debug are applied on top
    #[arg(long, global = true)]
    config: Option<String>,

    /// Directory INCLUDE paths resolve against (defaults to the template's directory)
    #[arg(short, long, global = true)]
    include_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a template
    Compile {
        file: PathBuf,

        /// Block to remove (repeatable)
        #[arg(long = "remove", value_name = "NAME")]
        removals: Vec<String>,

        /// Block replacement as NAME=TEXT (repeatable)
        #[arg(long = "replace", value_name = "NAME=TEXT", value_parser = parse_replacement)]
        replacements: Vec<(String, String)>,

        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },

    /// List blocks discovered while compiling a template
    Blocks { file: PathBuf },

    /// Compile and render a template
    Render {
        file: PathBuf,

        /// JSON bindings: {"values": {...}, "blocks": {"NAME": [{...}]}}
        #[arg(short, long, default_value = "{}")]
        bindings: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Text,
}

fn parse_replacement(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((name, text)) if !name.is_empty() => Ok((name.to_string(), text.to_string())),
        _ => Err(format!("expected NAME=TEXT, got \"{arg}\"")),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(EnvFilter::try_from_default_env().ok(), cli.debug))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match cli.config.as_deref().map(CompilerConfig::from_json).transpose() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => return failure(format!("Invalid config: {e}"), ExitCode::FAILURE),
    };
    config.strict |= cli.strict;
    config.debug |= cli.debug;

    match cli.command {
        Commands::Compile { file, removals, replacements, format } => {
            let (mut compiler, source) = match open(&file, cli.include_dir.as_deref(), config) {
                Ok(opened) => opened,
                Err(code) => return code,
            };
            compiler.set_removals(removals, false);
            compiler.set_replacements(replacements, false);

            match compiler.compile(&source) {
                Ok(program) => {
                    match format {
                        Format::Text => print!("{program}"),
                        Format::Json => print_json(&json!({
                            "success": true,
                            "blocks": compiler.blocks(),
                            "placeholders": compiler.placeholders(),
                            "program": program,
                        })),
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => failure(e.to_string(), ExitCode::from(2)),
            }
        }

        Commands::Blocks { file } => {
            let (mut compiler, source) = match open(&file, cli.include_dir.as_deref(), config) {
                Ok(opened) => opened,
                Err(code) => return code,
            };
            match compiler.compile(&source) {
                Ok(_) => {
                    print_json(&json!(compiler.blocks()));
                    ExitCode::SUCCESS
                }
                Err(e) => failure(e.to_string(), ExitCode::from(2)),
            }
        }

        Commands::Render { file, bindings } => {
            let bindings = match Bindings::from_json(&bindings) {
                Ok(b) => b,
                Err(e) => return failure(format!("Invalid bindings: {e}"), ExitCode::FAILURE),
            };
            let (mut compiler, source) = match open(&file, cli.include_dir.as_deref(), config) {
                Ok(opened) => opened,
                Err(code) => return code,
            };
            let program = match compiler.compile(&source) {
                Ok(p) => p,
                Err(e) => return failure(e.to_string(), ExitCode::from(2)),
            };
            match Renderer::new(config.strict).render(&program, &bindings) {
                Ok(output) => {
                    print!("{output}");
                    ExitCode::SUCCESS
                }
                Err(e) => failure(e.to_string(), ExitCode::from(2)),
            }
        }
    }
}

/// RUST_LOG when set, else warn; `--debug` always raises the crate to debug.
fn log_filter(env: Option<EnvFilter>, debug: bool) -> EnvFilter {
    let filter = env.unwrap_or_else(|| EnvFilter::new("warn"));
    if !debug {
        return filter;
    }
    match "tagforge_core=debug".parse::<Directive>() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

/// Read the template and build a compiler rooted at the include directory.
fn open(
    file: &Path,
    include_dir: Option<&Path>,
    config: CompilerConfig,
) -> Result<(Compiler, String), ExitCode> {
    let source = fs::read_to_string(file)
        .map_err(|e| failure(format!("Failed to read {}: {e}", file.display()), ExitCode::FAILURE))?;

    let dir = match include_dir {
        Some(dir) => dir.to_path_buf(),
        None => match file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
    };
    let compiler = Compiler::with_include_dir(&dir, config)
        .map_err(|e| failure(e.to_string(), ExitCode::FAILURE))?;
    Ok((compiler, source))
}

fn failure(error: String, code: ExitCode) -> ExitCode {
    print_json(&json!({ "success": false, "error": error }));
    code
}

fn print_json(value: &Value) {
    println!("{value:#}");
}
