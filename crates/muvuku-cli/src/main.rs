use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use muvuku_contracts::{
    DEFAULT_LANGUAGE, DEFAULT_OUTPUT_ROOT, FATAL_EXIT_CODE, FORMS_OUTPUT_DIR, MAIN_OUTPUT_PATH,
    MUVUKU_IR_SCHEMA_VERSION,
};
use muvuku_schema::io::{read_all, write_all};
use muvuku_schema::legacy::extract_file;
use muvuku_schema::{
    check_message_lengths, compile_document, CompileOptions, Diagnostic, ExtractOptions, Form,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "muvuku")]
#[command(
    about = "Compile SMS form schemas to handset IR, and lift legacy C forms back to JSON.",
    long_about = None
)]
struct Cli {
    /// Log at debug level (overrides RUST_LOG).
    #[arg(long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile JSON form schemas into per-form IR files plus a driver file.
    Compile {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Output root (writes <out>/forms/<code>.json and <out>/main/main.json).
        #[arg(long, default_value = DEFAULT_OUTPUT_ROOT)]
        out: PathBuf,
        /// Language assigned to plain, unlocalized text.
        #[arg(long, default_value = DEFAULT_LANGUAGE)]
        default_language: String,
        /// Concurrent file reads/writes (defaults to available parallelism).
        #[arg(long)]
        jobs: Option<usize>,
    },
    /// Extract forms from legacy C sources and print them as JSON, one array per file.
    Migrate {
        locale: String,
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        #[arg(long, default_value_t = false)]
        pretty: bool,
    },
}

fn main() -> ExitCode {
    match try_main() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(2)
        }
    }
}

fn try_main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Compile {
            paths,
            out,
            default_language,
            jobs,
        } => {
            let opts = CompileOptions {
                default_language,
                ..CompileOptions::default()
            };
            run_compile(&paths, &out, &opts, jobs.unwrap_or_else(default_jobs))
        }
        Command::Migrate {
            locale,
            paths,
            pretty,
        } => run_migrate(&paths, &ExtractOptions::new(locale), pretty),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[derive(Debug, Serialize)]
struct MainMeta {
    count: usize,
}

/// Aggregate driver document listing every form of the run.
#[derive(Debug, Serialize)]
struct MainDocument<'a> {
    schema_version: &'static str,
    meta: MainMeta,
    forms: &'a [Form],
}

fn run_compile(
    paths: &[PathBuf],
    out: &Path,
    opts: &CompileOptions,
    jobs: usize,
) -> Result<ExitCode> {
    let forms = match compile_all(paths, opts, jobs) {
        Ok(forms) => forms,
        Err(diag) => return Ok(fatal(&diag)),
    };

    let outputs = render_outputs(&forms, out)?;
    if let Err(diag) = write_all(&outputs, jobs) {
        return Ok(fatal(&diag));
    }

    eprintln!("Completed successfully: Wrote {} files", outputs.len());
    Ok(ExitCode::SUCCESS)
}

fn compile_all(
    paths: &[PathBuf],
    opts: &CompileOptions,
    jobs: usize,
) -> Result<Vec<Form>, Diagnostic> {
    let texts = read_all(paths, jobs)?;

    let mut forms = Vec::new();
    for (path, text) in paths.iter().zip(&texts) {
        let path = path.display().to_string();
        forms.extend(compile_document(text, Some(&path), opts)?);
    }
    tracing::info!(files = paths.len(), forms = forms.len(), "compiled run");

    check_message_lengths(&forms, opts)?;
    Ok(forms)
}

fn render_outputs(forms: &[Form], out: &Path) -> Result<Vec<(PathBuf, String)>> {
    let mut per_form: BTreeMap<&str, String> = BTreeMap::new();
    for form in forms {
        let text = serde_json::to_string_pretty(form)
            .with_context(|| format!("serialize form: {}", form.meta.code))?;
        if per_form.insert(form.meta.code.as_str(), text).is_some() {
            tracing::warn!(
                code = %form.meta.code,
                "form code appears more than once; keeping the last"
            );
        }
    }

    let mut outputs: Vec<(PathBuf, String)> = per_form
        .into_iter()
        .map(|(code, text)| (out.join(FORMS_OUTPUT_DIR).join(format!("{code}.json")), text))
        .collect();

    let main = MainDocument {
        schema_version: MUVUKU_IR_SCHEMA_VERSION,
        meta: MainMeta { count: forms.len() },
        forms,
    };
    let text = serde_json::to_string_pretty(&main).context("serialize main document")?;
    outputs.push((out.join(MAIN_OUTPUT_PATH), text));
    Ok(outputs)
}

fn fatal(diag: &Diagnostic) -> ExitCode {
    eprintln!("Fatal: {diag}");
    ExitCode::from(FATAL_EXIT_CODE)
}

fn run_migrate(paths: &[PathBuf], opts: &ExtractOptions, pretty: bool) -> Result<ExitCode> {
    for path in paths {
        let forms = match extract_file(path, opts) {
            Ok(forms) => forms,
            Err(diag) => {
                eprintln!("{diag}");
                return Ok(ExitCode::from(1));
            }
        };
        let text = if pretty {
            serde_json::to_string_pretty(&forms)
        } else {
            serde_json::to_string(&forms)
        }
        .with_context(|| format!("serialize forms extracted from {}", path.display()))?;
        println!("{text}");
    }
    Ok(ExitCode::SUCCESS)
}
