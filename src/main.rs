use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum, error::ErrorKind};
use colored::Colorize;
use colored::control::set_override as set_color_override;
use regex::Regex;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokenscript_compliance::authoring::{
    blank_template, edit_in_editor, list_fixtures, new_fixture_path, parse_editor_content,
    read_fixture, template_from_value, write_fixture,
};
use tokenscript_compliance::backend::{Evaluator, ExternalEvaluator};
use tokenscript_compliance::engine::{ComplianceRunner, Execution};
use tokenscript_compliance::i18n;
use tokenscript_compliance::report::{OutputKind, RenderOptions, print_human, render_json};
use tokenscript_compliance::types::RawCase;
use tokenscript_compliance::{t, t_args};
use tracing::{error, info};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputStyle {
    Compact,
    Terse,
    Final,
    Normal,
}

impl From<OutputStyle> for OutputKind {
    fn from(v: OutputStyle) -> Self {
        match v {
            OutputStyle::Normal => OutputKind::Normal,
            OutputStyle::Compact => OutputKind::Compact,
            OutputStyle::Terse => OutputKind::Terse,
            OutputStyle::Final => OutputKind::Final,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ReportFormat {
    Human,
    Json,
}

#[derive(Parser, Debug)]
#[command(version, author, about = t!("cli-about"))]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    // Verbose
    #[arg(short = 'v', long = "verbose", global = true, help = t!("cli-verbose"))]
    verbose: bool,

    // Colors are on by default
    #[arg(long = "no-color", global = true, help = t!("cli-no-color"))]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    #[command(about = t!("cli-run"))]
    Run(RunArgs),
    #[command(about = t!("cli-create"))]
    Create(CreateArgs),
    #[command(about = t!("cli-edit"))]
    Edit(EditArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    // TEST_DIR: directory (or single file) with JSON fixtures
    #[arg(value_name = "TEST_DIR")]
    tests: PathBuf,

    #[arg(short = 'e', long, value_name = "PROGRAM", help = t!("cli-evaluator"))]
    evaluator: String,

    // Extra arguments for the evaluator, repeatable
    #[arg(
        long = "arg",
        value_name = "ARG",
        allow_hyphen_values = true,
        help = t!("cli-evaluator-arg")
    )]
    evaluator_args: Vec<String>,

    #[arg(long, value_name = "SECS", default_value_t = 30, help = t!("cli-timeout"))]
    timeout: u64,

    #[arg(long, value_enum, default_value = "human", help = t!("cli-format"))]
    format: ReportFormat,

    #[arg(long = "output-file", value_name = "FILE", help = t!("cli-output-file"))]
    output_file: Option<PathBuf>,

    #[arg(short = 'o', long = "style", value_enum, default_value = "normal", help = t!("cli-style"))]
    style: OutputStyle,

    #[arg(long, help = t!("cli-parallel"))]
    parallel: bool,

    #[arg(
        short = 'f',
        long = "hide-fails",
        conflicts_with = "hide_passes",
        help = t!("cli-hide-fails")
    )]
    hide_fails: bool,

    #[arg(
        short = 'p',
        long = "hide-passes",
        conflicts_with = "hide_fails",
        help = t!("cli-hide-passes")
    )]
    hide_passes: bool,

    #[arg(short = 'q', long = "silent", help = t!("cli-silent"))]
    silent: bool,
}

#[derive(Args, Debug)]
struct CreateArgs {
    #[arg(long, value_name = "DIR", default_value = "tests", help = t!("cli-root"))]
    root: PathBuf,

    #[arg(long, default_value = "math", help = t!("cli-category"))]
    category: String,

    #[arg(long, value_name = "NAME", help = t!("cli-filename"))]
    filename: Option<String>,
}

#[derive(Args, Debug)]
struct EditArgs {
    #[arg(long, value_name = "FILE", help = t!("cli-path"))]
    path: Option<PathBuf>,

    #[arg(long, value_name = "DIR", default_value = "tests", help = t!("cli-root"))]
    root: PathBuf,
}

/// Format CLI flags to be bold using regex matching
fn format_flags_bold(text: &str) -> String {
    let flag_regex = Regex::new(r"(?m)^(\s*)(--?\w+(?:-\w+[^<\n]*)*)").unwrap();

    flag_regex
        .replace_all(text, |caps: &regex::Captures| {
            format!("{}{}", &caps[1], caps[2].bold())
        })
        .to_string()
}

fn localize_clap_text(mut msg: String) -> String {
    let name = env!("CARGO_PKG_NAME");
    msg = msg.replace("Usage:", &t!("cli-error-usage").bold().underline().to_string());
    msg = msg.replace("Arguments:", &t!("cli-help-arguments").bold().underline().to_string());
    msg = msg.replace("Options:", &t!("cli-help-options").bold().underline().to_string());
    msg = msg.replace("Commands:", &t!("cli-help-commands").bold().underline().to_string());
    msg = msg.replace("[default:", &format!("[{}:", t!("cli-help-default")));
    msg = msg.replace("[possible values:", &format!("[{}:", t!("cli-help-possible-values")));
    msg = msg.replace("For more information, try '--help'.", &t!("cli-error-help-info"));
    msg = msg.replace("error:", &t!("cli-error-label").red().bold().to_string());
    msg = msg.replace(name, &name.bold().to_string());
    format_flags_bold(&msg)
}

/// Format clap errors with localized messages
fn format_clap_error(error: &clap::Error) -> String {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            localize_clap_text(error.render().to_string())
        }
        ErrorKind::DisplayVersion => {
            format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
        }
        ErrorKind::MissingRequiredArgument => localize_clap_text(error.to_string()).replace(
            "the following required arguments were not provided:",
            &t!("cli-error-missing-args"),
        ),
        ErrorKind::InvalidValue => {
            localize_clap_text(error.to_string()).replace("invalid value", &t!("cli-error-invalid-value"))
        }
        _ => localize_clap_text(error.to_string()),
    }
}

fn main() -> Result<()> {
    // Initialize localization first
    i18n::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                println!("{}", format_clap_error(&error));
                std::process::exit(0);
            }
            _ => {
                eprintln!("{}", format_clap_error(&error));
                std::process::exit(2);
            }
        },
    };

    // Initialize tracing based on verbose flag and environment
    let filter = if cli.verbose {
        // With -v, show INFO and above, but allow RUST_LOG to override for debug/trace
        std::env::var("RUST_LOG").unwrap_or_else(|_| "tokenscript_compliance=info".to_string())
    } else {
        std::env::var("RUST_LOG").unwrap_or_else(|_| "tokenscript_compliance=warn".to_string())
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    set_color_override(!cli.no_color);

    match &cli.command {
        Cmd::Run(args) => run(args, cli.verbose),
        Cmd::Create(args) => create(args),
        Cmd::Edit(args) => edit(args),
    }
}

fn run(args: &RunArgs, verbose: bool) -> Result<()> {
    let evaluator = ExternalEvaluator {
        program: args.evaluator.clone(),
        args: args.evaluator_args.clone(),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        quiet: args.silent,
    };

    if verbose {
        info!(
            "{}",
            t_args!("info-version",
                "name" => env!("CARGO_PKG_NAME"),
                "version" => env!("CARGO_PKG_VERSION")
            )
        );
    }

    // Fail fast on configuration errors
    if let Err(e) = evaluator.validate() {
        error!("{}", t_args!("error-validation-failed", "error" => e));
        std::process::exit(2);
    }
    info!("{}", t_args!("info-test-dir", "path" => args.tests.display()));

    let execution = if args.parallel {
        Execution::Parallel
    } else {
        Execution::Sequential
    };
    let report = match ComplianceRunner::new(&evaluator)
        .with_execution(execution)
        .run(&args.tests)
    {
        Ok(report) => report,
        Err(e) => {
            error!("{}", t_args!("error-run-failed", "error" => e));
            std::process::exit(2);
        }
    };

    if let Some(path) = &args.output_file {
        let json = render_json(&report)?;
        fs::write(path, json + "\n")
            .with_context(|| t_args!("error-write-report", "file" => path.display()))?;
    }

    if !args.silent {
        match args.format {
            ReportFormat::Json => println!("{}", render_json(&report)?),
            ReportFormat::Human => print_human(
                &report,
                &RenderOptions {
                    kind: args.style.into(),
                    hide_passes: args.hide_passes,
                    hide_fails: args.hide_fails,
                },
            ),
        }
    }

    info!(
        "{}",
        t_args!("info-all-finished",
            "total" => report.total(),
            "passed" => report.passed,
            "failed" => report.failed
        )
    );

    if report.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn prompt(question: &str) -> Result<String> {
    print!("{question} ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().to_string())
}

fn edit_case(template: &str) -> Result<RawCase> {
    println!("{}", t!("info-opening-editor"));
    let content = edit_in_editor(template)?;
    if content.trim().is_empty() {
        return Err(anyhow!(t!("error-no-input")));
    }
    Ok(parse_editor_content(&content)?)
}

fn create(args: &CreateArgs) -> Result<()> {
    println!("{}", t!("info-creating"));
    let case = edit_case(&blank_template())?;
    let path = new_fixture_path(&args.root, &args.category, args.filename.as_deref(), &case);

    if path.exists() {
        let answer = prompt(&t_args!("prompt-overwrite", "file" => path.display()))?;
        if !answer.to_lowercase().starts_with('y') {
            println!("{}", t!("info-cancelled"));
            return Ok(());
        }
    }
    write_fixture(&path, &case)?;
    println!("{}", t_args!("info-saved", "file" => path.display()));
    Ok(())
}

fn select_fixture(root: &Path) -> Result<Option<PathBuf>> {
    let files = list_fixtures(root)
        .with_context(|| t_args!("error-list-fixtures", "dir" => root.display()))?;
    if files.is_empty() {
        return Err(anyhow!(t_args!("error-no-fixtures", "dir" => root.display())));
    }
    println!("{}", t!("available-fixtures"));
    for (idx, f) in files.iter().enumerate() {
        println!("{}", t_args!("fixture-list-item", "index" => idx + 1, "file" => f.display()));
    }
    loop {
        let choice = prompt(&t!("prompt-select"))?;
        if choice.eq_ignore_ascii_case("q") {
            return Ok(None);
        }
        match choice.parse::<usize>() {
            Ok(n) if (1..=files.len()).contains(&n) => return Ok(Some(files[n - 1].clone())),
            Ok(_) => println!("{}", t!("error-invalid-selection")),
            Err(_) => println!("{}", t!("error-not-a-number")),
        }
    }
}

fn edit(args: &EditArgs) -> Result<()> {
    let path = match &args.path {
        Some(p) => p.clone(),
        None => match select_fixture(&args.root)? {
            Some(p) => p,
            None => return Ok(()),
        },
    };
    println!("{}", t_args!("info-editing", "file" => path.display()));

    let doc = read_fixture(&path)
        .with_context(|| t_args!("error-read-fixture", "file" => path.display()))?;
    if !doc.is_object() {
        return Err(anyhow!(t_args!("error-not-single-case", "file" => path.display())));
    }
    let case = edit_case(&template_from_value(&doc))?;
    write_fixture(&path, &case)?;
    println!("{}", t_args!("info-saved", "file" => path.display()));
    Ok(())
}
