//! epub2md - Convert EPUB ebooks to Markdown

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;

use epub2md::{
    CancellationToken, ChapterProgress, ConversionOptions, ConversionResult, Pipeline, read_epub,
};

/// Exit code for a second Ctrl+C.
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "epub2md")]
#[command(version, about = "Convert EPUB ebooks to Markdown", long_about = None)]
#[command(after_help = "EXAMPLES:
    epub2md book.epub                 Write book.md and images/ next to the input
    epub2md book.epub -o out/book.md  Choose the output path
    epub2md book.epub --no-toc --json Skip the contents block, print a JSON report")]
struct Cli {
    /// Input EPUB file
    #[arg(value_name = "INPUT", required_unless_present = "gui")]
    input: Option<PathBuf>,

    /// Output Markdown file (default: input with .md extension)
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Do not extract images or rewrite image references
    #[arg(long)]
    no_images: bool,

    /// Do not generate a table of contents
    #[arg(long)]
    no_toc: bool,

    /// Launch the graphical interface
    #[arg(long)]
    gui: bool,

    /// Suppress progress and summary messages
    #[arg(short, long)]
    quiet: bool,

    /// Print a JSON summary to stdout
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    output: &'a Path,
    image_count: usize,
    heading_count: usize,
    warnings: Vec<String>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if cli.gui {
        eprintln!("error: no graphical front-end is available in this build; run without --gui");
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let input = cli.input.as_deref().ok_or("no input file given")?;
    check_input(input)?;
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| input.with_extension("md"));

    let options = ConversionOptions::new()
        .with_extract_images(!cli.no_images)
        .with_generate_toc(!cli.no_toc);

    let token = CancellationToken::new();
    install_interrupt_handler(token.clone());

    let book = read_epub(input).map_err(|e| e.to_string())?;

    let quiet = cli.quiet;
    let progress = move |p: &ChapterProgress<'_>| {
        if !quiet {
            eprintln!("[{}/{}] {}", p.completed, p.total, p.chapter_id);
        }
    };

    let result = Pipeline::new(options)
        .with_observer(&progress)
        .with_cancellation(token)
        .write(&book, &output)
        .map_err(|e| e.to_string())?;

    if cli.json {
        let report = report(&output, &result);
        let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
        println!("{json}");
    } else if !cli.quiet {
        for warning in &result.warnings {
            eprintln!("warning: {warning}");
        }
        eprintln!(
            "Wrote {} ({} headings, {} images, {} warnings)",
            output.display(),
            result.heading_count,
            result.image_count,
            result.warnings.len()
        );
    }

    Ok(())
}

fn check_input(input: &Path) -> Result<(), String> {
    if !input.is_file() {
        return Err(format!("input file not found: {}", input.display()));
    }
    let is_epub = input
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("epub"));
    if !is_epub {
        return Err(format!("input is not an .epub file: {}", input.display()));
    }
    Ok(())
}

fn report<'a>(output: &'a Path, result: &ConversionResult) -> Report<'a> {
    Report {
        output,
        image_count: result.image_count,
        heading_count: result.heading_count,
        warnings: result.warnings.iter().map(ToString::to_string).collect(),
    }
}

/// First Ctrl+C cancels at the next chapter boundary; a second one exits immediately.
fn install_interrupt_handler(token: CancellationToken) {
    if let Err(e) = ctrlc::set_handler(move || {
        if token.is_cancelled() {
            std::process::exit(EXIT_INTERRUPTED);
        }
        token.cancel();
        eprintln!("\nInterrupted. Stopping after the current chapter...");
    }) {
        log::warn!("failed to set Ctrl+C handler: {e}");
    }
}
