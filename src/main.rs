use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use wikisieve::config::{SieveConfig, DEFAULT_CHUNK_SIZE, STDIO_PATH, TITLE_TEXT_SIZE_LIMIT};
use wikisieve::language::LanguagePrefilter;
use wikisieve::parser::WikiSource;
use wikisieve::pipeline::{Loaded, PipelineBuilder};
use wikisieve::postfilter::{NonEmptyText, TitlePatterns};
use wikisieve::text_size::{TextSizeLimit, TextSizePrefilter};
use wikisieve::writer::write_tree;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "wikisieve")]
#[command(about = "Extract a filtered subset of a MediaWiki XML dump")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv). -vv logs every page decision, -vvv every revision
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Write log output to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep only one language section of every page
    Language(LanguageArgs),
    /// Keep pages whose title matches any of the given regular expressions
    Title(TitleArgs),
    /// Run the pipeline described by a JSON config file
    Run(RunArgs),
}

#[derive(Args)]
struct OutputArgs {
    /// Output file ("-" for stdout)
    #[arg(short, long, default_value = STDIO_PATH)]
    output: String,

    /// Largest text slice handed to the filters, in bytes
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Print kept/seen counts as JSON to stderr when done
    #[arg(long)]
    stats: bool,
}

#[derive(Args)]
struct LanguageArgs {
    /// Section to keep, as it appears between the == markers (e.g. Polish)
    language: String,

    /// Dump to read (.xml or .xml.bz2, "-" for stdin)
    #[arg(default_value = STDIO_PATH)]
    input: String,

    /// Also accept the name with surrounding whitespace or wrapped in [[ ]]
    #[arg(long)]
    loose: bool,

    /// Maximum characters kept per revision text (-1 for unlimited)
    #[arg(long, default_value_t = TextSizeLimit::UNLIMITED, allow_negative_numbers = true)]
    text_size_limit: i64,

    /// File receiving one line per truncated text
    #[arg(long)]
    text_size_log: Option<String>,

    #[command(flatten)]
    out: OutputArgs,
}

#[derive(Args)]
struct TitleArgs {
    /// Dump to read (.xml or .xml.bz2, "-" for stdin)
    input: String,

    /// Title patterns (regular expressions, unanchored)
    #[arg(required = true)]
    patterns: Vec<String>,

    /// Maximum characters kept per revision text (-1 for unlimited)
    #[arg(long, default_value_t = TITLE_TEXT_SIZE_LIMIT, allow_negative_numbers = true)]
    text_size_limit: i64,

    /// File receiving one line per truncated text
    #[arg(long)]
    text_size_log: Option<String>,

    #[command(flatten)]
    out: OutputArgs,
}

#[derive(Args)]
struct RunArgs {
    /// Pipeline description (JSON)
    #[arg(short, long)]
    config: String,

    /// Dump to read (.xml or .xml.bz2, "-" for stdin)
    #[arg(default_value = STDIO_PATH)]
    input: String,

    #[command(flatten)]
    out: OutputArgs,
}

fn text_size_filter(limit: i64, log: Option<&str>) -> Result<TextSizePrefilter> {
    let filter = TextSizePrefilter::new(TextSizeLimit::from_raw(limit)?);
    Ok(match log {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create text size log: {}", path))?;
            filter.with_log(BufWriter::new(file))
        }
        None => filter,
    })
}

fn open_output(path: &str) -> Result<Box<dyn Write>> {
    if path == STDIO_PATH {
        return Ok(Box::new(BufWriter::new(io::stdout().lock())));
    }
    let file = File::create(path).with_context(|| format!("Failed to create output file: {}", path))?;
    Ok(Box::new(BufWriter::new(file)))
}

fn open_source(input: &str, chunk_size: usize) -> Result<WikiSource<Box<dyn BufRead>>> {
    Ok(WikiSource::open(input)?.with_chunk_size(chunk_size))
}

fn finish(loaded: Loaded, out: &OutputArgs, started: Instant) -> Result<()> {
    let output = open_output(&out.output)?;
    write_tree(&loaded.root, output).with_context(|| format!("Failed to write {}", out.output))?;
    info!(
        pages_kept = loaded.stats.pages_kept,
        pages_seen = loaded.stats.pages_seen,
        duration_secs = started.elapsed().as_secs_f64(),
        "Output written"
    );
    if out.stats {
        let summary = serde_json::to_string_pretty(&loaded.stats)?;
        eprintln!("{}", summary);
    }
    Ok(())
}

fn run_language(args: LanguageArgs) -> Result<()> {
    let started = Instant::now();
    // Configuration is checked before the input is opened
    let language = if args.loose {
        PipelineBuilder::new().text_filter(LanguagePrefilter::loose(&args.language)?)
    } else {
        PipelineBuilder::new().text_filter(LanguagePrefilter::new(&args.language)?)
    };
    let truncate = text_size_filter(args.text_size_limit, args.text_size_log.as_deref())?;

    info!(language = %args.language, input = %args.input, "Filtering by language");
    let loaded = language
        .text_filter(truncate)
        .post_filter(NonEmptyText)
        .source(open_source(&args.input, args.out.chunk_size)?)
        .progress(true)
        .build()?
        .run()?;
    finish(loaded, &args.out, started)
}

fn run_title(args: TitleArgs) -> Result<()> {
    let started = Instant::now();
    let titles = TitlePatterns::new(&args.patterns)?;
    let truncate = text_size_filter(args.text_size_limit, args.text_size_log.as_deref())?;

    info!(patterns = args.patterns.len(), input = %args.input, "Filtering by title");
    let loaded = PipelineBuilder::new()
        .text_filter(truncate)
        .post_filter(titles)
        .source(open_source(&args.input, args.out.chunk_size)?)
        .progress(true)
        .build()?
        .run()?;
    finish(loaded, &args.out, started)
}

fn run_config(args: RunArgs) -> Result<()> {
    let started = Instant::now();
    let config = SieveConfig::from_file(&args.config)?;
    let chunk_size = config.chunk_size.unwrap_or(args.out.chunk_size);
    let pipeline = PipelineBuilder::from_config(&config)?;

    info!(config = %args.config, input = %args.input, "Running configured pipeline");
    let loaded = pipeline
        .source(open_source(&args.input, chunk_size)?)
        .progress(true)
        .build()?
        .run()?;
    finish(loaded, &args.out, started)
}

fn init_logging(verbose: u8, log_file: Option<&str>) -> Result<()> {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false);

    match log_file {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("Failed to create log file: {}", path))?;
            let subscriber = builder.with_ansi(false).with_writer(Mutex::new(file)).finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set tracing subscriber")?;
        }
        None => {
            let subscriber = builder.with_writer(io::stderr).finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set tracing subscriber")?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.log_file.as_deref()) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Commands::Language(args) => run_language(args),
        Commands::Title(args) => run_title(args),
        Commands::Run(args) => run_config(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
