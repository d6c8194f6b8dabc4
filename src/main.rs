//! YaoXiang stream engine - CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use yaoxiang_stream::stream::{Encoding, Mode, Newline, OpenOptions, Registry, Source};
use yaoxiang_stream::util::config::{get_config_path, load_config_file, load_stream_config};
use yaoxiang_stream::util::logger::{self, LogLevel};
use yaoxiang_stream::{NAME, VERSION};

/// Copy, transcode and inspect files through YaoXiang streams
#[derive(Parser, Debug)]
#[command(name = "yxstream")]
#[command(author = "YaoXiang Team")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Stream configuration file (default: ~/.config/yaoxiang/stream.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose output (repeat for debug logging)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write files to standard output
    Cat {
        /// Files to print, or shell commands with --pipe
        #[arg(value_name = "FILE", required = true)]
        inputs: Vec<String>,

        /// Input encoding (a byte order mark overrides the default)
        #[arg(short, long, value_parser = parse_encoding)]
        encoding: Option<Encoding>,

        /// Read the output of shell commands instead of files
        #[arg(long)]
        pipe: bool,

        /// Skip leading `#` lines
        #[arg(long)]
        scripting: bool,
    },

    /// Convert a file from one encoding to another
    Transcode {
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,

        /// Encoding of the input
        #[arg(long, value_parser = parse_encoding)]
        from: Option<Encoding>,

        /// Encoding of the output
        #[arg(long, value_parser = parse_encoding)]
        to: Option<Encoding>,

        /// Write a byte order mark
        #[arg(long)]
        bom: bool,

        /// Newline convention of the output
        #[arg(long, value_parser = parse_newline)]
        newline: Option<Newline>,
    },

    /// Print the properties of streams opened on the given files as JSON
    Props {
        #[arg(value_name = "FILE")]
        files: Vec<PathBuf>,
    },

    /// Print the effective stream configuration
    Config,

    /// Print version information
    Version,
}

fn parse_encoding(name: &str) -> Result<Encoding, String> {
    Encoding::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = Encoding::ALL.iter().map(|e| e.name()).collect();
        format!("unknown encoding `{}` (expected one of: {})", name, known.join(", "))
    })
}

fn parse_newline(name: &str) -> Result<Newline, String> {
    match Newline::from_name(name) {
        Some(Newline::Detect) => Err("`detect` is only valid for input".to_string()),
        Some(mode) => Ok(mode),
        None => Err(format!("unknown newline mode `{}` (expected posix or dos)", name)),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init_with_level(LogLevel::from_verbosity(args.verbose));

    let config = match &args.config {
        Some(path) => load_config_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => load_stream_config().context("Failed to load stream configuration")?,
    };
    let registry = Registry::new(config);

    let result = match args.command {
        Commands::Cat {
            inputs,
            encoding,
            pipe,
            scripting,
        } => {
            let mut options = OpenOptions::new().scripting(scripting);
            options.encoding = encoding;
            cat(&registry, &inputs, pipe, &options)
        }
        Commands::Transcode {
            input,
            output,
            from,
            to,
            bom,
            newline,
        } => transcode(&registry, &input, &output, from, to, bom, newline),
        Commands::Props { files } => props(&registry, &files),
        Commands::Config => show_config(&registry),
        Commands::Version => {
            println!("{} {}", NAME, VERSION);
            Ok(())
        }
    };

    registry.shutdown();
    result
}

fn cat(
    registry: &Arc<Registry>,
    inputs: &[String],
    pipe: bool,
    options: &OpenOptions,
) -> Result<()> {
    let out = registry.std_output().clone();
    for name in inputs {
        let source = if pipe {
            Source::pipe(name)
        } else {
            Source::file(name)
        };
        let input = registry
            .open(&source, Mode::Read, options)
            .with_context(|| format!("Failed to open: {}", source))?;
        let copied = registry.copy_stream_data(&input, &out, None);
        registry
            .close_stream(&input, false)
            .with_context(|| format!("Failed to close: {}", source))?;
        let chars = copied.with_context(|| format!("Failed to copy: {}", source))?;
        debug!(source = %source, chars, "copied");
    }
    registry.flush_output(&out).context("Failed to flush output")?;
    Ok(())
}

fn transcode(
    registry: &Arc<Registry>,
    input: &Path,
    output: &Path,
    from: Option<Encoding>,
    to: Option<Encoding>,
    bom: bool,
    newline: Option<Newline>,
) -> Result<()> {
    let mut read_options = OpenOptions::new();
    read_options.encoding = from;
    let mut write_options = OpenOptions::new().bom(bom);
    write_options.encoding = to;
    write_options.newline = newline;

    let from_stream = registry
        .open(&Source::file(input), Mode::Read, &read_options)
        .with_context(|| format!("Failed to open input: {}", input.display()))?;
    let to_stream = match registry.open(&Source::file(output), Mode::Write, &write_options) {
        Ok(s) => s,
        Err(e) => {
            let _ = registry.close_stream(&from_stream, true);
            return Err(e).with_context(|| format!("Failed to open output: {}", output.display()));
        }
    };

    let copied = registry.copy_stream_data(&from_stream, &to_stream, None);
    let closed_in = registry.close_stream(&from_stream, false);
    let closed_out = registry.close_stream(&to_stream, false);
    let chars = copied.context("Failed to transcode")?;
    closed_in.with_context(|| format!("Failed to close input: {}", input.display()))?;
    closed_out.with_context(|| format!("Failed to close output: {}", output.display()))?;
    debug!(chars, "transcoded");
    Ok(())
}

fn props(
    registry: &Arc<Registry>,
    files: &[PathBuf],
) -> Result<()> {
    for file in files {
        registry
            .open(&Source::file(file), Mode::Read, &OpenOptions::new())
            .with_context(|| format!("Failed to open: {}", file.display()))?;
    }
    let all = registry.stream_properties();
    let json = serde_json::to_string_pretty(&all).context("Failed to serialize properties")?;
    println!("{}", json);
    Ok(())
}

fn show_config(registry: &Arc<Registry>) -> Result<()> {
    match get_config_path() {
        Some(path) => println!("# {}", path.display()),
        None => println!("# no configuration directory"),
    }
    let text = toml::to_string_pretty(registry.config()).context("Failed to serialize config")?;
    print!("{}", text);
    Ok(())
}
