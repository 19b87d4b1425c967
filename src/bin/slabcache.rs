//! Slab Cache Binary
//!
//! Command-line host for the slab cache:
//! - Serve the line protocol over TCP
//! - Run commands against a fresh in-process cache
//! - Interactive command loop on stdin
//!
//! # Examples
//!
//! ```bash
//! # Start server
//! slabcache serve --bind 127.0.0.1:7070
//!
//! # One-shot commands
//! slabcache exec "alloc object_one" "alloc object_two" "free 0" stats
//!
//! # JSON stats after some commands
//! slabcache stats --run "alloc a" --run "access 0" --json
//! ```

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use slabcache::command::{render_error, CommandProcessor, Response};
use slabcache::network::LineServer;
use slabcache::slab::StatsReporter;
use slabcache::{Config, SlabCache};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Slab Cache - fixed-size object pool with a line protocol
#[derive(Parser, Debug)]
#[command(name = "slabcache")]
#[command(version = slabcache::VERSION)]
#[command(about = "Slab Cache - fixed-size object pool with a line protocol", long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// TOML config file
    #[arg(long, global = true, env = "SLABCACHE_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    cache: CacheOverrides,

    /// Log directory path
    #[arg(long, global = true, default_value = "logs", env = "SLABCACHE_LOG_DIR")]
    log_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG adds per-target directives
    #[arg(long, global = true, default_value = "warn", env = "SLABCACHE_LOG_LEVEL")]
    log_level: String,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

/// Command-line overrides for the `[cache]` config section
#[derive(Args, Debug)]
struct CacheOverrides {
    /// Cache name
    #[arg(long, global = true)]
    name: Option<String>,

    /// Object size in bytes
    #[arg(long, global = true)]
    object_size: Option<usize>,

    /// Slots carved per slab
    #[arg(long, global = true)]
    slots_per_slab: Option<usize>,

    /// Maximum number of slabs
    #[arg(long, global = true)]
    max_slabs: Option<usize>,

    /// Maximum payload length in bytes
    #[arg(long, global = true)]
    max_payload_len: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the line protocol over TCP
    Serve(ServeArgs),

    /// Run each argument as one command against a fresh cache
    Exec {
        /// Command lines, e.g. "alloc hello"
        #[arg(required = true)]
        commands: Vec<String>,
    },

    /// Read commands from stdin, one per line
    Repl,

    /// Print the stats report
    Stats(StatsArgs),

    /// Show version
    Version,
}

/// Server arguments
#[derive(Args, Debug)]
struct ServeArgs {
    /// Bind address
    #[arg(short, long, env = "SLABCACHE_BIND")]
    bind: Option<SocketAddr>,

    /// Maximum concurrent connections
    #[arg(long)]
    max_connections: Option<usize>,
}

/// Stats arguments
#[derive(Args, Debug)]
struct StatsArgs {
    /// Command to run before reporting (repeatable)
    #[arg(long = "run")]
    run: Vec<String>,

    /// Print the snapshot as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let _guard = setup_logging(&cli)?;

    let config = load_config(&cli)?;

    // Execute command
    match cli.command {
        Commands::Serve(args) => serve_command(config, args).await,
        Commands::Exec { commands } => exec_command(config, commands),
        Commands::Repl => repl_command(config).await,
        Commands::Stats(args) => stats_command(config, args),
        Commands::Version => {
            println!("slabcache {}", slabcache::VERSION);
            Ok(())
        }
    }
}

/// Setup logging with rolling files and console output
fn setup_logging(cli: &Cli) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(&cli.log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &cli.log_dir, "slabcache.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let log_level = parse_log_level(&cli.log_level)?;

    // Console logs go to stderr so command output on stdout stays clean
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!cli.no_color),
        )
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .init();

    Ok(guard)
}

/// Single level for `--log-level`; per-target directives belong in RUST_LOG
fn parse_log_level(level: &str) -> anyhow::Result<tracing::Level> {
    level
        .parse::<tracing::Level>()
        .with_context(|| format!("Invalid log level '{}'", level))
}

/// Config file (if any) with command-line overrides applied
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    let overrides = &cli.cache;
    if let Some(name) = &overrides.name {
        config.cache.name = name.clone();
    }
    if let Some(object_size) = overrides.object_size {
        config.cache.object_size = object_size;
        if overrides.max_payload_len.is_none() {
            config.cache.max_payload_len = config.cache.max_payload_len.min(object_size);
        }
    }
    if let Some(slots) = overrides.slots_per_slab {
        config.cache.slots_per_slab = slots;
    }
    if let Some(max_slabs) = overrides.max_slabs {
        config.cache.max_slabs = Some(max_slabs);
    }
    if let Some(max_len) = overrides.max_payload_len {
        config.cache.max_payload_len = max_len;
    }

    config.validate()?;
    Ok(config)
}

fn open_processor(config: &Config) -> anyhow::Result<CommandProcessor> {
    let cache = SlabCache::from_config(config.cache.clone())?;
    Ok(CommandProcessor::new(cache))
}

/// Serve command - run the TCP line server until Ctrl-C
async fn serve_command(mut config: Config, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    if let Some(max) = args.max_connections {
        config.server.max_connections = max;
    }
    config.validate()?;

    slabcache::metrics::init_metrics();
    let processor = open_processor(&config)?;
    let cache = processor.cache().clone();
    let server = LineServer::new(config.server.clone(), processor);

    info!(
        cache = %cache.name(),
        object_size = cache.object_size(),
        "Serving on {}",
        config.server.bind_addr
    );

    tokio::select! {
        result = server.serve() => {
            if let Err(e) = &result {
                error!("Server error: {}", e);
            }
            result
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            let freed = cache.free_all()?;
            if freed > 0 {
                warn!(count = freed, "Freed objects still live at shutdown");
            }
            cache.close()?;
            Ok(())
        }
    }
}

/// Exec command - one response line (or block) per argument
fn exec_command(config: Config, commands: Vec<String>) -> anyhow::Result<()> {
    let processor = open_processor(&config)?;
    let mut failures = 0usize;

    for line in &commands {
        if !print_outcome(processor.handle(line)) {
            failures += 1;
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} commands failed", failures, commands.len());
    }
    Ok(())
}

/// Repl command - stdin until EOF or `quit`
async fn repl_command(config: Config) -> anyhow::Result<()> {
    let processor = open_processor(&config)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" => continue,
            "quit" | "exit" => break,
            _ => {
                print_outcome(processor.handle(&line));
            }
        }
    }
    Ok(())
}

/// Stats command - run setup commands, then report
fn stats_command(config: Config, args: StatsArgs) -> anyhow::Result<()> {
    let processor = open_processor(&config)?;

    for line in &args.run {
        if let Err(e) = processor.handle(line) {
            anyhow::bail!("'{}' failed: {}", line, render_error(&e));
        }
    }

    let snapshot = processor.cache().snapshot()?;
    if args.json {
        println!("{}", StatsReporter::render_json(&snapshot)?);
    } else {
        print!("{}", StatsReporter::render(&snapshot));
    }
    Ok(())
}

/// Print a command outcome; returns whether it succeeded
fn print_outcome(outcome: slabcache::error::Result<Response>) -> bool {
    match outcome {
        Ok(response) if response.is_multiline() => {
            print!("{}", response);
            true
        }
        Ok(response) => {
            println!("{}", response);
            true
        }
        Err(e) => {
            println!("{}", render_error(&e));
            false
        }
    }
}
