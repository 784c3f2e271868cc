mod interactive;

use std::{
    fs::File,
    io::{self, BufWriter, IsTerminal, Read, Write},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use cache_sim::{
    cache::{AccessResult, CacheModel},
    config::{CacheConfig, ValidatedConfig},
    geometry::CacheGeometry,
    sim::Simulator,
    trace::Trace,
};
use clap::{Args, Parser, Subcommand};
use interactive::{parse_addr, parse_size, PartialConfig, Prompter};

#[cfg(feature = "stat")]
use terminal_size::terminal_size;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// simulate a direct-mapped cache over an address trace
    Run(RunArgs),
    /// show how addresses split into tag, index and offset
    Geometry(GeometryArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    delegate: CommonArgs,
    /// File path to the address trace
    #[arg(short, long, default_value = "addresses.txt")]
    trace: PathBuf,
    /// Size of the cache in bytes (e.g. `1024`, `0x400`, `1K`)
    #[arg(long, value_parser = parse_size)]
    cache_size: Option<u32>,
    /// Size of a cache line in bytes
    #[arg(long, value_parser = parse_size)]
    line_size: Option<u32>,
    /// Cycles needed to access the cache (1 to 10)
    #[arg(long)]
    access_cycles: Option<u32>,
    /// File path to a JSON cache configuration
    #[arg(short, long, conflicts_with_all = ["cache_size", "line_size", "access_cycles"])]
    config: Option<PathBuf>,
    /// Ask for missing cache parameters
    #[arg(long)]
    interactive: bool,
    /// Print only the final summary
    #[arg(long)]
    summary_only: bool,
    /// Stop at the first malformed token instead of failing
    #[arg(long)]
    lenient: bool,
    /// File path to write the final report as JSON
    #[arg(long)]
    json: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct GeometryArgs {
    #[command(flatten)]
    delegate: CommonArgs,
    /// Size of the cache in bytes
    #[arg(long, value_parser = parse_size)]
    cache_size: u32,
    /// Size of a cache line in bytes
    #[arg(long, value_parser = parse_size)]
    line_size: u32,
    /// Addresses to decompose (decimal or `0x` hex)
    #[arg(value_parser = parse_addr)]
    addrs: Vec<u32>,
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    match args.command {
        Command::Run(args) => {
            init_logger(&args.delegate);
            run(args)
        }
        Command::Geometry(GeometryArgs {
            delegate,
            cache_size,
            line_size,
            addrs,
        }) => {
            init_logger(&delegate);
            let geometry = CacheGeometry::new(cache_size, line_size)?;
            println!("{geometry}");
            for addr in addrs {
                println!("{addr:#010x}: {}", geometry.decompose(addr));
            }
            Ok(())
        }
    }
}

fn init_logger(common: &CommonArgs) {
    if common.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    } else {
        env_logger::init();
    }
}

fn run(args: RunArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let trace = read_trace(&args.trace, args.lenient)?;
    let mut sim = Simulator::new(config.build());

    let mut out = BufWriter::new(io::stdout().lock());
    let mut written = Ok(());
    sim.run(&trace, |r, model| {
        if !args.summary_only && written.is_ok() {
            written = write_access(&mut out, r, model);
        }
    });
    written?;
    let report = sim.report();
    if args.summary_only {
        writeln!(out, "{report}")?;
    }
    out.flush()?;

    output_stat(&sim);
    if let Some(path) = args.json {
        let mut file = File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        file.write_all(report.to_json()?.as_bytes())?;
        log::info!("report written to {}.", path.display());
    }
    Ok(())
}

fn resolve_config(args: &RunArgs) -> Result<ValidatedConfig> {
    let config = match &args.config {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
            CacheConfig::deser(file)?
        }
        None => {
            let partial = PartialConfig {
                cache_size: args.cache_size,
                line_size: args.line_size,
                access_cycles: args.access_cycles,
            };
            match partial.complete() {
                Some(c) => c,
                None if args.interactive || io::stdin().is_terminal() => {
                    let mut prompter = Prompter::new(io::stdin().lock(), io::stdout());
                    prompter.complete_config(partial)?
                }
                None => {
                    return Err(anyhow!(
                        "cache parameters missing. pass --cache-size, --line-size and --access-cycles, --config, or --interactive."
                    ))
                }
            }
        }
    };
    log::debug!("configuration: {config:?}");
    Ok(config.validate()?)
}

fn read_trace(path: &Path, lenient: bool) -> Result<Trace> {
    let mut buf = String::new();
    let mut file =
        File::open(path).with_context(|| format!("failed to open trace {}", path.display()))?;
    file.read_to_string(&mut buf)?;
    if lenient {
        let (trace, stopped) = Trace::parse_prefix(&buf);
        if let Some(e) = stopped {
            log::warn!("trace truncated: {e}");
        }
        Ok(trace)
    } else {
        Trace::parse(&buf).with_context(|| format!("failed to parse trace {}", path.display()))
    }
}

fn write_access(out: &mut impl Write, r: &AccessResult, model: &CacheModel) -> io::Result<()> {
    writeln!(out, "Cache State (After Access {}):", r.access_count)?;
    for line in model.lines() {
        writeln!(out, "{line}")?;
    }
    writeln!(out, "Total number of accesses: {}", r.access_count)?;
    writeln!(out, "Hit ratio: {}", r.hit_ratio)?;
    writeln!(out, "Miss ratio: {}", r.miss_ratio)?;
    writeln!(out, "Average Memory Access Time (AMAT): {} cycles", r.amat)?;
    writeln!(out)
}

#[cfg(not(feature = "stat"))]
fn output_stat(_: &Simulator) {}

#[cfg(feature = "stat")]
fn output_stat(sim: &Simulator) {
    let max_width = get_terminal_width().unwrap_or(120) as usize;
    log::info!("statistics:\n{}", sim.collect_stat().view(max_width));
}

#[cfg(feature = "stat")]
fn get_terminal_width() -> Option<u16> {
    terminal_size().map(|(w, _)| w.0.saturating_sub(20))
}
