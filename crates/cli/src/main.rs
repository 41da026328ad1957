//! PolyTune CLI - genetic tuning of contention load for timing channels.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use polytune_core::{Channel, FixedParams, InitialParams, RunId, WeightMode};
use polytune_evolution::{SearchConfig, SearchController, SearchOutcome};
use polytune_measure::{ChannelTable, MeasurementPort, PerfPort, SimulatedPort};
use polytune_storage::{read_records, JsonlSink};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "polytune")]
#[command(about = "Genetic tuner for contention load generators", long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tune one channel, or every channel in turn
    Tune(TuneArgs),
    /// Print the generations recorded in a run log
    Show {
        /// Path to a `<channel>_run_log.jsonl` file
        log: PathBuf,

        /// Only show generations of this run
        #[arg(long)]
        run: Option<RunId>,
    },
    /// List known channels and their starting parameters
    Channels,
}

#[derive(Args)]
struct TuneArgs {
    /// Channel to tune (cache, network, row_buffer, memory, disk_io, tlb); all when omitted
    #[arg(long)]
    channel: Option<Channel>,

    /// Cores on the machine; one is left to the victim
    #[arg(long, default_value = "4")]
    ncores: usize,

    /// Profiler binary, e.g. perf_4.9
    #[arg(long)]
    perf: Option<String>,

    /// How the secondary metric is weighted (sensitivity|variation)
    #[arg(long, default_value = "sensitivity")]
    weight_mode: WeightMode,

    /// Population size
    #[arg(long, default_value = "10")]
    pop_size: usize,

    /// Elite size
    #[arg(long, default_value = "10")]
    elite_size: usize,

    /// Maximum number of generations
    #[arg(long, default_value = "3000")]
    max_iters: usize,

    /// Stop when the best score moves by no more than this
    #[arg(long, default_value = "0.01")]
    stop_threshold: f64,

    /// Keep the first parameter at its initial value while measuring
    #[arg(long)]
    fix_param1: bool,

    /// Keep the second parameter at its initial value while measuring
    #[arg(long)]
    fix_param2: bool,

    /// Initial parameters, e.g. "1,500,-1,-1" (-1 freezes a dimension)
    #[arg(long, allow_hyphen_values = true, requires = "channel")]
    init: Option<InitialParams>,

    /// Channel table (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory receiving one `<channel>_run_log.jsonl` per channel
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// RNG seed
    #[arg(long)]
    seed: Option<u64>,

    /// Tune against a simulated machine instead of running perf
    #[arg(long)]
    simulate: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Tune(args) => tune(args).await?,
        Commands::Show { log, run } => {
            let mut records = read_records(&log)
                .await
                .with_context(|| format!("failed to read {}", log.display()))?;
            if let Some(run) = run {
                records.retain(|r| r.run_id == run);
            }

            println!("Run log {} ({} generations)", log.display(), records.len());
            for r in records {
                println!(
                    "  {:>5} | {:>14.6} | {:>12.6} | p={:.4} | {} | [{}]{}",
                    r.iteration,
                    r.best_score,
                    r.score_diff,
                    r.mutation_p,
                    r.regime,
                    r.best_params,
                    if r.new_best { " *" } else { "" }
                );
            }
        }
        Commands::Channels => {
            println!("Channels");
            for channel in Channel::ALL {
                let init = channel.default_initial_params().raw();
                println!(
                    "  {:<10} init={:?} secondary={}",
                    channel,
                    init,
                    channel.secondary_metric()
                );
            }
        }
    }

    Ok(())
}

async fn tune(args: TuneArgs) -> Result<()> {
    let mut table = match &args.config {
        Some(path) => ChannelTable::load(path)
            .await
            .with_context(|| format!("failed to load channel table {}", path.display()))?,
        None => ChannelTable::default(),
    };
    if let Some(perf) = &args.perf {
        table = table.with_perf_bin(perf.clone());
    }

    let channels = match args.channel {
        Some(channel) => vec![channel],
        None => Channel::ALL.to_vec(),
    };
    let perf: Arc<dyn MeasurementPort> = Arc::new(PerfPort::new(table));

    let mut outcomes = Vec::with_capacity(channels.len());
    for channel in channels {
        let port = if args.simulate {
            Arc::new(SimulatedPort::for_channel(channel)) as Arc<dyn MeasurementPort>
        } else {
            perf.clone()
        };
        let outcome = tune_channel(&args, channel, port).await?;
        print_outcome(&outcome, args.json)?;
        outcomes.push(outcome);
    }

    if outcomes.len() > 1 && !args.json {
        println!("Summary");
        for o in &outcomes {
            println!("  {:<10} [{}] converged={}", o.channel, o.final_params, o.converged);
        }
    }
    Ok(())
}

async fn tune_channel(args: &TuneArgs, channel: Channel, port: Arc<dyn MeasurementPort>) -> Result<SearchOutcome> {
    let initial = args.init.unwrap_or_else(|| channel.default_initial_params());

    let mut config = SearchConfig::default()
        .with_cores(args.ncores)
        .with_weight_mode(args.weight_mode)
        .with_pop_size(args.pop_size)
        .with_elite_size(args.elite_size)
        .with_max_iters(args.max_iters)
        .with_stop_threshold(args.stop_threshold)
        .with_fixed(FixedParams {
            param1: args.fix_param1,
            param2: args.fix_param2,
        });
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if args.simulate {
        config = config.with_baseline_settle(Duration::ZERO);
    }

    let mut controller = SearchController::new(port.clone(), channel, initial, config)?;
    if let Some(dir) = &args.log_dir {
        let path = dir.join(format!("{}_run_log.jsonl", channel));
        let sink = JsonlSink::create(&path)
            .await
            .with_context(|| format!("failed to create run log {}", path.display()))?;
        info!("Logging generations to {}", path.display());
        controller = controller.with_sink(Box::new(sink));
    }

    tokio::select! {
        result = controller.run() => {
            Ok(result.with_context(|| format!("tuning {} failed", channel))?)
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, tearing down load generators");
            port.teardown_load().await.context("failed to tear down load generators")?;
            anyhow::bail!("interrupted while tuning {}", channel)
        }
    }
}

fn print_outcome(outcome: &SearchOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    println!("Channel: {}", outcome.channel);
    println!("  Params: {}", outcome.final_params);
    println!("  Converged: {}", outcome.converged);
    println!("  Iterations: {}", outcome.iterations);
    println!("  Regime: {}", outcome.regime);
    println!("  Best: [{}] ({:.6})", outcome.best_params, outcome.best_score);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_tune_flags() {
        let cli = Cli::try_parse_from([
            "polytune", "tune", "--channel", "cache", "--init", "-1,835,0,-1", "--fix-param2",
            "--weight-mode", "variation", "--ncores", "8",
        ])
        .unwrap();
        let Commands::Tune(args) = cli.command else {
            panic!("expected tune");
        };
        assert_eq!(args.channel, Some(Channel::Cache));
        assert_eq!(args.init.unwrap().raw(), [-1, 835, 0, -1]);
        assert!(args.fix_param2 && !args.fix_param1);
        assert_eq!(args.weight_mode, WeightMode::Variation);
        assert_eq!(args.max_iters, 3000);
    }

    #[test]
    fn test_show_run_filter() {
        let id = RunId::new();
        let cli = Cli::try_parse_from(["polytune", "show", "cache_run_log.jsonl", "--run", &id.to_string()]).unwrap();
        let Commands::Show { log, run } = cli.command else {
            panic!("expected show");
        };
        assert_eq!(log, PathBuf::from("cache_run_log.jsonl"));
        assert_eq!(run, Some(id));

        assert!(Cli::try_parse_from(["polytune", "show", "log.jsonl", "--run", "not-a-ulid"]).is_err());
    }

    #[test]
    fn test_init_requires_channel() {
        assert!(Cli::try_parse_from(["polytune", "tune", "--init", "1,2,3,4"]).is_err());
    }
}
