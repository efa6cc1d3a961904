use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{anyhow, ensure, Context, Result};
use common::{create_rng_from_seed, Config, ConfigLoader};
use crossbeam::channel::{self, Sender};
use engine::{PlanarEncoder, Position};
use log::{info, warn};
use nneval::{Evaluator, EvaluatorOptions, LinearModel, NNOutput, ResultSlot};
use rand::Rng;

type BenchEvaluator = Evaluator<PlanarEncoder, LinearModel>;

#[derive(Clone, Debug, PartialEq)]
pub struct BenchOptions {
    pub board_size: usize,
    pub search_threads: usize,
    pub positions_per_thread: usize,
    /// A search thread starts over from an empty board after this many moves.
    pub max_moves: usize,
    pub seed: String,
}

impl Config for BenchOptions {
    fn load(config: &ConfigLoader) -> Result<Self> {
        let options = Self {
            board_size: config.get_usize("board_size", 9),
            search_threads: config.get_usize("search_threads", 32),
            positions_per_thread: config.get_usize("positions_per_thread", 1000),
            max_moves: config.get_usize("max_moves", 40),
            seed: config.get_string("seed", "bench"),
        };

        ensure!(options.search_threads > 0, "search_threads must be at least 1");
        ensure!(options.max_moves > 0, "max_moves must be at least 1");

        Ok(options)
    }
}

pub fn run(model_path: &Path, evaluator_options: &EvaluatorOptions, options: &BenchOptions) -> Result<()> {
    let encoder = PlanarEncoder::new(options.board_size)?;
    let evaluator = Arc::new(BenchEvaluator::load(model_path, encoder, evaluator_options)?);
    let servers = evaluator.spawn_from_options(evaluator_options)?;

    info!(
        "Running {} search threads with {} server threads, max batch size {}",
        options.search_threads, evaluator_options.num_server_threads, evaluator_options.max_batch_size
    );

    let start = Instant::now();
    let (latency_tx, latency_rx) = channel::unbounded();
    let searches = spawn_searches(&evaluator, options, latency_tx);

    let latencies = latency_rx.iter().collect::<Vec<Duration>>();
    let elapsed = start.elapsed();

    let search_results = match searches {
        Ok(searches) => searches
            .into_iter()
            .map(|search| {
                search
                    .join()
                    .map_err(|_| anyhow!("A search thread panicked"))
                    .and_then(|result| result)
            })
            .collect::<Result<()>>(),
        Err(err) => Err(err),
    };

    evaluator.kill_servers();
    for server in servers {
        if server.join().is_err() {
            warn!("A server thread panicked");
        }
    }

    search_results?;

    let stats = LatencyStats::new(latencies).context("No positions were evaluated")?;
    info!(
        "Evaluated {} positions in {:.2}s ({:.0} evals/s)",
        stats.count,
        elapsed.as_secs_f32(),
        stats.count as f32 / elapsed.as_secs_f32().max(f32::EPSILON)
    );
    info!(
        "Latency mean: {:?}, p50: {:?}, p99: {:?}, max: {:?}",
        stats.mean, stats.p50, stats.p99, stats.max
    );

    Ok(())
}

fn spawn_searches(
    evaluator: &Arc<BenchEvaluator>,
    options: &BenchOptions,
    latency_tx: Sender<Duration>,
) -> Result<Vec<JoinHandle<Result<()>>>> {
    (0..options.search_threads)
        .map(|index| {
            let evaluator = evaluator.clone();
            let latency_tx = latency_tx.clone();
            let mut rng = create_rng_from_seed(&options.seed, index);
            let options = options.clone();

            std::thread::Builder::new()
                .name(format!("search-{}", index))
                .spawn(move || -> Result<()> {
                    let mut slot = ResultSlot::new();
                    let mut position = Position::new(options.board_size)?;
                    let mut num_moves = 0;

                    for _ in 0..options.positions_per_thread {
                        let requested = Instant::now();
                        let output = evaluator.evaluate(&position, &mut slot)?;
                        latency_tx.send(requested.elapsed())?;

                        let loc = sample_move(&output, &mut rng)
                            .context("Evaluation returned no legal moves")?;
                        num_moves += 1;

                        if loc == position.pass_loc() || num_moves >= options.max_moves {
                            position = Position::new(options.board_size)?;
                            num_moves = 0;
                        } else {
                            position.play(loc)?;
                        }
                    }

                    Ok(())
                })
                .with_context(|| format!("Failed to spawn search thread {}", index))
        })
        .collect()
}

/// Picks a legal move in proportion to its policy.
fn sample_move<R: Rng>(output: &NNOutput, rng: &mut R) -> Option<usize> {
    let mut remaining = rng.gen::<f32>();
    let mut last = None;

    for (loc, prob) in output.legal_moves() {
        if remaining < prob {
            return Some(loc);
        }

        remaining -= prob;
        last = Some(loc);
    }

    last
}

struct LatencyStats {
    count: usize,
    mean: Duration,
    p50: Duration,
    p99: Duration,
    max: Duration,
}

impl LatencyStats {
    fn new(mut latencies: Vec<Duration>) -> Option<Self> {
        let max = *latencies.iter().max()?;
        latencies.sort_unstable();

        let count = latencies.len();
        let percentile = |p: f32| latencies[((count - 1) as f32 * p).round() as usize];

        Some(Self {
            count,
            mean: mean_duration(latencies.iter().sum(), count),
            p50: percentile(0.5),
            p99: percentile(0.99),
            max,
        })
    }
}

fn mean_duration(total: Duration, count: usize) -> Duration {
    Duration::from_secs_f64(total.as_secs_f64() / count as f64)
}
