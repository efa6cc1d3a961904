mod bench;
mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use common::{get_env_usize, ConfigLoader, FsExt};
use dotenv::dotenv;
use engine::{FeatureEncoder, PlanarEncoder};
use env_logger::Env;
use log::info;
use nneval::LinearModel;
use rand::SeedableRng;

const MODEL_WEIGHT_SCALE: f32 = 0.05;

fn main() -> Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    if let Some(decode_threads) = get_env_usize("NNEVAL_DECODE_THREADS")? {
        rayon::ThreadPoolBuilder::new()
            .num_threads(decode_threads)
            .build_global()
            .context("Failed to configure the decode thread pool")?;

        info!("Decoding with {} threads", decode_threads);
    }

    let cli = Cli::parse();

    match &cli.command {
        Commands::CreateModel(args) => {
            let out = args.out.relative_to_cwd()?;
            let encoder = PlanarEncoder::new(args.board_size)?;
            let mut rng = rand::rngs::StdRng::seed_from_u64(args.seed);

            let model = LinearModel::random(
                encoder.row_width(),
                encoder.policy_size(),
                MODEL_WEIGHT_SCALE,
                &mut rng,
            );

            out.create_parent_dir()?;
            model.save(&out)?;

            info!(
                "Wrote a {}x{} linear model to {:?}",
                args.board_size, args.board_size, out
            );
        }
        Commands::Bench(args) => {
            let config_path = args.config.relative_to_cwd()?;
            let evaluator_config = ConfigLoader::new(&config_path, "nneval")?;
            let bench_config = ConfigLoader::new(&config_path, "bench")?;

            let evaluator_options = evaluator_config.load()?;
            let bench_options: bench::BenchOptions = bench_config.load()?;

            let model_path = match &args.model {
                Some(model) => model.relative_to_cwd()?,
                None => bench_config.get_relative_path("model_path")?,
            };

            bench::run(&model_path, &evaluator_options, &bench_options)?;
        }
    }

    Ok(())
}
