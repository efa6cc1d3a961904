use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[clap(author, version)]
#[clap(name = "nneval-client")]
#[clap(about = "Creates models for and benchmarks the batched evaluator", long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    CreateModel(CreateModelCommand),
    Bench(BenchCommand),
}

#[derive(Args)]
#[clap(about = "Writes a randomly initialised linear model for the planar encoder.", long_about = None)]
pub struct CreateModelCommand {
    #[clap(short, long, default_value_t = String::from("model.json"))]
    pub out: String,

    #[clap(short, long, default_value_t = 9)]
    pub board_size: usize,

    #[clap(short, long, default_value_t = 0)]
    pub seed: u64,
}

#[derive(Args)]
#[clap(about = "Runs many search threads against the evaluator and reports throughput and latency.", long_about = None)]
pub struct BenchCommand {
    #[clap(short, long, default_value_t = String::from("bench.conf"))]
    pub config: String,

    /// Overrides `model_path` from the config.
    #[clap(short, long)]
    pub model: Option<String>,
}
