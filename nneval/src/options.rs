use std::time::Duration;

use anyhow::{ensure, Result};
use common::{Config, ConfigLoader};
use engine::Symmetry;
use log::warn;

pub const DEFAULT_MAX_BATCH_SIZE: usize = 32;
pub const DEFAULT_BATCH_GRACE_PERIOD: Duration = Duration::from_micros(2000);

#[derive(Clone, Debug, PartialEq)]
pub struct EvaluatorOptions {
    pub max_batch_size: usize,
    pub num_server_threads: usize,
    /// How long a server waits for a partially filled batch to fill before claiming it.
    pub batch_grace_period: Duration,
    pub randomize_symmetries: bool,
    pub symmetry_seed: String,
    pub default_symmetry: Symmetry,
    /// Zero disables the reporter.
    pub report_interval: Duration,
}

impl EvaluatorOptions {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_batch_size > 0, "max_batch_size must be at least 1");
        ensure!(self.num_server_threads > 0, "num_server_threads must be at least 1");

        if self.randomize_symmetries && self.default_symmetry != Symmetry::IDENTITY {
            warn!(
                "default_symmetry {} is ignored because randomize_symmetries is set",
                self.default_symmetry
            );
        }

        Ok(())
    }
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            num_server_threads: 1,
            batch_grace_period: DEFAULT_BATCH_GRACE_PERIOD,
            randomize_symmetries: true,
            symmetry_seed: "nneval".to_string(),
            default_symmetry: Symmetry::IDENTITY,
            report_interval: Duration::from_secs(5),
        }
    }
}

impl Config for EvaluatorOptions {
    fn load(config: &ConfigLoader) -> Result<Self> {
        let defaults = Self::default();

        let options = Self {
            max_batch_size: config.get_usize("max_batch_size", defaults.max_batch_size),
            num_server_threads: config.get_usize("num_server_threads", defaults.num_server_threads),
            batch_grace_period: Duration::from_micros(config.get_usize(
                "batch_grace_period_micros",
                defaults.batch_grace_period.as_micros() as usize,
            ) as u64),
            randomize_symmetries: config
                .get_bool("randomize_symmetries", defaults.randomize_symmetries),
            symmetry_seed: config.get_string("symmetry_seed", &defaults.symmetry_seed),
            default_symmetry: Symmetry::try_from(config.get_usize("default_symmetry", 0))?,
            report_interval: Duration::from_secs(config.get_usize(
                "report_interval_secs",
                defaults.report_interval.as_secs() as usize,
            ) as u64),
        };

        options.validate()?;

        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_defaults() {
        let config = ConfigLoader::from_source("nneval {}", "nneval").unwrap();
        let options: EvaluatorOptions = config.load().unwrap();

        assert_eq!(options, EvaluatorOptions::default());
    }

    #[test]
    fn test_load_values() {
        let config = ConfigLoader::from_source(
            r#"
            nneval {
                max_batch_size = 8
                num_server_threads = 3
                batch_grace_period_micros = 500
                randomize_symmetries = false
                symmetry_seed = "run-7"
                default_symmetry = 5
                report_interval_secs = 0
            }
            "#,
            "nneval",
        )
        .unwrap();
        let options: EvaluatorOptions = config.load().unwrap();

        assert_eq!(options.max_batch_size, 8);
        assert_eq!(options.num_server_threads, 3);
        assert_eq!(options.batch_grace_period, Duration::from_micros(500));
        assert!(!options.randomize_symmetries);
        assert_eq!(options.symmetry_seed, "run-7");
        assert_eq!(options.default_symmetry, Symmetry::try_from(5usize).unwrap());
        assert_eq!(options.report_interval, Duration::ZERO);
    }

    #[test]
    fn test_load_rejects_invalid_symmetry() {
        let config = ConfigLoader::from_source("nneval { default_symmetry = 8 }", "nneval").unwrap();

        assert!(config.load::<EvaluatorOptions>().is_err());
    }

    #[test]
    fn test_load_rejects_zero_batch_size() {
        let config = ConfigLoader::from_source("nneval { max_batch_size = 0 }", "nneval").unwrap();

        assert!(config.load::<EvaluatorOptions>().is_err());
    }

    #[test]
    fn test_env_overrides_batch_size() {
        let env = [("NNEVAL_MAX_BATCH_SIZE".to_string(), "128".to_string())]
            .into_iter()
            .collect();
        let config = ConfigLoader::from_source("nneval { max_batch_size = 8 }", "nneval")
            .unwrap()
            .with_env(env);
        let options: EvaluatorOptions = config.load().unwrap();

        assert_eq!(options.max_batch_size, 128);
    }
}
