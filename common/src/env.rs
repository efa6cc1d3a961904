use anyhow::{Context, Result};

/// Reads an optional numeric override from the environment. A set but malformed value is an error.
pub fn get_env_usize(key: &str) -> Result<Option<usize>> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<usize>()
            .map(Some)
            .with_context(|| format!("{} must be a valid number, found {:?}", key, value)),
        Err(_) => Ok(None),
    }
}
