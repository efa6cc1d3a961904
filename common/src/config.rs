use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, ensure, Context, Result};
use hocon::{Hocon, HoconLoader};

/// Reads settings from a HOCON file. A key is looked up in the environment first
/// (as `{SCOPE}_{KEY}` uppercased), then in the scoped section of the file, then at the root.
#[derive(Debug)]
pub struct ConfigLoader {
    hocon: Hocon,
    env: HashMap<String, String>,
    scope: String,
    base_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(path: impl AsRef<Path>, scope: &str) -> Result<Self> {
        let path = path.as_ref();
        ensure!(path.is_file(), "The config file {:?} was not found", path);

        let hocon = HoconLoader::new()
            .load_file(path)
            .with_context(|| format!("Failed to load config file at: {:?}", path))?
            .hocon()
            .with_context(|| format!("Failed to parse config file at: {:?}", path))?;

        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            hocon,
            env: std::env::vars().collect(),
            scope: scope.to_string(),
            base_dir,
        })
    }

    pub fn from_source(source: &str, scope: &str) -> Result<Self> {
        let hocon = HoconLoader::new()
            .load_str(source)
            .context("Failed to load config source")?
            .hocon()
            .context("Failed to parse config source")?;

        Ok(Self {
            hocon,
            env: HashMap::new(),
            scope: scope.to_string(),
            base_dir: std::env::current_dir()?,
        })
    }

    /// Replaces the environment snapshot taken at construction.
    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.env.get(&self.env_key(name)) {
            return Some(Value::String(value.clone()));
        }

        let scope = &self.hocon[self.scope.as_str()];
        if matches!(scope, Hocon::Hash(_)) {
            if let Some(value) = Self::map_hocon(scope, name) {
                return Some(value);
            }
        }

        Self::map_hocon(&self.hocon, name)
    }

    pub fn get_usize(&self, name: &str, default: usize) -> usize {
        self.get(name).and_then(|v| v.as_usize()).unwrap_or(default)
    }

    pub fn get_f32(&self, name: &str, default: f32) -> f32 {
        self.get(name).and_then(|v| v.as_f32()).unwrap_or(default)
    }

    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        self.get(name).and_then(|v| v.as_bool()).unwrap_or(default)
    }

    pub fn get_string(&self, name: &str, default: &str) -> String {
        self.get(name)
            .and_then(|v| v.as_string())
            .unwrap_or_else(|| default.to_string())
    }

    /// Resolves a path valued key relative to the directory holding the config file.
    pub fn get_relative_path(&self, name: &str) -> Result<PathBuf> {
        let value = self
            .get(name)
            .and_then(|v| v.as_string())
            .ok_or_else(|| anyhow!("Config key {} is missing", name))?;

        Ok(self.base_dir.join(value))
    }

    pub fn load<T: Config>(&self) -> Result<T> {
        T::load(self).with_context(|| format!("Failed to load the {} config", self.scope))
    }

    fn env_key(&self, name: &str) -> String {
        format!("{}_{}", self.scope, name).to_uppercase()
    }

    fn map_hocon(hocon: &Hocon, name: &str) -> Option<Value> {
        match &hocon[name] {
            Hocon::Real(f64) => Some(Value::Float(*f64 as f32)),
            Hocon::Integer(i64) => usize::try_from(*i64).ok().map(Value::Integer),
            Hocon::String(string) => Some(Value::String(string.clone())),
            Hocon::Boolean(bool) => Some(Value::Boolean(*bool)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(usize),
    Float(f32),
    Boolean(bool),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(val) => Some(*val),
            Value::String(val) => Hocon::String(val.clone()).as_bool(),
            Value::Integer(val) => Some(*val != 0),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match self {
            Value::Integer(val) => Some(*val),
            Value::String(val) => val.trim().parse::<usize>().ok(),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(val) => Some(*val),
            Value::Integer(val) => Some(*val as f32),
            Value::String(val) => val.trim().parse::<f32>().ok(),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::String(val) => Some(val.clone()),
            Value::Boolean(val) => Some(val.to_string()),
            Value::Float(val) => Some(val.to_string()),
            Value::Integer(val) => Some(val.to_string()),
        }
    }
}

pub trait Config {
    fn load(config: &ConfigLoader) -> Result<Self>
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SOURCE: &str = r#"
        threads = 2
        nneval {
            max_batch_size = 16
            grace = 0.5
            randomize = false
            seed = "abc"
        }
    "#;

    #[test]
    fn test_get_scoped_value() {
        let config = ConfigLoader::from_source(SOURCE, "nneval").unwrap();

        assert_eq!(config.get_usize("max_batch_size", 1), 16);
        assert_eq!(config.get_string("seed", "x"), "abc");
        assert!(!config.get_bool("randomize", true));
    }

    #[test]
    fn test_get_falls_back_to_root() {
        let config = ConfigLoader::from_source(SOURCE, "nneval").unwrap();

        assert_eq!(config.get_usize("threads", 1), 2);
    }

    #[test]
    fn test_get_missing_uses_default() {
        let config = ConfigLoader::from_source(SOURCE, "nneval").unwrap();

        assert_eq!(config.get_usize("missing", 7), 7);
        assert_eq!(config.get("missing"), None);
    }

    #[test]
    fn test_get_float() {
        let config = ConfigLoader::from_source(SOURCE, "nneval").unwrap();

        assert_eq!(config.get_f32("grace", 0.0), 0.5);
        assert_eq!(config.get_f32("max_batch_size", 0.0), 16.0);
    }

    #[test]
    fn test_env_overrides_file() {
        let env = [("NNEVAL_MAX_BATCH_SIZE".to_string(), "64".to_string())]
            .into_iter()
            .collect();
        let config = ConfigLoader::from_source(SOURCE, "nneval")
            .unwrap()
            .with_env(env);

        assert_eq!(config.get_usize("max_batch_size", 1), 64);
    }

    #[test]
    fn test_env_bool_string() {
        let env = [("NNEVAL_RANDOMIZE".to_string(), "true".to_string())]
            .into_iter()
            .collect();
        let config = ConfigLoader::from_source(SOURCE, "nneval")
            .unwrap()
            .with_env(env);

        assert!(config.get_bool("randomize", false));
    }

    #[test]
    fn test_load_file_and_relative_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.conf");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "bench {{ model = \"models/model.json\" }}").unwrap();

        let config = ConfigLoader::new(&path, "bench").unwrap();
        let model = config.get_relative_path("model").unwrap();

        assert_eq!(model, dir.path().join("models/model.json"));
        assert!(config.get_relative_path("games").is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();

        assert!(ConfigLoader::new(dir.path().join("nope.conf"), "bench").is_err());
    }
}
