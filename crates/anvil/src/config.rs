use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use blockscan_engine::error::ConfigError;
use blockscan_engine::index::{DEFAULT_BATCH_SIZE, DEFAULT_CAP, IndexOptions};
use blockscan_engine::target::TargetSet;
use blockscan_engine::world::Dimension;

use crate::registry;
use crate::world::parse_dimension;

/// Settings for one scan. Loaded from a JSON file, then overridden by
/// command-line flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub world: PathBuf,
    /// Block names or `*` patterns.
    pub find: Vec<String>,
    /// Empty scans every dimension in the world.
    pub dimensions: Vec<String>,
    /// Index directory; no index is written when unset.
    pub index: Option<PathBuf>,
    pub cap: usize,
    pub batch_size: usize,
    pub workers: usize,
    pub structures: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            world: PathBuf::from("world"),
            find: Vec::new(),
            dimensions: Vec::new(),
            index: None,
            cap: DEFAULT_CAP,
            batch_size: DEFAULT_BATCH_SIZE,
            workers: 0,
            structures: false,
        }
    }
}

/// Value following `flag`, if present.
pub fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter().skip_while(|a| *a != flag).nth(1).cloned()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// `--config FILE` if given, else defaults; then every other flag on top.
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut config = match flag_value(args, "--config") {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_args(args)?;
        Ok(config)
    }

    pub fn apply_args(&mut self, args: &[String]) -> Result<()> {
        if let Some(world) = flag_value(args, "--world") {
            self.world = world.into();
        }
        if let Some(find) = flag_value(args, "--find") {
            self.find = split_list(&find);
        }
        if let Some(dimension) = flag_value(args, "--dimension") {
            self.dimensions = split_list(&dimension);
        }
        if let Some(index) = flag_value(args, "--index") {
            self.index = Some(index.into());
        }
        if let Some(cap) = flag_value(args, "--cap") {
            let cap: i64 = cap.parse().with_context(|| format!("--cap expects a number, got `{cap}`"))?;
            if cap < 1 {
                return Err(ConfigError::InvalidCap(cap).into());
            }
            self.cap = cap as usize;
        }
        if let Some(workers) = flag_value(args, "--workers") {
            self.workers = workers
                .parse()
                .with_context(|| format!("--workers expects a number, got `{workers}`"))?;
        }
        if args.iter().any(|a| a == "--structures") {
            self.structures = true;
        }
        Ok(())
    }

    /// Expand `find` against the vanilla registry. Exact names outside it
    /// (modded blocks) are kept.
    pub fn targets(&self) -> Result<TargetSet, ConfigError> {
        if self.find.is_empty() {
            return Err(ConfigError::EmptyTargets);
        }
        TargetSet::expand(&self.find, registry::vanilla_block_names().iter())
    }

    pub fn dimensions(&self) -> Vec<Dimension> {
        self.dimensions.iter().map(|d| parse_dimension(d)).collect()
    }

    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            cap: self.cap,
            batch_size: self.batch_size,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.find.is_empty() {
            bail!(ConfigError::EmptyTargets);
        }
        self.index_options().validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &str) -> Vec<String> {
        raw.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn flags_override_defaults() {
        let config = PipelineConfig::from_args(&args(
            "blockscan scan --world /tmp/w --find nether_portal,*_ore --dimension nether --cap 50 --structures",
        ))
        .unwrap();
        assert_eq!(config.world, PathBuf::from("/tmp/w"));
        assert_eq!(config.find, vec!["nether_portal", "*_ore"]);
        assert_eq!(config.dimensions(), vec![Dimension::nether()]);
        assert_eq!(config.cap, 50);
        assert!(config.structures);
        assert!(config.index.is_none());
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn zero_cap_flag_is_rejected() {
        let err = PipelineConfig::from_args(&args("scan --find stone --cap 0")).unwrap_err();
        assert_eq!(err.downcast_ref::<ConfigError>(), Some(&ConfigError::InvalidCap(0)));
    }

    #[test]
    fn file_then_flags() {
        let path = std::env::temp_dir().join(format!("blockscan_config_{}.json", std::process::id()));
        fs::write(&path, r#"{ "world": "saves/alpha", "find": ["ancient_debris"], "cap": 7 }"#).unwrap();

        let raw = format!("scan --config {} --cap 9", path.display());
        let config = PipelineConfig::from_args(&args(&raw)).unwrap();
        assert_eq!(config.world, PathBuf::from("saves/alpha"));
        assert_eq!(config.find, vec!["ancient_debris"]);
        assert_eq!(config.cap, 9);
        assert_eq!(config.workers, 0);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_targets_fail_validation() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_err());
        assert_eq!(config.targets().err(), Some(ConfigError::EmptyTargets));
    }
}
