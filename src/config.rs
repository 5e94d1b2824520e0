//! Router configuration
//!
//! Loaded from an optional JSON file, then overridden by CLI flags.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{Error, Result};

/// Tunables for preprocessing and repair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Fraction of the node count above which a repair is abandoned in
    /// favour of a full rebuild
    pub rebuild_threshold: f64,
    /// Maximum nodes settled by a single witness search
    pub witness_settle_limit: usize,
    /// Compute initial node importances with rayon
    pub parallel_ordering: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            rebuild_threshold: 0.2,
            witness_settle_limit: 500,
            parallel_ordering: true,
        }
    }
}

impl RouterConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let config: RouterConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.rebuild_threshold > 0.0 && self.rebuild_threshold <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "rebuild_threshold must be in (0, 1], got {}",
                self.rebuild_threshold
            )));
        }
        if self.witness_settle_limit == 0 {
            return Err(Error::InvalidConfig(
                "witness_settle_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of recontracted nodes a repair may touch on a graph of `n_nodes`
    pub fn repair_budget(&self, n_nodes: usize) -> usize {
        (self.rebuild_threshold * n_nodes as f64).floor() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = RouterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.repair_budget(10), 2);
        assert_eq!(config.repair_budget(1000), 200);
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        for threshold in [0.0, -0.5, 1.5, f64::NAN] {
            let config = RouterConfig { rebuild_threshold: threshold, ..Default::default() };
            assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_load_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "rebuild_threshold": 0.5 }}"#).unwrap();

        let config = RouterConfig::load(file.path()).unwrap();
        assert_eq!(config.rebuild_threshold, 0.5);
        assert_eq!(config.witness_settle_limit, 500);
        assert!(config.parallel_ordering);
    }
}
