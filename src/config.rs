//! Session configuration
//!
//! Describes the execution session a job runs in and maps it onto the
//! in-process [`ContextConfig`]. Every field is optional so a YAML file and
//! command-line flags can be layered with [`SessionConfig::overlay`].

use crate::error::{PageRankError, PageRankResult};
use rankflow_dataset::{Context, ContextConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Application name used when none is configured
pub const DEFAULT_APP_NAME: &str = "RankFlow";

/// Session settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub app_name: Option<String>,
    /// `local`, `local[N]` or `local[*]`
    pub master: Option<String>,
    pub executor_instances: Option<usize>,
    pub executor_cores: Option<usize>,
    /// Storage memory budget, e.g. `512m` or `2g`
    pub executor_memory: Option<String>,
    pub driver_memory: Option<String>,
    pub shuffle_partitions: Option<usize>,
    pub dynamic_allocation: Option<bool>,
}

impl SessionConfig {
    /// Load settings from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> PageRankResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config: SessionConfig = serde_yaml::from_str(&text)?;
        debug!("Loaded session config from {:?}", path);
        Ok(config)
    }

    pub fn app_name(&self) -> &str {
        self.app_name.as_deref().unwrap_or(DEFAULT_APP_NAME)
    }

    /// Settings from `other` take precedence over ours
    pub fn overlay(self, other: SessionConfig) -> Self {
        Self {
            app_name: other.app_name.or(self.app_name),
            master: other.master.or(self.master),
            executor_instances: other.executor_instances.or(self.executor_instances),
            executor_cores: other.executor_cores.or(self.executor_cores),
            executor_memory: other.executor_memory.or(self.executor_memory),
            driver_memory: other.driver_memory.or(self.driver_memory),
            shuffle_partitions: other.shuffle_partitions.or(self.shuffle_partitions),
            dynamic_allocation: other.dynamic_allocation.or(self.dynamic_allocation),
        }
    }

    /// Configured settings as sorted key/value pairs; unset options are left out
    pub fn as_properties(&self) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        props.insert("rankflow.app.name".to_string(), self.app_name().to_string());
        if let Some(master) = &self.master {
            props.insert("rankflow.master".to_string(), master.clone());
        }
        if let Some(instances) = self.executor_instances {
            props.insert("rankflow.executor.instances".to_string(), instances.to_string());
        }
        if let Some(cores) = self.executor_cores {
            props.insert("rankflow.executor.cores".to_string(), cores.to_string());
        }
        if let Some(memory) = &self.executor_memory {
            props.insert("rankflow.executor.memory".to_string(), memory.clone());
        }
        if let Some(memory) = &self.driver_memory {
            props.insert("rankflow.driver.memory".to_string(), memory.clone());
        }
        if let Some(partitions) = self.shuffle_partitions {
            props.insert("rankflow.shuffle.partitions".to_string(), partitions.to_string());
        }
        if let Some(enabled) = self.dynamic_allocation {
            props.insert("rankflow.dynamicAllocation.enabled".to_string(), enabled.to_string());
        }
        props
    }

    /// Context settings derived from this session
    pub fn context_config(&self) -> PageRankResult<ContextConfig> {
        let mut config = ContextConfig {
            app_name: self.app_name().to_string(),
            ..ContextConfig::default()
        };

        if let Some(parallelism) = self.parallelism()? {
            config.default_parallelism = parallelism;
        }
        if let Some(partitions) = self.shuffle_partitions {
            if partitions == 0 {
                return Err(PageRankError::Config(
                    "shuffle_partitions must be at least 1".to_string(),
                ));
            }
            config.shuffle_partitions = partitions;
        }
        if let Some(memory) = &self.executor_memory {
            config.storage_memory_bytes = Some(parse_memory_size(memory)?);
        }
        if let Some(memory) = &self.driver_memory {
            parse_memory_size(memory)?;
            debug!("driver_memory={} has no effect in a single process", memory);
        }
        if let Some(enabled) = self.dynamic_allocation {
            debug!("dynamic_allocation={} has no effect in a single process", enabled);
        }
        Ok(config)
    }

    /// Create the execution context for this session
    pub fn build_context(&self) -> PageRankResult<Context> {
        let config = self.context_config()?;
        debug!("Session properties: {:?}", self.as_properties());
        Ok(Context::new(config)?)
    }

    /// Worker count: `local[N]` first, then executors times cores
    fn parallelism(&self) -> PageRankResult<Option<usize>> {
        if let Some(master) = &self.master {
            if let Some(threads) = parse_master(master)? {
                return Ok(Some(threads));
            }
        }
        let executors = match (self.executor_instances, self.executor_cores) {
            (None, None) => return Ok(None),
            (instances, cores) => instances.unwrap_or(1) * cores.unwrap_or(1),
        };
        if executors == 0 {
            return Err(PageRankError::Config(
                "executor_instances and executor_cores must be at least 1".to_string(),
            ));
        }
        Ok(Some(executors))
    }
}

/// Thread count named by a master URL; `None` means all available cores
fn parse_master(master: &str) -> PageRankResult<Option<usize>> {
    let master = master.trim();
    if master == "local" {
        return Ok(Some(1));
    }
    let inner = master
        .strip_prefix("local[")
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(|| {
            PageRankError::Config(format!(
                "Unsupported master: {} (expected local, local[N] or local[*])",
                master
            ))
        })?;
    if inner == "*" {
        return Ok(None);
    }
    match inner.parse::<usize>() {
        Ok(threads) if threads > 0 => Ok(Some(threads)),
        _ => Err(PageRankError::Config(format!(
            "Invalid thread count in master: {}",
            master
        ))),
    }
}

/// Parse a size such as `512m`, `2g` or `1024k`. A bare number is in MiB.
pub fn parse_memory_size(value: &str) -> PageRankResult<u64> {
    let invalid = || PageRankError::Config(format!("Invalid memory size: {}", value));

    let lower = value.trim().to_ascii_lowercase();
    let split = lower
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(lower.len());
    let (digits, unit) = lower.split_at(split);
    let amount: u64 = digits.parse().map_err(|_| invalid())?;
    let shift = match unit {
        "b" => 0,
        "k" | "kb" => 10,
        "" | "m" | "mb" => 20,
        "g" | "gb" => 30,
        "t" | "tb" => 40,
        _ => return Err(invalid()),
    };
    amount.checked_mul(1u64 << shift).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_master() {
        assert_eq!(parse_master("local").unwrap(), Some(1));
        assert_eq!(parse_master("local[4]").unwrap(), Some(4));
        assert_eq!(parse_master("local[*]").unwrap(), None);
        assert!(parse_master("local[0]").is_err());
        assert!(parse_master("local[x]").is_err());
        assert!(parse_master("yarn").is_err());
    }

    #[test]
    fn test_parse_memory_size() {
        assert_eq!(parse_memory_size("512m").unwrap(), 512 << 20);
        assert_eq!(parse_memory_size("2G").unwrap(), 2 << 30);
        assert_eq!(parse_memory_size("1024kb").unwrap(), 1 << 20);
        assert_eq!(parse_memory_size("64").unwrap(), 64 << 20);
        assert_eq!(parse_memory_size("100b").unwrap(), 100);
        assert!(parse_memory_size("").is_err());
        assert!(parse_memory_size("lots").is_err());
        assert!(parse_memory_size("5x").is_err());
    }

    #[test]
    fn test_properties_skip_unset_options() {
        let config = SessionConfig {
            master: Some("local[2]".to_string()),
            shuffle_partitions: Some(16),
            dynamic_allocation: Some(false),
            ..SessionConfig::default()
        };
        let props = config.as_properties();
        assert_eq!(props.len(), 4);
        assert_eq!(props["rankflow.app.name"], "RankFlow");
        assert_eq!(props["rankflow.master"], "local[2]");
        assert_eq!(props["rankflow.shuffle.partitions"], "16");
        assert_eq!(props["rankflow.dynamicAllocation.enabled"], "false");
    }

    #[test]
    fn test_context_config_mapping() {
        let config = SessionConfig {
            app_name: Some("ranks".to_string()),
            master: Some("local[3]".to_string()),
            executor_instances: Some(4),
            executor_cores: Some(2),
            executor_memory: Some("1g".to_string()),
            shuffle_partitions: Some(5),
            ..SessionConfig::default()
        };
        let ctx = config.context_config().unwrap();
        assert_eq!(ctx.app_name, "ranks");
        // master wins over executor sizing
        assert_eq!(ctx.default_parallelism, 3);
        assert_eq!(ctx.shuffle_partitions, 5);
        assert_eq!(ctx.storage_memory_bytes, Some(1 << 30));

        let config = SessionConfig {
            executor_instances: Some(4),
            executor_cores: Some(2),
            ..SessionConfig::default()
        };
        assert_eq!(config.context_config().unwrap().default_parallelism, 8);
    }

    #[test]
    fn test_invalid_settings() {
        let bad_master = SessionConfig {
            master: Some("spark://host:7077".to_string()),
            ..SessionConfig::default()
        };
        assert!(matches!(bad_master.context_config(), Err(PageRankError::Config(_))));

        let bad_memory = SessionConfig {
            executor_memory: Some("plenty".to_string()),
            ..SessionConfig::default()
        };
        assert!(matches!(bad_memory.context_config(), Err(PageRankError::Config(_))));

        let zero_cores = SessionConfig {
            executor_cores: Some(0),
            ..SessionConfig::default()
        };
        assert!(matches!(zero_cores.context_config(), Err(PageRankError::Config(_))));
    }

    #[test]
    fn test_overlay_prefers_other() {
        let file = SessionConfig {
            app_name: Some("from-file".to_string()),
            executor_cores: Some(2),
            ..SessionConfig::default()
        };
        let flags = SessionConfig {
            app_name: Some("from-flags".to_string()),
            shuffle_partitions: Some(3),
            ..SessionConfig::default()
        };
        let merged = file.overlay(flags);
        assert_eq!(merged.app_name(), "from-flags");
        assert_eq!(merged.executor_cores, Some(2));
        assert_eq!(merged.shuffle_partitions, Some(3));
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "app_name: nightly").unwrap();
        writeln!(file, "master: \"local[2]\"").unwrap();
        writeln!(file, "executor_memory: 256m").unwrap();
        writeln!(file, "dynamic_allocation: true").unwrap();

        let config = SessionConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.app_name(), "nightly");
        assert_eq!(config.master.as_deref(), Some("local[2]"));
        assert_eq!(config.dynamic_allocation, Some(true));
        assert_eq!(config.executor_cores, None);

        let ctx = config.build_context().unwrap();
        assert_eq!(ctx.default_parallelism(), 2);
        assert_eq!(ctx.app_name(), "nightly");
    }

    #[test]
    fn test_missing_file() {
        let err = SessionConfig::from_yaml_file("/nonexistent/rankflow.yaml").unwrap_err();
        assert!(matches!(err, PageRankError::Io(_)));
    }
}
