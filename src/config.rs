use std::{
    fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::Deserialize;
use thiserror::Error;

use crate::core::state::Ticks;

pub const DEFAULT_WORKER: &str = "./process";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config file")]
    Parse(#[from] toml::de::Error),
    #[error("unknown scheduler {0:?}, expected SJF or RR")]
    UnknownPolicy(String),
    #[error("unknown memory strategy {0:?}, expected infinite or best-fit")]
    UnknownMemoryStrategy(String),
    #[error("invalid quantum {0:?}")]
    InvalidQuantum(String),
    #[error("quantum must be positive")]
    ZeroQuantum,
    #[error("option {0} needs a value")]
    MissingValue(String),
    #[error("unknown option {0:?}")]
    UnknownOption(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Policy {
    #[serde(rename = "SJF")]
    ShortestJobFirst,
    #[serde(rename = "RR")]
    RoundRobin,
}

impl FromStr for Policy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SJF" => Ok(Self::ShortestJobFirst),
            "RR" => Ok(Self::RoundRobin),
            _ => Err(ConfigError::UnknownPolicy(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryStrategy {
    Infinite,
    BestFit,
}

impl FromStr for MemoryStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "infinite" => Ok(Self::Infinite),
            "best-fit" => Ok(Self::BestFit),
            _ => Err(ConfigError::UnknownMemoryStrategy(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// Workload file
    pub input: Option<PathBuf>,
    pub policy: Policy,
    pub memory: MemoryStrategy,
    pub quantum: Ticks,
    /// Program spawned for every workload
    pub worker: PathBuf,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            input: None,
            policy: Policy::ShortestJobFirst,
            memory: MemoryStrategy::Infinite,
            quantum: 1,
            worker: PathBuf::from(DEFAULT_WORKER),
        }
    }
}

impl SimConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text)?;
        config.validate()
    }

    /// Builds a config from command-line flags. `-c <file>` is read first;
    /// `-f -s -m -q -w` then override it.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self, ConfigError> {
        let mut pairs = Vec::new();
        let mut iter = args.iter().map(AsRef::as_ref);
        while let Some(flag) = iter.next() {
            let value = iter
                .next()
                .ok_or_else(|| ConfigError::MissingValue(flag.to_string()))?;
            pairs.push((flag, value));
        }

        let mut config = match pairs.iter().rev().find(|(flag, _)| *flag == "-c") {
            Some((_, path)) => Self::from_file(Path::new(path))?,
            None => Self::default(),
        };

        for (flag, value) in pairs {
            match flag {
                "-c" => {}
                "-f" => config.input = Some(PathBuf::from(value)),
                "-s" => config.policy = value.parse()?,
                "-m" => config.memory = value.parse()?,
                "-q" => {
                    config.quantum = value
                        .parse()
                        .map_err(|_| ConfigError::InvalidQuantum(value.to_string()))?
                }
                "-w" => config.worker = PathBuf::from(value),
                other => return Err(ConfigError::UnknownOption(other.to_string())),
            }
        }
        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.quantum == 0 {
            return Err(ConfigError::ZeroQuantum);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn parses_flags() {
        let config =
            SimConfig::from_args(&["-f", "cases/1.txt", "-s", "RR", "-m", "best-fit", "-q", "3"])
                .unwrap();
        assert_eq!(config.input, Some(PathBuf::from("cases/1.txt")));
        assert_eq!(config.policy, Policy::RoundRobin);
        assert_eq!(config.memory, MemoryStrategy::BestFit);
        assert_eq!(config.quantum, 3);
        assert_eq!(config.worker, PathBuf::from(DEFAULT_WORKER));
    }

    #[test]
    fn rejects_bad_flags() {
        assert!(matches!(
            SimConfig::from_args(&["-s", "FIFO"]),
            Err(ConfigError::UnknownPolicy(_))
        ));
        assert!(matches!(
            SimConfig::from_args(&["-m", "first-fit"]),
            Err(ConfigError::UnknownMemoryStrategy(_))
        ));
        assert!(matches!(
            SimConfig::from_args(&["-q", "0"]),
            Err(ConfigError::ZeroQuantum)
        ));
        assert!(matches!(
            SimConfig::from_args(&["-q", "two"]),
            Err(ConfigError::InvalidQuantum(_))
        ));
        assert!(matches!(
            SimConfig::from_args(&["-q"]),
            Err(ConfigError::MissingValue(_))
        ));
        assert!(matches!(
            SimConfig::from_args(&["-x", "1"]),
            Err(ConfigError::UnknownOption(_))
        ));
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "policy = \"RR\"").unwrap();
        writeln!(file, "memory = \"best-fit\"").unwrap();
        writeln!(file, "quantum = 2").unwrap();
        writeln!(file, "worker = \"/opt/worker\"").unwrap();

        let path = file.path().to_str().unwrap();
        let config = SimConfig::from_args(&["-q", "3", "-c", path]).unwrap();
        assert_eq!(config.policy, Policy::RoundRobin);
        assert_eq!(config.memory, MemoryStrategy::BestFit);
        assert_eq!(config.quantum, 3);
        assert_eq!(config.worker, PathBuf::from("/opt/worker"));
    }

    #[test]
    fn config_file_rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cores = 4").unwrap();
        assert!(matches!(
            SimConfig::from_file(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}
