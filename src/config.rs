use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::coordinator::CoordinatorConfig;
use crate::domain::registry::{SolverDescriptor, SolverHandle, SolverRegistry};
use crate::error::ConfigError;

const DEFAULT_PORT: u16 = 9000;
const DEFAULT_JSON_LIMIT: usize = 2 * 1024 * 1024; // 2 MB
const DEFAULT_CACHE_SIZE: usize = 128;
const DEFAULT_SOLVERS: &str = "glpk";

/// Server settings read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub json_limit: usize,
    pub time_limit: Option<Duration>,
    pub max_concurrent: usize,
    pub solvers: Vec<SolverDescriptor>,
    pub report_path: Option<PathBuf>,
    pub cache_size: usize,
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn list_var(name: &str) -> Vec<String> {
    env::var(name)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `name=handle`, or a bare handle registered under its backend or dialect name.
pub fn parse_solver_entry(entry: &str) -> Result<SolverDescriptor, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidSolverEntry {
        entry: entry.to_string(),
        reason,
    };

    let (name, handle) = match entry.split_once('=') {
        Some((name, handle)) => {
            let name = name.trim();
            if name.is_empty() {
                return Err(invalid("empty solver name".to_string()));
            }
            (Some(name.to_string()), handle)
        }
        None => (None, entry),
    };

    let handle = SolverHandle::parse(handle).map_err(|e| invalid(e.to_string()))?;
    let name = name.unwrap_or_else(|| match &handle {
        SolverHandle::Library { backend } => backend.as_str().to_string(),
        SolverHandle::Executable { dialect, .. } => dialect.as_str().to_string(),
    });

    Ok(SolverDescriptor::new(name, handle))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = parse_var::<u16>("PORT").unwrap_or(DEFAULT_PORT);
        let json_limit = parse_var::<usize>("JSON_PAYLOAD_LIMIT").unwrap_or(DEFAULT_JSON_LIMIT);

        let time_limit = parse_var::<f64>("SOLVE_TIME_LIMIT_SECS")
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok());

        let max_concurrent = parse_var::<usize>("MAX_CONCURRENT_RUNS")
            .filter(|n| *n > 0)
            .unwrap_or_else(|| CoordinatorConfig::default().max_concurrent);

        let mut entries = list_var("SOLVERS");
        if entries.is_empty() {
            entries.push(DEFAULT_SOLVERS.to_string());
        }
        let mut solvers = entries
            .iter()
            .map(|entry| parse_solver_entry(entry))
            .collect::<Result<Vec<_>, _>>()?;

        let disabled = list_var("DISABLED_SOLVERS");
        for solver in solvers.iter_mut() {
            if disabled.contains(&solver.name) {
                solver.enabled = false;
            }
        }

        let report_path = env::var("REPORT_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let cache_size = parse_var::<usize>("ENCODE_CACHE_SIZE").unwrap_or(DEFAULT_CACHE_SIZE);

        Ok(Config {
            port,
            json_limit,
            time_limit,
            max_concurrent,
            solvers,
            report_path,
            cache_size,
        })
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            time_limit: self.time_limit,
            max_concurrent: self.max_concurrent,
        }
    }

    /// Registry holding the configured solvers in configuration order.
    pub fn build_registry(&self) -> Result<SolverRegistry, ConfigError> {
        let mut registry = SolverRegistry::new();
        for descriptor in &self.solvers {
            registry.register(descriptor.clone()).map_err(|e| ConfigError::Registry(e.into()))?;
        }
        Ok(registry)
    }
}
