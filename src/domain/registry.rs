use std::fmt;
use std::path::PathBuf;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{DuplicateNameError, RegistryError};

/// Solver libraries linked into the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryBackend {
    Glpk,
    Highs,
    Gurobi,
}

impl LibraryBackend {
    /// Parse a backend name (case-insensitive)
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "glpk" => Some(LibraryBackend::Glpk),
            "highs" => Some(LibraryBackend::Highs),
            "gurobi" => Some(LibraryBackend::Gurobi),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LibraryBackend::Glpk => "glpk",
            LibraryBackend::Highs => "highs",
            LibraryBackend::Gurobi => "gurobi",
        }
    }
}

/// Command-line conventions of supported solver executables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandDialect {
    Cbc,
    Glpsol,
    Highs,
}

impl CommandDialect {
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cbc" => Some(CommandDialect::Cbc),
            "glpsol" => Some(CommandDialect::Glpsol),
            "highs" => Some(CommandDialect::Highs),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandDialect::Cbc => "cbc",
            CommandDialect::Glpsol => "glpsol",
            CommandDialect::Highs => "highs",
        }
    }
}

/// How a solver is invoked: an in-process library or an executable on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SolverHandle {
    Library { backend: LibraryBackend },
    Executable { dialect: CommandDialect, path: PathBuf },
}

impl SolverHandle {
    /// `glpk`, `highs`, `gurobi`, or `<dialect>:<path>` such as `cbc:/usr/bin/cbc`.
    pub fn parse(text: &str) -> Result<Self, RegistryError> {
        let text = text.trim();
        if let Some(backend) = LibraryBackend::from_name(text) {
            return Ok(SolverHandle::Library { backend });
        }

        match text.split_once(':') {
            Some((dialect, path)) if !path.trim().is_empty() => {
                let dialect = CommandDialect::from_name(dialect.trim())
                    .ok_or_else(|| RegistryError::InvalidHandle(text.to_string()))?;
                Ok(SolverHandle::Executable {
                    dialect,
                    path: PathBuf::from(path.trim()),
                })
            }
            _ => Err(RegistryError::InvalidHandle(text.to_string())),
        }
    }
}

impl fmt::Display for SolverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverHandle::Library { backend } => f.write_str(backend.as_str()),
            SolverHandle::Executable { dialect, path } => {
                write!(f, "{}:{}", dialect.as_str(), path.display())
            }
        }
    }
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverDescriptor {
    pub name: String,
    pub handle: SolverHandle,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl SolverDescriptor {
    pub fn new(name: impl Into<String>, handle: SolverHandle) -> Self {
        SolverDescriptor {
            name: name.into(),
            handle,
            enabled: true,
        }
    }

    pub fn library(name: impl Into<String>, backend: LibraryBackend) -> Self {
        Self::new(name, SolverHandle::Library { backend })
    }

    pub fn executable(name: impl Into<String>, dialect: CommandDialect, path: impl Into<PathBuf>) -> Self {
        Self::new(
            name,
            SolverHandle::Executable {
                dialect,
                path: path.into(),
            },
        )
    }
}

/// The configured solver backends, in registration order.
///
/// Sessions take a snapshot with [`SolverRegistry::enabled`] when they start.
#[derive(Debug, Clone, Default)]
pub struct SolverRegistry {
    descriptors: Vec<SolverDescriptor>,
}

impl SolverRegistry {
    pub fn new() -> Self {
        SolverRegistry::default()
    }

    /// Add `descriptor`, or replace the one with the same name and handle in place.
    pub fn register(&mut self, descriptor: SolverDescriptor) -> Result<(), DuplicateNameError> {
        match self.descriptors.iter_mut().find(|d| d.name == descriptor.name) {
            Some(existing) if existing.handle != descriptor.handle => Err(DuplicateNameError {
                name: descriptor.name,
                existing: existing.handle.to_string(),
                requested: descriptor.handle.to_string(),
            }),
            Some(existing) => {
                *existing = descriptor;
                Ok(())
            }
            None => {
                info!("Registered solver {} ({})", descriptor.name, descriptor.handle);
                self.descriptors.push(descriptor);
                Ok(())
            }
        }
    }

    pub fn deregister(&mut self, name: &str) -> Result<SolverDescriptor, RegistryError> {
        let position = self
            .descriptors
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| RegistryError::UnknownSolver(name.to_string()))?;
        info!("Deregistered solver {}", name);
        Ok(self.descriptors.remove(position))
    }

    pub fn enable(&mut self, name: &str) -> Result<(), RegistryError> {
        self.set_enabled(name, true)
    }

    pub fn disable(&mut self, name: &str) -> Result<(), RegistryError> {
        self.set_enabled(name, false)
    }

    fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), RegistryError> {
        let descriptor = self
            .descriptors
            .iter_mut()
            .find(|d| d.name == name)
            .ok_or_else(|| RegistryError::UnknownSolver(name.to_string()))?;
        descriptor.enabled = enabled;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&SolverDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    pub fn list(&self) -> &[SolverDescriptor] {
        &self.descriptors
    }

    /// Snapshot of the descriptors taking part in the next session.
    pub fn enabled(&self) -> Vec<SolverDescriptor> {
        self.descriptors.iter().filter(|d| d.enabled).cloned().collect()
    }
}
