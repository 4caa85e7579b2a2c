use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Name-based identity of a problem: the file's base name without its extension.
///
/// `foo.cnf` and `saves/foo.lpt` are the same problem. Nothing about the content is compared,
/// so two unrelated formulas sharing a base name are merged as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProblemIdentity(String);

impl ProblemIdentity {
    pub fn from_file_name(name: &str) -> Self {
        let path = Path::new(name);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        ProblemIdentity(stem)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProblemIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which loader a submission goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Dimacs,
    Ilp,
}

impl Origin {
    /// `.lp` and `.lpt` files hold programs; everything else is read as DIMACS.
    pub fn from_file_name(name: &str) -> Self {
        let extension = Path::new(name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase());

        match extension.as_deref() {
            Some("lp") | Some("lpt") => Origin::Ilp,
            _ => Origin::Dimacs,
        }
    }
}
