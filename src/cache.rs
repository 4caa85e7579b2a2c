use std::num::NonZeroUsize;

use log::debug;
use lru::LruCache;
use parking_lot::Mutex;

use crate::domain::load::{load, LoadFailure, LoadedProblem, ProblemInput};

const DEFAULT_CAPACITY: usize = 128;

/// Loaded problems keyed by submitted (name, content).
///
/// Only successful loads are kept; failures are cheap to reproduce and must be reported
/// with every submission anyway.
pub struct ProblemCache {
    entries: Mutex<LruCache<(String, String), LoadedProblem>>,
}

impl ProblemCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or_else(|| NonZeroUsize::new(DEFAULT_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        ProblemCache {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Return the cached problem or load it. The lock is not held while loading.
    pub fn load(&self, input: &ProblemInput) -> Result<LoadedProblem, LoadFailure> {
        let key = (input.name.clone(), input.content.clone());

        if let Some(problem) = self.entries.lock().get(&key) {
            debug!("Cache hit for {}", input.name);
            return Ok(problem.clone());
        }

        let problem = load(input)?;
        self.entries.lock().put(key, problem.clone());
        Ok(problem)
    }

    pub fn load_batch(&self, inputs: &[ProblemInput]) -> Vec<Result<LoadedProblem, LoadFailure>> {
        inputs.iter().map(|input| self.load(input)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
