//! Memoized plan storage
//!
//! One cache per backend, keyed by the full [`LogicalProblem`]. The hot path
//! takes only the read lock; a miss takes the write lock, double-checks, then
//! builds while holding it so each key is built at most once.

use crate::error::Result;
use crate::problem::LogicalProblem;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Cumulative hit/miss counters for one plan cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served by an existing plan
    pub hits: u64,
    /// Lookups that attempted a plan build (failed builds count too)
    pub misses: u64,
}

/// A memoizing map from logical problems to built plans
pub struct PlanCache<P> {
    plans: RwLock<HashMap<LogicalProblem, Arc<P>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<P> PlanCache<P> {
    /// Create an empty cache
    pub fn new() -> Self {
        PlanCache {
            plans: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached plan for `problem`, building it with `build` on a
    /// miss. A failed build propagates and stores nothing, so the next lookup
    /// retries.
    pub fn lookup_or_build<F>(&self, problem: &LogicalProblem, build: F) -> Result<Arc<P>>
    where
        F: FnOnce() -> Result<P>,
    {
        if let Some(plan) = self.plans.read().get(problem) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(kind = ?problem.kind, shape = ?problem.shape, "plan cache hit");
            return Ok(Arc::clone(plan));
        }
        let mut plans = self.plans.write();
        if let Some(plan) = plans.get(problem) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(plan));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let plan = Arc::new(build()?);
        plans.insert(problem.clone(), Arc::clone(&plan));
        Ok(plan)
    }

    /// Drop every cached plan and zero the counters. Plans still referenced
    /// by in-flight calls stay alive until those references drop.
    pub fn clear(&self) {
        let mut plans = self.plans.write();
        let evicted = plans.len();
        plans.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        debug!(evicted, "plan cache cleared");
    }

    /// Current counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Number of cached plans
    pub fn len(&self) -> usize {
        self.plans.read().len()
    }

    /// Whether the cache holds no plans
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<P> Default for PlanCache<P> {
    fn default() -> Self {
        Self::new()
    }
}
