//! Call-stack depth and cycle guard for the call strategy.
//!
//! No direct precedent for cross-suite calls exists in the corpus;
//! grounded in the reference `validation::detect_cycle_dfs` shape generalized
//! from a static dependency graph to a dynamic runtime stack, plus an
//! `ExecutionLimits`-style bounded-counter pattern for the depth
//! guard.

use crate::errors::EngineError;
use tokio::sync::Mutex;

/// Tracks the chain of `node_id`s currently being called into, shared across
/// every concurrently executing call so depth/cycle checks see the true
/// nesting regardless of which suite initiated it.
pub struct CallGuard {
    stack: Mutex<Vec<String>>,
    max_depth: u32,
}

impl CallGuard {
    pub fn new(max_depth: u32) -> Self {
        Self {
            stack: Mutex::new(Vec::new()),
            max_depth,
        }
    }

    /// Pushes `node_id` onto the call stack, failing with
    /// `CallDepthExceeded` or `CallCycleError` instead of pushing.
    pub async fn push(&self, node_id: &str) -> Result<(), EngineError> {
        let mut stack = self.stack.lock().await;
        if stack.len() as u32 >= self.max_depth {
            return Err(EngineError::CallDepthExceeded { max: self.max_depth });
        }
        if stack.iter().any(|s| s == node_id) {
            let mut path = stack.clone();
            path.push(node_id.to_string());
            return Err(EngineError::CallCycleError(path.join(" -> ")));
        }
        stack.push(node_id.to_string());
        Ok(())
    }

    pub async fn pop(&self) {
        self.stack.lock().await.pop();
    }

    pub async fn depth(&self) -> usize {
        self.stack.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn depth_guard_rejects_past_max() {
        let guard = CallGuard::new(2);
        guard.push("a").await.unwrap();
        guard.push("b").await.unwrap();
        assert!(matches!(
            guard.push("c").await,
            Err(EngineError::CallDepthExceeded { max: 2 })
        ));
    }

    #[tokio::test]
    async fn cycle_is_rejected() {
        let guard = CallGuard::new(16);
        guard.push("a").await.unwrap();
        guard.push("b").await.unwrap();
        assert!(matches!(guard.push("a").await, Err(EngineError::CallCycleError(_))));
    }

    #[tokio::test]
    async fn pop_restores_depth() {
        let guard = CallGuard::new(16);
        guard.push("a").await.unwrap();
        guard.pop().await;
        assert_eq!(guard.depth().await, 0);
    }
}
