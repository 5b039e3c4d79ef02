//! User-supplied edge functions.
//!
//! A `nodeFunction` route action names a function by path; the registry maps
//! those paths to [`EdgeFunction`] implementations registered at startup.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use edgestack_model::{EdgeError, EdgeResult};

use crate::request::EdgeRequest;
use crate::response::EdgeResponse;

/// A user transform invoked against the live request/response pair.
#[async_trait]
pub trait EdgeFunction: Send + Sync {
    /// Run the transform.
    async fn invoke(&self, request: &mut EdgeRequest, response: &mut EdgeResponse)
    -> EdgeResult<()>;
}

/// Startup-time registry of edge functions keyed by path.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn EdgeFunction>>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("paths", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FunctionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under a path, replacing any previous entry.
    pub fn register(&mut self, path: impl Into<String>, function: Arc<dyn EdgeFunction>) {
        self.functions.insert(path.into(), function);
    }

    /// Look up a function.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::FunctionNotFound`] for an unregistered path.
    pub fn get(&self, path: &str) -> EdgeResult<Arc<dyn EdgeFunction>> {
        self.functions
            .get(path)
            .cloned()
            .ok_or_else(|| EdgeError::FunctionNotFound(path.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StampHeader;

    #[async_trait]
    impl EdgeFunction for StampHeader {
        async fn invoke(
            &self,
            _request: &mut EdgeRequest,
            response: &mut EdgeResponse,
        ) -> EdgeResult<()> {
            response.headers.set("x-transformed", "yes");
            Ok(())
        }
    }

    #[test]
    fn test_should_resolve_registered_function() {
        let mut registry = FunctionRegistry::new();
        registry.register("/fns/stamp.js", Arc::new(StampHeader));
        assert!(registry.get("/fns/stamp.js").is_ok());
    }

    #[test]
    fn test_should_error_on_unknown_function_path() {
        let registry = FunctionRegistry::new();
        assert!(matches!(
            registry.get("/fns/missing.js"),
            Err(EdgeError::FunctionNotFound(_))
        ));
    }
}
