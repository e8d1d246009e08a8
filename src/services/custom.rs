/*
 * Responsibility
 * - Registry of named evaluators behind the `custom` parameter action
 * - Built once at startup and shared by reference; no global state
 *
 * Registration overwrites (last write wins). The lock is only held to clone
 * the evaluator handle, never while an evaluator runs.
 */
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::services::error::{EngineError, EngineResult};
use crate::services::idp_config::IdpConfig;
use crate::services::request_input::RequestInput;
use crate::services::resolver::Resolver;

/// A named value producer for `custom` parameters.
///
/// Receives the resolver so evaluators can resolve their own parameters
/// (the ID token builder resolves its claims this way), the request input and
/// a snapshot of the live configuration.
pub trait CustomEvaluator: Send + Sync {
    fn evaluate(
        &self,
        resolver: &Resolver,
        input: &RequestInput,
        config: &IdpConfig,
    ) -> EngineResult<Vec<String>>;
}

struct FnEvaluator<F>(F);

impl<F> CustomEvaluator for FnEvaluator<F>
where
    F: Fn(&Resolver, &RequestInput, &IdpConfig) -> EngineResult<Vec<String>> + Send + Sync,
{
    fn evaluate(
        &self,
        resolver: &Resolver,
        input: &RequestInput,
        config: &IdpConfig,
    ) -> EngineResult<Vec<String>> {
        (self.0)(resolver, input, config)
    }
}

#[derive(Default)]
pub struct CustomRegistry {
    evaluators: RwLock<HashMap<String, Arc<dyn CustomEvaluator>>>,
}

impl std::fmt::Debug for CustomRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<String> = self.evaluators.read().keys().cloned().collect();
        keys.sort();
        f.debug_struct("CustomRegistry").field("keys", &keys).finish()
    }
}

impl CustomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<E>(&self, key: impl Into<String>, evaluator: E)
    where
        E: CustomEvaluator + 'static,
    {
        let key = key.into();
        debug!(key = %key, "registering custom evaluator");
        self.evaluators.write().insert(key, Arc::new(evaluator));
    }

    pub fn register_fn<F>(&self, key: impl Into<String>, f: F)
    where
        F: Fn(&Resolver, &RequestInput, &IdpConfig) -> EngineResult<Vec<String>>
            + Send
            + Sync
            + 'static,
    {
        self.register(key, FnEvaluator(f));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.evaluators.read().contains_key(key)
    }

    pub fn invoke(
        &self,
        key: &str,
        resolver: &Resolver,
        input: &RequestInput,
        config: &IdpConfig,
    ) -> EngineResult<Vec<String>> {
        let evaluator = self
            .evaluators
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| EngineError::UnknownCustomKey(key.to_string()))?;

        evaluator.evaluate(resolver, input, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    fn resolver(registry: Arc<CustomRegistry>) -> Resolver {
        Resolver::new(registry)
    }

    #[test]
    fn invoke_unknown_key_fails() {
        let registry = Arc::new(CustomRegistry::new());
        let resolver = resolver(registry.clone());
        let err = registry
            .invoke(
                "nope",
                &resolver,
                &RequestInput::new("idp.test"),
                &IdpConfig::default(),
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownCustomKey(key) if key == "nope"));
    }

    #[test]
    fn last_registration_wins() {
        let registry = Arc::new(CustomRegistry::new());
        registry.register_fn("k", |_, _, _| Ok(vec!["first".to_string()]));
        registry.register_fn("k", |_, _, _| Ok(vec!["second".to_string()]));

        let resolver = resolver(registry.clone());
        let out = registry
            .invoke(
                "k",
                &resolver,
                &RequestInput::new("idp.test"),
                &IdpConfig::default(),
            )
            .unwrap();
        assert_eq!(out, vec!["second"]);
    }

    #[test]
    fn evaluators_see_input_and_config() {
        let registry = Arc::new(CustomRegistry::new());
        registry.register_fn("echo", |_, input, config| {
            Ok(vec![
                input.domain.clone(),
                config.id_token_config.algorithm.clone(),
            ])
        });

        let resolver = resolver(registry.clone());
        let out = registry
            .invoke(
                "echo",
                &resolver,
                &RequestInput::new("idp.test"),
                &IdpConfig::default(),
            )
            .unwrap();
        assert_eq!(out, vec!["idp.test", "RS256"]);
    }

    #[test]
    fn concurrent_registration_and_invocation() {
        let registry = Arc::new(CustomRegistry::new());
        registry.register_fn("k", |_, _, _| Ok(vec!["v".to_string()]));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    registry.register_fn(format!("k{i}"), |_, _, _| Ok(Vec::new()));
                    let resolver = resolver(registry.clone());
                    registry
                        .invoke(
                            "k",
                            &resolver,
                            &RequestInput::new("idp.test"),
                            &IdpConfig::default(),
                        )
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), vec!["v"]);
        }
        assert!(registry.contains("k7"));
    }
}
