//! Parameter evaluation.
//!
//! A [`Parameter`] resolves to an ordered list of strings; [`Resolver::resolve_json`]
//! then coerces that list into the parameter's declared JSON type. Endpoint
//! bodies and redirect query strings are assembled from those values.
//!
//! Every call takes the configuration snapshot the request started with, so
//! custom evaluators never observe a configuration replaced mid-request.
use std::collections::HashSet;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use serde_json::{Map, Value};
use tracing::debug;

use crate::services::custom::CustomRegistry;
use crate::services::error::{EngineError, EngineResult};
use crate::services::idp_config::{AuthRedirect, IdpConfig, JsonType, ParamAction, Parameter};
use crate::services::request_input::{ParamMap, RequestInput};
use crate::services::template::TemplateEngine;

/// Bytes of entropy behind a `random` value.
pub const RANDOM_BYTES: usize = 32;

/// Fills a buffer with random bytes. Swappable so tests can be deterministic.
pub type RandomSource = Arc<dyn Fn(&mut [u8]) -> EngineResult<()> + Send + Sync>;

/// The operating system CSPRNG.
pub fn os_random() -> RandomSource {
    Arc::new(|buf: &mut [u8]| getrandom::fill(buf).map_err(|e| EngineError::Random(e.to_string())))
}

pub struct Resolver {
    templates: TemplateEngine,
    registry: Arc<CustomRegistry>,
    random: RandomSource,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Resolver {
    pub fn new(registry: Arc<CustomRegistry>) -> Self {
        Self {
            templates: TemplateEngine::new(),
            registry,
            random: os_random(),
        }
    }

    pub fn with_random_source(mut self, random: RandomSource) -> Self {
        self.random = random;
        self
    }

    pub fn registry(&self) -> &CustomRegistry {
        &self.registry
    }

    /// Evaluate `param` against the request.
    pub fn resolve(
        &self,
        param: &Parameter,
        input: &RequestInput,
        config: &IdpConfig,
    ) -> EngineResult<Vec<String>> {
        match param.action {
            ParamAction::Passthrough => Ok(input.input_values(&param.id)),
            ParamAction::Set => self.render_all(&param.values, input),
            ParamAction::Omit => Ok(Vec::new()),
            ParamAction::Random => self.random_value().map(|v| vec![v]),
            ParamAction::Custom => self.invoke_custom(&param.custom_key, input, config),
        }
    }

    /// Evaluate `param` and coerce it to its JSON type. `None` means the key
    /// is left out of the response entirely.
    pub fn resolve_json(
        &self,
        param: &Parameter,
        input: &RequestInput,
        config: &IdpConfig,
    ) -> EngineResult<Option<Value>> {
        let values = self.resolve(param, input, config)?;
        coerce_json(values, param.json_type)
    }

    /// Build a JSON object from a parameter list. The first failing
    /// parameter aborts the whole object.
    pub fn resolve_json_object(
        &self,
        params: &[Parameter],
        input: &RequestInput,
        config: &IdpConfig,
    ) -> EngineResult<Map<String, Value>> {
        let mut body = Map::new();
        for param in params {
            if let Some(value) = self.resolve_json(param, input, config)? {
                body.insert(param.id.clone(), value);
            }
        }
        Ok(body)
    }

    /// Parameters for the authorization redirect.
    ///
    /// Every query parameter of the request goes through its configured
    /// entry, or the default action when it has none. Configured parameters
    /// the request did not carry are then added. Empty results are dropped
    /// and each configured parameter is evaluated once.
    pub fn resolve_redirect_params(
        &self,
        redirect: &AuthRedirect,
        input: &RequestInput,
        config: &IdpConfig,
    ) -> EngineResult<ParamMap> {
        let mut out = ParamMap::new();
        let mut evaluated: HashSet<&str> = HashSet::new();

        for id in input.url_params.keys() {
            let values = match redirect.parameters.iter().find(|p| &p.id == id) {
                Some(param) => {
                    evaluated.insert(param.id.as_str());
                    self.resolve(param, input, config)?
                }
                None => default_value(id, redirect.default_parameter_action, input),
            };
            if !values.is_empty() {
                out.insert(id.clone(), values);
            }
        }

        for param in &redirect.parameters {
            if !evaluated.insert(param.id.as_str()) {
                continue;
            }
            let values = self.resolve(param, input, config)?;
            if !values.is_empty() {
                out.insert(param.id.clone(), values);
            }
        }

        Ok(out)
    }

    /// Call a registered evaluator with the request's configuration snapshot.
    pub fn invoke_custom(
        &self,
        key: &str,
        input: &RequestInput,
        config: &IdpConfig,
    ) -> EngineResult<Vec<String>> {
        debug!(key = %key, "invoking custom evaluator");
        self.registry.invoke(key, self, input, config)
    }

    fn render_all(&self, templates: &[String], input: &RequestInput) -> EngineResult<Vec<String>> {
        let mut out = Vec::with_capacity(templates.len());
        for template in templates {
            let rendered = self.templates.render(template, input)?;
            if !rendered.is_empty() {
                out.push(rendered);
            }
        }
        Ok(out)
    }

    fn random_value(&self) -> EngineResult<String> {
        let mut bytes = [0u8; RANDOM_BYTES];
        (self.random)(&mut bytes)?;
        Ok(URL_SAFE.encode(bytes))
    }
}

/// Value for a request parameter that has no configured entry.
///
/// Only `passthrough` produces anything; every other action yields nothing.
pub fn default_value(id: &str, action: ParamAction, input: &RequestInput) -> Vec<String> {
    match action {
        ParamAction::Passthrough => input.input_values(id),
        _ => Vec::new(),
    }
}

/// Coerce resolved values to `json_type`. An empty list is `None`.
pub fn coerce_json(values: Vec<String>, json_type: JsonType) -> EngineResult<Option<Value>> {
    let Some(first) = values.first() else {
        return Ok(None);
    };

    let value = match json_type {
        JsonType::String => Value::String(first.clone()),
        JsonType::Array => Value::Array(values.into_iter().map(Value::String).collect()),
        JsonType::Number => {
            let n: i64 = first.parse().map_err(|e: std::num::ParseIntError| {
                coercion_error(first, "a number", e.to_string())
            })?;
            Value::from(n)
        }
        JsonType::Boolean => {
            let b = parse_bool(first)
                .ok_or_else(|| coercion_error(first, "a boolean", "invalid syntax".into()))?;
            Value::Bool(b)
        }
        JsonType::Object => {
            let obj: Map<String, Value> = serde_json::from_str(first)
                .map_err(|e| coercion_error(first, "a JSON object", e.to_string()))?;
            Value::Object(obj)
        }
    };
    Ok(Some(value))
}

fn coercion_error(value: &str, expected: &'static str, reason: String) -> EngineError {
    EngineError::TypeCoercion {
        value: value.to_string(),
        expected,
        reason,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
