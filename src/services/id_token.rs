//! ID token builder, exposed to configurations as the `signed_token_id`
//! custom evaluator.
//!
//! Claims are `set` parameters resolved against the current request; an empty
//! claim is left out. The token is then signed according to the configured
//! algorithm, key set and signature stripping.
use std::sync::Arc;

use tracing::debug;

use crate::services::custom::CustomEvaluator;
use crate::services::error::EngineResult;
use crate::services::idp_config::{Claim, IdpConfig, Parameter};
use crate::services::jwt::{CompactToken, SignatureAlgorithm};
use crate::services::keys::KeyManager;
use crate::services::request_input::RequestInput;
use crate::services::resolver::Resolver;

/// Registry key under which [`IdTokenBuilder`] is installed.
pub const SIGNED_TOKEN_KEY: &str = "signed_token_id";

#[derive(Debug, Clone)]
pub struct IdTokenBuilder {
    keys: Arc<KeyManager>,
}

impl IdTokenBuilder {
    pub fn new(keys: Arc<KeyManager>) -> Self {
        Self { keys }
    }

    /// Build the token described by `config.id_token_config`. Claims are
    /// resolved against the same `config`.
    pub fn build_id_token(
        &self,
        resolver: &Resolver,
        input: &RequestInput,
        config: &IdpConfig,
    ) -> EngineResult<CompactToken> {
        let token_config = &config.id_token_config;
        let alg: SignatureAlgorithm = token_config.algorithm.parse()?;

        let params: Vec<Parameter> = token_config
            .claims
            .iter()
            .map(Claim::to_parameter)
            .collect();
        let claims = resolver.resolve_json_object(&params, input, config)?;

        let signer = self.keys.signer(alg, token_config.use_wrong_key)?;
        let token = CompactToken::sign(&claims, signer.as_ref())?;

        debug!(
            alg = %alg,
            claims = claims.len(),
            wrong_key = token_config.use_wrong_key,
            stripped = token_config.remove_signature,
            "id token built"
        );

        if token_config.remove_signature {
            Ok(token.without_signature())
        } else {
            Ok(token)
        }
    }
}

impl CustomEvaluator for IdTokenBuilder {
    fn evaluate(
        &self,
        resolver: &Resolver,
        input: &RequestInput,
        config: &IdpConfig,
    ) -> EngineResult<Vec<String>> {
        let token = self.build_id_token(resolver, input, config)?;
        Ok(vec![token.to_compact()])
    }
}
