/*
 * Responsibility
 * - The declarative IdP configuration: one action per endpoint plus the ID token config
 * - Parameter / Claim definitions evaluated by the resolver
 * - The baked-in default configuration
 * - ConfigStore: the single live configuration, swapped wholesale
 *
 * Action tags are real enums. An unknown `action_type` or parameter `action`
 * fails deserialization, so a bad document is rejected at load time.
 */
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdpConfig {
    pub auth_action: AuthAction,
    pub token_action: TokenAction,
    pub userinfo_action: UserInfoAction,
    pub discovery_action: DiscoveryAction,
    pub id_token_config: IdTokenConfig,
}

/// Authorization endpoint behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "lowercase")]
pub enum AuthAction {
    Redirect { redirect: AuthRedirect },
    Error { error: ErrorResponse },
    Block,
}

impl AuthAction {
    pub fn name(&self) -> &'static str {
        match self {
            AuthAction::Redirect { .. } => "redirect",
            AuthAction::Error { .. } => "error",
            AuthAction::Block => "block",
        }
    }
}

/// Behaviour shared by the token, userinfo and discovery endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "lowercase")]
pub enum RespondAction {
    Respond { respond: Respond },
    Error { error: ErrorResponse },
    Block,
}

impl RespondAction {
    pub fn name(&self) -> &'static str {
        match self {
            RespondAction::Respond { .. } => "respond",
            RespondAction::Error { .. } => "error",
            RespondAction::Block => "block",
        }
    }
}

pub type TokenAction = RespondAction;
pub type UserInfoAction = RespondAction;
pub type DiscoveryAction = RespondAction;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Respond {
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthRedirect {
    #[serde(default)]
    pub redirect_target: RedirectTarget,
    /// Applied to request parameters that have no configured entry.
    #[serde(default)]
    pub default_parameter_action: ParamAction,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub use_hash_fragment: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedirectTarget {
    #[serde(default)]
    pub use_custom_redirect_uri: bool,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub custom_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error_code: u16,
    #[serde(default)]
    pub error_content: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamAction {
    #[default]
    Passthrough,
    Set,
    Omit,
    Random,
    Custom,
}

/// JSON shape a resolved parameter takes in a response body.
///
/// Unrecognised type names fall back to `String` rather than failing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum JsonType {
    #[default]
    String,
    Array,
    Number,
    Boolean,
    Object,
}

impl From<String> for JsonType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "array" => JsonType::Array,
            "number" => JsonType::Number,
            "boolean" => JsonType::Boolean,
            "object" => JsonType::Object,
            _ => JsonType::String,
        }
    }
}

/// An input or output parameter of an endpoint.
///
/// `values` only matters for `set`, `custom_key` only for `custom`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub id: String,
    #[serde(default)]
    pub action: ParamAction,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub custom_key: String,
    #[serde(default)]
    pub json_type: JsonType,
}

impl Parameter {
    pub fn new(id: impl Into<String>, action: ParamAction) -> Self {
        Self {
            id: id.into(),
            action,
            values: Vec::new(),
            custom_key: String::new(),
            json_type: JsonType::String,
        }
    }

    pub fn set<I, S>(id: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            ..Self::new(id, ParamAction::Set)
        }
    }

    pub fn custom(id: impl Into<String>, custom_key: impl Into<String>) -> Self {
        Self {
            custom_key: custom_key.into(),
            ..Self::new(id, ParamAction::Custom)
        }
    }

    pub fn with_json_type(mut self, json_type: JsonType) -> Self {
        self.json_type = json_type;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdTokenConfig {
    /// JWS algorithm name. Kept as text so that an unsupported name surfaces
    /// as a signing error at the token endpoint instead of a rejected config.
    #[serde(rename = "alg")]
    pub algorithm: String,
    #[serde(default)]
    pub remove_signature: bool,
    #[serde(default)]
    pub use_wrong_key: bool,
    #[serde(default)]
    pub claims: Vec<Claim>,
}

/// An ID token claim. Always evaluated with `set` semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub id: String,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub json_type: JsonType,
}

impl Claim {
    pub fn new<I, S>(id: impl Into<String>, values: I, json_type: JsonType) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            values: values.into_iter().map(Into::into).collect(),
            json_type,
        }
    }

    pub fn to_parameter(&self) -> Parameter {
        Parameter {
            id: self.id.clone(),
            action: ParamAction::Set,
            values: self.values.clone(),
            custom_key: String::new(),
            json_type: self.json_type,
        }
    }
}

impl IdpConfig {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Authorization code flow with a static subject in the ID token.
impl Default for IdpConfig {
    fn default() -> Self {
        let respond = |parameters: Vec<Parameter>| RespondAction::Respond {
            respond: Respond { parameters },
        };

        Self {
            auth_action: AuthAction::Redirect {
                redirect: AuthRedirect {
                    redirect_target: RedirectTarget::default(),
                    default_parameter_action: ParamAction::Passthrough,
                    parameters: vec![
                        Parameter::new("code", ParamAction::Random),
                        Parameter::new("redirect_uri", ParamAction::Omit),
                    ],
                    use_hash_fragment: false,
                },
            },
            token_action: respond(vec![
                Parameter::custom("id_token", crate::services::id_token::SIGNED_TOKEN_KEY),
                Parameter::new("access_token", ParamAction::Random),
                Parameter::new("refresh_token", ParamAction::Random),
                Parameter::set("expires_in", ["3600"]).with_json_type(JsonType::Number),
                Parameter::set("token_type", ["Bearer"]),
            ]),
            userinfo_action: respond(vec![
                Parameter::set("sub", ["12345abcde"]),
                Parameter::set("email", ["testsub@{{domain}}"]),
            ]),
            discovery_action: respond(vec![
                Parameter::set("issuer", ["https://{{domain}}"]),
                Parameter::set("authorization_endpoint", ["https://{{domain}}/oauth2/auth"]),
                Parameter::set("token_endpoint", ["https://{{domain}}/oauth2/token"]),
                Parameter::set("userinfo_endpoint", ["https://{{domain}}/oauth2/userinfo"]),
                Parameter::set("jwks_uri", ["https://{{domain}}/.well-known/jwks.json"]),
                Parameter::set("subject_types_supported", ["public"])
                    .with_json_type(JsonType::Array),
                Parameter::set(
                    "id_token_signing_alg_values_supported",
                    ["RS256", "RS512", "ES256"],
                )
                .with_json_type(JsonType::Array),
                Parameter::set(
                    "response_types_supported",
                    [
                        "code",
                        "code id_token",
                        "id_token",
                        "token id_token",
                        "token",
                        "token id_token code",
                    ],
                )
                .with_json_type(JsonType::Array),
            ]),
            id_token_config: IdTokenConfig {
                algorithm: "RS256".to_string(),
                remove_signature: false,
                use_wrong_key: false,
                claims: vec![
                    Claim::new("iss", ["https://{{domain}}"], JsonType::String),
                    Claim::new(
                        "aud",
                        ["{{#if session}}{{session.client_id}}{{/if}}"],
                        JsonType::String,
                    ),
                    Claim::new(
                        "nonce",
                        ["{{#if session}}{{session.nonce}}{{/if}}"],
                        JsonType::String,
                    ),
                    Claim::new("iat", ["{{time.unix}}"], JsonType::Number),
                    Claim::new("exp", ["{{add_days time.unix 1}}"], JsonType::Number),
                    Claim::new("sub", ["12345abcde"], JsonType::String),
                ],
            },
        }
    }
}

/// Holder of the live configuration.
///
/// Readers take an `Arc` snapshot; a replace swaps the pointer, so an
/// in-flight request keeps seeing the configuration it started with.
#[derive(Debug)]
pub struct ConfigStore {
    current: ArcSwap<IdpConfig>,
}

impl ConfigStore {
    pub fn new(initial: IdpConfig) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    pub fn snapshot(&self) -> Arc<IdpConfig> {
        self.current.load_full()
    }

    pub fn replace(&self, next: IdpConfig) {
        self.current.store(Arc::new(next));
    }

    pub fn reset(&self) {
        self.replace(IdpConfig::default());
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(IdpConfig::default())
    }
}
