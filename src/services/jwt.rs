/*
 * Responsibility
 * - JWS algorithm names accepted for ID tokens
 * - Compact token kept as three separate segments until serialized
 * - Signers: a no-op for `none`, josekit for everything else
 *
 * The signature segment is its own field, so stripping it is a field reset
 * and never a string search on the serialized form.
 */
use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use josekit::jws::JwsSigner;
use serde_json::{Map, Value};
use tracing::error;

use crate::services::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    None,
    HS256,
    RS256,
    RS384,
    RS512,
    ES256,
    ES384,
    ES512,
}

impl SignatureAlgorithm {
    pub const ALL: [SignatureAlgorithm; 8] = [
        SignatureAlgorithm::None,
        SignatureAlgorithm::HS256,
        SignatureAlgorithm::RS256,
        SignatureAlgorithm::RS384,
        SignatureAlgorithm::RS512,
        SignatureAlgorithm::ES256,
        SignatureAlgorithm::ES384,
        SignatureAlgorithm::ES512,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SignatureAlgorithm::None => "none",
            SignatureAlgorithm::HS256 => "HS256",
            SignatureAlgorithm::RS256 => "RS256",
            SignatureAlgorithm::RS384 => "RS384",
            SignatureAlgorithm::RS512 => "RS512",
            SignatureAlgorithm::ES256 => "ES256",
            SignatureAlgorithm::ES384 => "ES384",
            SignatureAlgorithm::ES512 => "ES512",
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SignatureAlgorithm::ALL
            .into_iter()
            .find(|alg| alg.as_str() == s)
            .ok_or_else(|| EngineError::UnsupportedAlgorithm(s.to_string()))
    }
}

/// Produces the third segment of a compact token.
pub trait TokenSigner {
    fn algorithm(&self) -> SignatureAlgorithm;

    /// `kid` placed in the protected header, if any.
    fn key_id(&self) -> Option<&str>;

    fn sign(&self, message: &[u8]) -> EngineResult<Vec<u8>>;
}

/// Unsecured JWS: empty signature.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneSigner;

impl TokenSigner for NoneSigner {
    fn algorithm(&self) -> SignatureAlgorithm {
        SignatureAlgorithm::None
    }

    fn key_id(&self) -> Option<&str> {
        None
    }

    fn sign(&self, _message: &[u8]) -> EngineResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

pub struct JoseSigner {
    algorithm: SignatureAlgorithm,
    key_id: Option<String>,
    inner: Box<dyn JwsSigner>,
}

impl fmt::Debug for JoseSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoseSigner")
            .field("algorithm", &self.algorithm)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl JoseSigner {
    pub fn new(
        algorithm: SignatureAlgorithm,
        key_id: Option<String>,
        inner: Box<dyn JwsSigner>,
    ) -> Self {
        Self {
            algorithm,
            key_id,
            inner,
        }
    }
}

impl TokenSigner for JoseSigner {
    fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    fn sign(&self, message: &[u8]) -> EngineResult<Vec<u8>> {
        self.inner.sign(message).map_err(|e| {
            error!(alg = %self.algorithm, error = %e, "failed to sign token");
            EngineError::Signing(e.to_string())
        })
    }
}

/// `header.payload.signature`, each segment held decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactToken {
    header: Vec<u8>,
    payload: Vec<u8>,
    signature: Vec<u8>,
}

impl CompactToken {
    /// Sign `claims` with `signer`. The header is derived from the signer.
    pub fn sign(claims: &Map<String, Value>, signer: &dyn TokenSigner) -> EngineResult<Self> {
        let mut header = Map::new();
        header.insert("alg".into(), Value::from(signer.algorithm().as_str()));
        if let Some(kid) = signer.key_id() {
            header.insert("kid".into(), Value::from(kid));
        }
        header.insert("typ".into(), Value::from("JWT"));

        let header = serde_json::to_vec(&header)?;
        let payload = serde_json::to_vec(claims)?;
        let signing_input = signing_input(&header, &payload);
        let signature = signer.sign(signing_input.as_bytes())?;

        Ok(Self {
            header,
            payload,
            signature,
        })
    }

    /// Drop the signature; header and payload are left as signed.
    pub fn without_signature(mut self) -> Self {
        self.signature.clear();
        self
    }

    pub fn header(&self) -> &[u8] {
        &self.header
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Serialized form. An empty signature leaves a trailing `.`.
    pub fn to_compact(&self) -> String {
        format!(
            "{}.{}",
            signing_input(&self.header, &self.payload),
            URL_SAFE_NO_PAD.encode(&self.signature)
        )
    }
}

impl fmt::Display for CompactToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_compact())
    }
}

fn signing_input(header: &[u8], payload: &[u8]) -> String {
    format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header),
        URL_SAFE_NO_PAD.encode(payload)
    )
}
