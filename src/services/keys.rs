/*
 * Responsibility
 * - Generate the IdP signing keys once, before the listener is bound
 * - Publish the public halves of the correct set as a JWK set
 * - Hand out signers for the configured algorithm, from the correct or wrong set
 *
 * Two disjoint sets with the same key ids: a client that picks the key by
 * `kid` finds the correct public key and fails to verify a wrong-key token.
 * Keys are never rotated; the manager is shared read-only behind an Arc.
 */
use std::collections::HashMap;
use std::time::Instant;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use josekit::jwk::Jwk;
use josekit::jwk::alg::ec::{EcCurve, EcKeyPair};
use josekit::jwk::alg::rsa::RsaKeyPair;
use josekit::jws::{ES256, ES384, ES512, HS256, RS256, RS384, RS512};
use serde_json::{Map, Value, json};
use tracing::info;

use crate::services::error::{EngineError, EngineResult};
use crate::services::jwt::{JoseSigner, NoneSigner, SignatureAlgorithm, TokenSigner};

pub const RSA_KEY_BITS: u32 = 2048;

const PEM_LINE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFamily {
    Rsa,
    P256,
    P384,
    P521,
}

impl KeyFamily {
    pub const ALL: [KeyFamily; 4] = [
        KeyFamily::Rsa,
        KeyFamily::P256,
        KeyFamily::P384,
        KeyFamily::P521,
    ];

    pub fn key_id(self) -> &'static str {
        match self {
            KeyFamily::Rsa => "customidprsa",
            KeyFamily::P256 => "customidpecdsaP-256",
            KeyFamily::P384 => "customidpecdsaP-384",
            KeyFamily::P521 => "customidpecdsaP-521",
        }
    }

    /// RSA backs `none`, `HS256` and `RS*`; each `ES*` has its own curve.
    pub fn for_algorithm(alg: SignatureAlgorithm) -> Self {
        match alg {
            SignatureAlgorithm::None
            | SignatureAlgorithm::HS256
            | SignatureAlgorithm::RS256
            | SignatureAlgorithm::RS384
            | SignatureAlgorithm::RS512 => KeyFamily::Rsa,
            SignatureAlgorithm::ES256 => KeyFamily::P256,
            SignatureAlgorithm::ES384 => KeyFamily::P384,
            SignatureAlgorithm::ES512 => KeyFamily::P521,
        }
    }

    fn generate(self) -> EngineResult<SigningKey> {
        let keygen_err = |e: josekit::JoseError| {
            EngineError::KeyGeneration(format!("{}: {e}", self.key_id()))
        };

        let (private_der, mut public_jwk, public_der) = match self {
            KeyFamily::Rsa => {
                let pair = RsaKeyPair::generate(RSA_KEY_BITS).map_err(keygen_err)?;
                (
                    pair.to_der_private_key(),
                    pair.to_jwk_public_key(),
                    Some(pair.to_der_public_key()),
                )
            }
            KeyFamily::P256 | KeyFamily::P384 | KeyFamily::P521 => {
                let curve = match self {
                    KeyFamily::P384 => EcCurve::P384,
                    KeyFamily::P521 => EcCurve::P521,
                    _ => EcCurve::P256,
                };
                let pair = EcKeyPair::generate(curve).map_err(keygen_err)?;
                (pair.to_der_private_key(), pair.to_jwk_public_key(), None)
            }
        };

        public_jwk.set_key_id(self.key_id());
        public_jwk.set_key_use("sig");

        Ok(SigningKey {
            family: self,
            private_der,
            public_jwk,
            public_pem: public_der.map(|der| rsa_public_pem(&der)),
        })
    }
}

pub struct SigningKey {
    family: KeyFamily,
    private_der: Vec<u8>,
    public_jwk: Jwk,
    public_pem: Option<Vec<u8>>,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("family", &self.family)
            .field("kid", &self.key_id())
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    pub fn family(&self) -> KeyFamily {
        self.family
    }

    pub fn key_id(&self) -> &'static str {
        self.family.key_id()
    }

    pub fn public_jwk(&self) -> &Jwk {
        &self.public_jwk
    }

    pub fn public_jwk_json(&self) -> Value {
        let map: &Map<String, Value> = self.public_jwk.as_ref();
        Value::Object(map.clone())
    }

    /// PEM of the RSA public key. `None` for EC keys.
    pub fn public_pem(&self) -> Option<&[u8]> {
        self.public_pem.as_deref()
    }

    fn signer(&self, alg: SignatureAlgorithm) -> EngineResult<Box<dyn TokenSigner>> {
        let kid = Some(self.key_id().to_string());
        let der = &self.private_der;
        let inner: Box<dyn josekit::jws::JwsSigner> = match alg {
            SignatureAlgorithm::None => return Ok(Box::new(NoneSigner)),
            SignatureAlgorithm::HS256 => {
                let secret = self
                    .public_pem()
                    .ok_or_else(|| EngineError::KeyNotFound(KeyFamily::Rsa.key_id().into()))?;
                let signer = HS256.signer_from_bytes(secret).map_err(signing_err)?;
                return Ok(Box::new(JoseSigner::new(alg, None, Box::new(signer))));
            }
            SignatureAlgorithm::RS256 => Box::new(RS256.signer_from_der(der).map_err(signing_err)?),
            SignatureAlgorithm::RS384 => Box::new(RS384.signer_from_der(der).map_err(signing_err)?),
            SignatureAlgorithm::RS512 => Box::new(RS512.signer_from_der(der).map_err(signing_err)?),
            SignatureAlgorithm::ES256 => Box::new(ES256.signer_from_der(der).map_err(signing_err)?),
            SignatureAlgorithm::ES384 => Box::new(ES384.signer_from_der(der).map_err(signing_err)?),
            SignatureAlgorithm::ES512 => Box::new(ES512.signer_from_der(der).map_err(signing_err)?),
        };
        Ok(Box::new(JoseSigner::new(alg, kid, inner)))
    }
}

fn signing_err(e: josekit::JoseError) -> EngineError {
    EngineError::Signing(e.to_string())
}

/// SubjectPublicKeyInfo DER wrapped as an `RSA PUBLIC KEY` PEM block.
fn rsa_public_pem(der: &[u8]) -> Vec<u8> {
    let body = STANDARD.encode(der);
    let mut pem = String::from("-----BEGIN RSA PUBLIC KEY-----\n");
    for line in body.as_bytes().chunks(PEM_LINE) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str("-----END RSA PUBLIC KEY-----\n");
    pem.into_bytes()
}

#[derive(Debug)]
pub struct KeyManager {
    correct: HashMap<KeyFamily, SigningKey>,
    wrong: HashMap<KeyFamily, SigningKey>,
}

impl KeyManager {
    /// Generate both key sets. CPU heavy; run it off the async runtime.
    pub fn generate() -> EngineResult<Self> {
        let started = Instant::now();
        let mut correct = HashMap::new();
        let mut wrong = HashMap::new();

        for family in KeyFamily::ALL {
            correct.insert(family, family.generate()?);
            wrong.insert(family, family.generate()?);
        }

        info!(
            keys = correct.len() + wrong.len(),
            elapsed = ?started.elapsed(),
            "signing keys generated"
        );
        Ok(Self { correct, wrong })
    }

    pub fn lookup(&self, family: KeyFamily, use_wrong: bool) -> EngineResult<&SigningKey> {
        let set = if use_wrong { &self.wrong } else { &self.correct };
        set.get(&family)
            .ok_or_else(|| EngineError::KeyNotFound(family.key_id().to_string()))
    }

    /// Signer for `alg`, backed by the correct or the wrong key set.
    pub fn signer(
        &self,
        alg: SignatureAlgorithm,
        use_wrong: bool,
    ) -> EngineResult<Box<dyn TokenSigner>> {
        self.lookup(KeyFamily::for_algorithm(alg), use_wrong)?
            .signer(alg)
    }

    /// `{"keys": [...]}` with the public halves of the correct set only.
    pub fn public_key_set(&self) -> Value {
        let keys: Vec<Value> = KeyFamily::ALL
            .iter()
            .filter_map(|family| self.correct.get(family))
            .map(SigningKey::public_jwk_json)
            .collect();
        json!({ "keys": keys })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, OnceLock};

    use super::KeyManager;

    /// Key generation is slow; every test in the crate shares one manager.
    pub(crate) fn shared_keys() -> &'static Arc<KeyManager> {
        static KEYS: OnceLock<Arc<KeyManager>> = OnceLock::new();
        KEYS.get_or_init(|| Arc::new(KeyManager::generate().unwrap()))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::shared_keys;
    use super::*;
    use josekit::jws::JwsVerifier;

    #[test]
    fn public_set_lists_one_public_key_per_family() {
        let set = shared_keys().public_key_set();
        let keys = set["keys"].as_array().unwrap();
        assert_eq!(keys.len(), KeyFamily::ALL.len());

        let kids: Vec<&str> = keys.iter().map(|k| k["kid"].as_str().unwrap()).collect();
        assert_eq!(
            kids,
            vec![
                "customidprsa",
                "customidpecdsaP-256",
                "customidpecdsaP-384",
                "customidpecdsaP-521"
            ]
        );
        for key in keys {
            assert_eq!(key["use"], "sig");
            assert!(key.get("d").is_none(), "private material leaked: {key}");
        }
        assert_eq!(keys[0]["kty"], "RSA");
        assert_eq!(keys[1]["crv"], "P-256");
        assert_eq!(keys[3]["crv"], "P-521");
    }

    #[test]
    fn wrong_set_shares_kids_but_not_material() {
        let keys = shared_keys();
        for family in KeyFamily::ALL {
            let correct = keys.lookup(family, false).unwrap();
            let wrong = keys.lookup(family, true).unwrap();
            assert_eq!(correct.key_id(), wrong.key_id());
            assert_ne!(correct.public_jwk_json(), wrong.public_jwk_json());
        }
    }

    #[test]
    fn rsa_pem_is_wrapped_spki() {
        let pem = shared_keys()
            .lookup(KeyFamily::Rsa, false)
            .unwrap()
            .public_pem()
            .unwrap();
        let text = std::str::from_utf8(pem).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "-----BEGIN RSA PUBLIC KEY-----");
        assert_eq!(*lines.last().unwrap(), "-----END RSA PUBLIC KEY-----");
        assert!(text.ends_with('\n'));
        assert!(lines[1..lines.len() - 1].iter().all(|l| l.len() <= PEM_LINE));
        assert!(
            shared_keys()
                .lookup(KeyFamily::P256, false)
                .unwrap()
                .public_pem()
                .is_none()
        );
    }

    #[test]
    fn algorithms_map_to_key_families() {
        assert_eq!(KeyFamily::for_algorithm(SignatureAlgorithm::None), KeyFamily::Rsa);
        assert_eq!(KeyFamily::for_algorithm(SignatureAlgorithm::HS256), KeyFamily::Rsa);
        assert_eq!(KeyFamily::for_algorithm(SignatureAlgorithm::RS512), KeyFamily::Rsa);
        assert_eq!(KeyFamily::for_algorithm(SignatureAlgorithm::ES384), KeyFamily::P384);
        assert_eq!(KeyFamily::for_algorithm(SignatureAlgorithm::ES512), KeyFamily::P521);
    }

    #[test]
    fn ecdsa_signers_verify_against_published_keys() {
        let keys = shared_keys();
        for (alg, family) in [
            (SignatureAlgorithm::ES256, KeyFamily::P256),
            (SignatureAlgorithm::ES384, KeyFamily::P384),
            (SignatureAlgorithm::ES512, KeyFamily::P521),
        ] {
            let signer = keys.signer(alg, false).unwrap();
            assert_eq!(signer.key_id(), Some(family.key_id()));
            let signature = signer.sign(b"message").unwrap();

            let jwk = keys.lookup(family, false).unwrap().public_jwk();
            let verifier: Box<dyn JwsVerifier> = match alg {
                SignatureAlgorithm::ES256 => Box::new(ES256.verifier_from_jwk(jwk).unwrap()),
                SignatureAlgorithm::ES384 => Box::new(ES384.verifier_from_jwk(jwk).unwrap()),
                _ => Box::new(ES512.verifier_from_jwk(jwk).unwrap()),
            };
            verifier.verify(b"message", &signature).unwrap();
        }
    }

    #[test]
    fn rsa_signers_verify_against_published_key() {
        let keys = shared_keys();
        let jwk = keys.lookup(KeyFamily::Rsa, false).unwrap().public_jwk();
        for alg in [
            SignatureAlgorithm::RS256,
            SignatureAlgorithm::RS384,
            SignatureAlgorithm::RS512,
        ] {
            let signature = keys.signer(alg, false).unwrap().sign(b"message").unwrap();
            let verifier: Box<dyn JwsVerifier> = match alg {
                SignatureAlgorithm::RS256 => Box::new(RS256.verifier_from_jwk(jwk).unwrap()),
                SignatureAlgorithm::RS384 => Box::new(RS384.verifier_from_jwk(jwk).unwrap()),
                _ => Box::new(RS512.verifier_from_jwk(jwk).unwrap()),
            };
            verifier.verify(b"message", &signature).unwrap();
        }
    }

    #[test]
    fn hs256_uses_public_pem_as_secret() {
        let keys = shared_keys();
        let signer = keys.signer(SignatureAlgorithm::HS256, false).unwrap();
        assert_eq!(signer.key_id(), None);
        let signature = signer.sign(b"message").unwrap();

        let pem = keys.lookup(KeyFamily::Rsa, false).unwrap().public_pem().unwrap();
        HS256
            .verifier_from_bytes(pem)
            .unwrap()
            .verify(b"message", &signature)
            .unwrap();
    }

    #[test]
    fn none_signer_needs_no_key() {
        let signer = shared_keys().signer(SignatureAlgorithm::None, true).unwrap();
        assert_eq!(signer.algorithm(), SignatureAlgorithm::None);
        assert!(signer.sign(b"message").unwrap().is_empty());
    }
}
