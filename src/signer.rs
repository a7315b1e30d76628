//! JWT cryptographic primitives are treated as a black-box signer/verifier
//! (spec §1 Out of scope). This module defines the narrow `Signer` interface
//! from spec §6 (`sign(header,payload)->jws`, `verify(jws)->{header,payload}?`)
//! and ships one concrete adapter, `JwtSigner`, built on `jsonwebtoken` the
//! same way the teacher's `TokenService::generate_jwt_token` /
//! `decode_jwt_token` use it directly — generalized into a trait, and kept
//! object-safe (payloads are `serde_json::Value`) so a host can hold an
//! `Arc<dyn Signer>` and swap in a KMS-backed signer without touching any
//! pipeline.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Signing/verification algorithms a client or server may select (spec §3
/// "signing and encryption algorithms for id-token / userinfo").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SigningAlg {
    Hs256,
    Rs256,
    Es256,
    Rs512,
}

impl SigningAlg {
    pub fn jsonwebtoken_alg(self) -> Algorithm {
        match self {
            SigningAlg::Hs256 => Algorithm::HS256,
            SigningAlg::Rs256 => Algorithm::RS256,
            SigningAlg::Es256 => Algorithm::ES256,
            SigningAlg::Rs512 => Algorithm::RS512,
        }
    }

    /// The digest algorithm paired for `c_hash`/`at_hash` (spec §4.7).
    pub fn hash_alg(self) -> HashAlg {
        match self {
            SigningAlg::Hs256 | SigningAlg::Rs256 | SigningAlg::Es256 => HashAlg::Sha256,
            SigningAlg::Rs512 => HashAlg::Sha512,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlg {
    Sha256,
    Sha512,
}

/// A signed-and-encoded JWS compact serialization.
pub type Jws = String;

/// Decoded `{header, payload}` pair returned by a successful verification.
#[derive(Debug, Clone)]
pub struct VerifiedJws {
    pub header: jsonwebtoken::Header,
    pub payload: Value,
}

/// Narrow signer interface (spec §6). `sign` serializes and signs `payload`
/// under `alg`; `verify` checks the signature, returning `None` for a
/// malformed or mis-signed token rather than propagating a decode error —
/// callers treat an invalid JWT identically to an absent one.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, alg: SigningAlg, payload: &Value) -> anyhow::Result<Jws>;

    async fn verify(&self, alg: SigningAlg, token: &str) -> anyhow::Result<Option<VerifiedJws>>;
}

/// Concrete `jsonwebtoken`-backed signer. Holds one encoding/decoding key
/// pair; in production this is keyed off the active signing key, loaded by
/// the host (key provisioning is out of scope here, spec §1).
pub struct JwtSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtSigner {
    pub fn from_hmac_secret(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    pub fn from_rsa_pem(encoding_pem: &[u8], decoding_pem: &[u8]) -> anyhow::Result<Self> {
        Ok(Self {
            encoding_key: EncodingKey::from_rsa_pem(encoding_pem)?,
            decoding_key: DecodingKey::from_rsa_pem(decoding_pem)?,
        })
    }
}

#[async_trait]
impl Signer for JwtSigner {
    async fn sign(&self, alg: SigningAlg, payload: &Value) -> anyhow::Result<Jws> {
        let header = Header::new(alg.jsonwebtoken_alg());
        let jws = jsonwebtoken::encode(&header, payload, &self.encoding_key)?;
        Ok(jws)
    }

    async fn verify(&self, alg: SigningAlg, token: &str) -> anyhow::Result<Option<VerifiedJws>> {
        let mut validation = Validation::new(alg.jsonwebtoken_alg());
        // The core validates `exp`/`nbf` itself against the injected
        // `TimeSource` so every expiry check goes through one code path;
        // `jsonwebtoken`'s own clock-based checks are disabled here.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims.clear();
        match jsonwebtoken::decode::<Value>(token, &self.decoding_key, &validation) {
            Ok(data) => Ok(Some(VerifiedJws {
                header: data.header,
                payload: data.claims,
            })),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn round_trips_hmac() {
        let signer = JwtSigner::from_hmac_secret(b"secret");
        let jws = signer
            .sign(SigningAlg::Hs256, &json!({"sub": "u1"}))
            .await
            .unwrap();
        let verified = signer.verify(SigningAlg::Hs256, &jws).await.unwrap().unwrap();
        assert_eq!(verified.payload["sub"], "u1");
    }

    #[tokio::test]
    async fn tampered_token_fails_verification() {
        let signer = JwtSigner::from_hmac_secret(b"secret");
        let other = JwtSigner::from_hmac_secret(b"other-secret");
        let jws = signer
            .sign(SigningAlg::Hs256, &json!({"sub": "u1"}))
            .await
            .unwrap();
        assert!(other.verify(SigningAlg::Hs256, &jws).await.unwrap().is_none());
    }
}
