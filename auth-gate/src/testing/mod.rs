//! Fixed RSA keys and token minting for tests.
//!
//! The keys below are throwaway test material and must never be trusted by a
//! deployed identity provider configuration.

use crate::error::KeySourceError;
use crate::key_source::{JwksDocument, JwksFetcher};
use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const ISSUER: &str = "https://casting-agency.test/";
pub const AUDIENCE: &str = "casting";

/// An RSA key pair with its public JWK components
pub struct TestKey {
    pub kid: &'static str,
    pub n: &'static str,
    pub e: &'static str,
    pem: &'static str,
}

pub const PRIMARY: TestKey = TestKey {
    kid: "primary-key",
    n: "pHwNraeu6KNjYm2m7z2sxycZ_o8UediA833IiWE2gyyCz-fs12Ycl1uYsgcF-hCcHdb7jXc3mf6793mvxLuYHqPPvrpaAPwHOh5NXU-v2L68u8filKo2QIhgkuSeZ4uchhiILtLhIDOP2KCxdaq2JZeYnLJSVVnbbAnBleNF0-RKZFD_elR_kg20CO_wIKuMF8YxiZuaRd4lGMWz23Zqz3haOAVGXnp4-g6b3AyhIJb8M1xcK9hgLGwDEoxP2xGTq2prOxlr6hRmJ2ha_-_FqpciT0L2LbIUbWI4_hSMvw3zlYMBcwuB3id0uKOEsYTPUPmyWUfPa2Rj82gqHnNsiQ",
    e: "AQAB",
    pem: include_str!("primary.pem"),
};

pub const ROTATED: TestKey = TestKey {
    kid: "rotated-key",
    n: "2oKEcstv1n-pBxW5kacAfoTIIhHzZOqaxNMpCheV6-z42yqQhP43xgyfaefrMameHx1VFY7G6qEDJzfNaYWYBgKEKZIWzX8n4tnYQIOL9Das8RPvixnKCNeNsltpBKYVVT4EqlycLbMRIwXGNp0so9KXDzMk_12Yb360fD8NiruYNlqi8jF0Qi8qxYdr418V_02NbJpP8nQHCDZNXIWRcSIokZ93gjjrk5QrkbdQ7gP369Fe2WYGF3CUJRcQvseT-2TO4sg35DeivTAV9aKHGqcBlFOqOizV-kPL_w0Bkgi2z3_EGp9UKmQQkubLOGfNla0iTfVOuSUxW0jZv2Xy0Q",
    e: "AQAB",
    pem: include_str!("rotated.pem"),
};

impl TestKey {
    /// Public JWK entry for this key
    pub fn jwk(&self) -> Value {
        json!({
            "kid": self.kid,
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "n": self.n,
            "e": self.e,
        })
    }

    /// Signs `claims` with RS256 and this key's `kid`.
    pub fn sign(&self, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.to_string());
        self.sign_with_header(&header, claims)
    }

    pub fn sign_with_header(&self, header: &Header, claims: &Value) -> String {
        let key = EncodingKey::from_rsa_pem(self.pem.as_bytes()).expect("valid test key");
        encode(header, claims, &key).expect("failed to sign test token")
    }
}

/// JWKS document publishing the given keys
pub fn jwks(keys: &[&TestKey]) -> Value {
    json!({ "keys": keys.iter().map(|key| key.jwk()).collect::<Vec<_>>() })
}

pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Valid claims for [`ISSUER`] and [`AUDIENCE`] expiring in an hour.
pub fn claims(permissions: &[&str]) -> Value {
    let now = unix_now();
    json!({
        "iss": ISSUER,
        "sub": "auth0|casting-director",
        "aud": [AUDIENCE, "https://casting-agency.test/userinfo"],
        "iat": now,
        "exp": now + 3600,
        "azp": "casting-client",
        "scope": "openid profile email",
        "permissions": permissions,
    })
}

/// Replaces the signature segment with one that differs in a single byte.
pub fn tamper_signature(token: &str) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    let (signed, signature) = token.rsplit_once('.').expect("compact token");
    let mut bytes = URL_SAFE_NO_PAD.decode(signature).expect("base64url signature");
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0x01;
    format!("{}.{}", signed, URL_SAFE_NO_PAD.encode(bytes))
}

/// Serves a fixed sequence of JWKS documents, `None` standing for an
/// unreachable endpoint. The last entry repeats once the sequence is used up.
pub struct SequenceFetcher {
    responses: Mutex<Vec<Option<Value>>>,
    calls: AtomicUsize,
}

impl SequenceFetcher {
    pub fn new(responses: Vec<Option<Value>>) -> Self {
        assert!(!responses.is_empty(), "at least one response is required");
        Self {
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JwksFetcher for SequenceFetcher {
    fn endpoint(&self) -> &str {
        "memory://jwks"
    }

    async fn fetch(&self) -> Result<JwksDocument, KeySourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let response = {
            let responses = self.responses.lock().expect("poisoned");
            responses[call.min(responses.len() - 1)].clone()
        };
        // Give concurrent callers a chance to pile up behind this fetch
        tokio::task::yield_now().await;
        match response {
            Some(document) => serde_json::from_value(document)
                .map_err(|e| KeySourceError::Document(e.to_string())),
            None => Err(KeySourceError::Document("endpoint unreachable".to_string())),
        }
    }
}
