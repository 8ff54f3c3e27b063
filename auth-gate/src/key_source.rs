//! Public signing keys of the identity provider.
//!
//! The key set is fetched from a JWKS endpoint and kept as one immutable
//! snapshot. Snapshots are replaced wholesale, never edited in place, so
//! concurrent verifications always see a consistent set.

use crate::error::{AuthErrorKind, KeySourceError};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey};
use log::{debug, error, info, warn};
use moka::future::Cache as MokaCache;
use serde::Deserialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// A single entry of a JWKS document as published by the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    #[serde(default)]
    pub kid: Option<String>,
    pub kty: String,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
}

/// `{"keys": [...]}` document served by the JWKS endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct JwksDocument {
    pub keys: Vec<Jwk>,
}

/// Public key usable for signature verification.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    algorithm: Algorithm,
    decoding_key: DecodingKey,
}

impl SigningKey {
    /// Builds a key from base64url encoded RSA modulus and exponent.
    pub fn from_rsa_components(
        kid: impl Into<String>,
        algorithm: Algorithm,
        n: &str,
        e: &str,
    ) -> Result<Self, jsonwebtoken::errors::Error> {
        Ok(Self {
            kid: kid.into(),
            algorithm,
            decoding_key: DecodingKey::from_rsa_components(n, e)?,
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Snapshot of every usable key published by the identity provider.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: Vec<SigningKey>,
}

impl KeySet {
    pub fn new(keys: Vec<SigningKey>) -> Self {
        Self { keys }
    }

    /// Keeps the RSA signing keys matching `algorithm`; anything else in the
    /// document is skipped.
    pub fn from_document(document: &JwksDocument, algorithm: Algorithm) -> Self {
        let keys = document
            .keys
            .iter()
            .filter_map(|jwk| match usable_key(jwk, algorithm) {
                Ok(key) => Some(key),
                Err(reason) => {
                    warn!(
                        "Skipping JWKS entry '{}': {}",
                        jwk.kid.as_deref().unwrap_or("<no kid>"),
                        reason
                    );
                    None
                }
            })
            .collect();
        Self { keys }
    }

    pub fn find(&self, kid: &str) -> Option<&SigningKey> {
        self.keys.iter().find(|key| key.kid == kid)
    }

    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|key| key.kid.as_str())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn usable_key(jwk: &Jwk, algorithm: Algorithm) -> Result<SigningKey, String> {
    if jwk.kty != "RSA" {
        return Err(format!("unsupported key type {}", jwk.kty));
    }
    if let Some(key_use) = jwk.key_use.as_deref() {
        if key_use != "sig" {
            return Err(format!("key use is '{key_use}'"));
        }
    }
    if let Some(alg) = jwk.alg.as_deref() {
        if alg.parse::<Algorithm>().ok() != Some(algorithm) {
            return Err(format!("algorithm {alg} is not accepted"));
        }
    }
    let kid = jwk.kid.as_deref().ok_or("missing kid")?;
    let n = jwk.n.as_deref().ok_or("missing modulus")?;
    let e = jwk.e.as_deref().ok_or("missing exponent")?;
    SigningKey::from_rsa_components(kid, algorithm, n, e).map_err(|e| e.to_string())
}

/// Retrieves the JWKS document from wherever the identity provider publishes it.
#[async_trait]
pub trait JwksFetcher: Send + Sync {
    /// Location of the key set, used as cache key and in logs
    fn endpoint(&self) -> &str;

    async fn fetch(&self) -> Result<JwksDocument, KeySourceError>;
}

/// Fetches the JWKS document over HTTP(S) with a bounded timeout.
pub struct HttpJwksFetcher {
    url: String,
    client: reqwest::Client,
}

impl HttpJwksFetcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl JwksFetcher for HttpJwksFetcher {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<JwksDocument, KeySourceError> {
        let response = self
            .client
            .get(&self.url)
            .header(http::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeySourceError::Status(status.as_u16()));
        }

        response
            .json::<JwksDocument>()
            .await
            .map_err(|e| KeySourceError::Document(e.to_string()))
    }
}

/// Read-mostly cache of the identity provider's key set.
///
/// Lookups for a cold or expired cache are coalesced into a single fetch.
/// A lookup for an unknown `kid` forces at most one refresh; callers that
/// queue up behind an in-flight refresh reuse its result.
pub struct KeySource {
    fetcher: Arc<dyn JwksFetcher>,
    algorithm: Algorithm,
    cache: MokaCache<String, Arc<KeySet>>,
    refresh_cooldown: Duration,
    // Held for the whole duration of a forced refresh
    forced_refresh: Mutex<ForcedRefresh>,
    // Bumped after every forced refresh attempt, successful or not
    refresh_generation: AtomicU64,
}

/// Outcome of the latest forced refresh
#[derive(Debug, Default)]
struct ForcedRefresh {
    attempted_at: Option<Instant>,
    failed: bool,
}

impl KeySource {
    pub fn new(
        fetcher: Arc<dyn JwksFetcher>,
        algorithm: Algorithm,
        refresh_interval: Duration,
        refresh_cooldown: Duration,
    ) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(1)
            .time_to_live(refresh_interval)
            .build();

        Self {
            fetcher,
            algorithm,
            cache,
            refresh_cooldown,
            forced_refresh: Mutex::new(ForcedRefresh::default()),
            refresh_generation: AtomicU64::new(0),
        }
    }

    pub fn endpoint(&self) -> &str {
        self.fetcher.endpoint()
    }

    /// Resolves `kid` to a signing key, refreshing the key set once if the
    /// id is not in the cached snapshot.
    pub async fn get_key(&self, kid: &str) -> Result<SigningKey, AuthErrorKind> {
        let current = self.key_set().await?;
        if let Some(key) = current.find(kid) {
            return Ok(key.clone());
        }

        debug!("Key '{}' not in cached key set, refreshing", kid);
        let refreshed = self.refresh_stale(&current).await?;
        refreshed.find(kid).cloned().ok_or(AuthErrorKind::UnknownKey)
    }

    /// Current key set, loading it if the cache is cold or expired.
    pub async fn key_set(&self) -> Result<Arc<KeySet>, AuthErrorKind> {
        self.cache
            .try_get_with(self.endpoint().to_string(), self.load())
            .await
            .map_err(|e| self.unavailable(&e))
    }

    /// Drops the cached key set; the next lookup fetches it again.
    pub async fn clear(&self) {
        self.cache.invalidate(self.endpoint()).await;
        debug!("Key set cache for {} cleared", self.endpoint());
    }

    /// Replaces `stale` with a freshly fetched key set.
    ///
    /// Callers that queued behind another attempt, or that arrive within the
    /// cooldown of the last attempt, share its outcome instead of fetching:
    /// the current snapshot after a success, `KeySourceUnavailable` after a
    /// failure. A key rotated in during the cooldown therefore stays unknown
    /// until the cooldown has passed.
    async fn refresh_stale(&self, stale: &Arc<KeySet>) -> Result<Arc<KeySet>, AuthErrorKind> {
        let seen_generation = self.refresh_generation.load(Ordering::Acquire);
        let mut forced_refresh = self.forced_refresh.lock().await;

        let current = self.cache.get(self.endpoint()).await;
        if let Some(current) = &current {
            if !Arc::ptr_eq(current, stale) {
                debug!("Key set was refreshed while waiting, reusing it");
                return Ok(current.clone());
            }
        }

        let attempted_while_waiting =
            self.refresh_generation.load(Ordering::Acquire) != seen_generation;
        let within_cooldown = forced_refresh
            .attempted_at
            .is_some_and(|at| at.elapsed() < self.refresh_cooldown);
        if attempted_while_waiting || within_cooldown {
            if forced_refresh.failed {
                debug!("Latest key set refresh failed, not retrying yet");
                return Err(AuthErrorKind::KeySourceUnavailable);
            }
            if let Some(current) = current {
                debug!("Key set refreshed recently, skipping refresh");
                return Ok(current);
            }
        }

        forced_refresh.attempted_at = Some(Instant::now());
        let loaded = self.load().await;
        self.refresh_generation.fetch_add(1, Ordering::Release);

        match loaded {
            Ok(fresh) => {
                forced_refresh.failed = false;
                self.cache
                    .insert(self.endpoint().to_string(), fresh.clone())
                    .await;
                Ok(fresh)
            }
            Err(e) => {
                forced_refresh.failed = true;
                Err(self.unavailable(&e))
            }
        }
    }

    async fn load(&self) -> Result<Arc<KeySet>, KeySourceError> {
        let document = self.fetcher.fetch().await?;
        let key_set = KeySet::from_document(&document, self.algorithm);
        info!(
            "Loaded {} signing key(s) from {}",
            key_set.len(),
            self.endpoint()
        );
        Ok(Arc::new(key_set))
    }

    fn unavailable(&self, err: &KeySourceError) -> AuthErrorKind {
        error!("Failed to load key set from {}: {}", self.endpoint(), err);
        AuthErrorKind::KeySourceUnavailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, SequenceFetcher};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn key_source(fetcher: Arc<SequenceFetcher>, cooldown: Duration) -> KeySource {
        KeySource::new(
            fetcher,
            Algorithm::RS256,
            Duration::from_secs(600),
            cooldown,
        )
    }

    #[test]
    fn test_key_set_filters_unusable_entries() {
        let document: JwksDocument = serde_json::from_value(json!({
            "keys": [
                testing::PRIMARY.jwk(),
                { "kid": "ec", "kty": "EC", "crv": "P-256", "x": "abc", "y": "def" },
                { "kid": "enc", "kty": "RSA", "use": "enc", "n": testing::ROTATED.n, "e": "AQAB" },
                { "kid": "hs", "kty": "RSA", "alg": "RS512", "n": testing::ROTATED.n, "e": "AQAB" },
                { "kty": "RSA", "n": testing::ROTATED.n, "e": "AQAB" },
                { "kid": "no-modulus", "kty": "RSA", "e": "AQAB" },
            ]
        }))
        .unwrap();

        let key_set = KeySet::from_document(&document, Algorithm::RS256);
        assert_eq!(key_set.kids().collect::<Vec<_>>(), vec![testing::PRIMARY.kid]);
        assert_eq!(key_set.len(), 1);
        assert!(key_set.find("ec").is_none());
    }

    #[tokio::test]
    async fn test_get_key_loads_once() {
        let fetcher = Arc::new(SequenceFetcher::new(vec![Some(testing::jwks(&[
            &testing::PRIMARY,
        ]))]));
        let source = key_source(fetcher.clone(), Duration::from_secs(60));

        for _ in 0..5 {
            let key = source.get_key(testing::PRIMARY.kid).await.unwrap();
            assert_eq!(key.kid(), testing::PRIMARY.kid);
            assert_eq!(key.algorithm(), Algorithm::RS256);
        }
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_kid_refreshes_to_rotated_key() {
        let fetcher = Arc::new(SequenceFetcher::new(vec![
            Some(testing::jwks(&[&testing::PRIMARY])),
            Some(testing::jwks(&[&testing::PRIMARY, &testing::ROTATED])),
        ]));
        let source = key_source(fetcher.clone(), Duration::from_secs(60));

        source.get_key(testing::PRIMARY.kid).await.unwrap();
        let rotated = source.get_key(testing::ROTATED.kid).await.unwrap();
        assert_eq!(rotated.kid(), testing::ROTATED.kid);
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_unknown_kid_after_refresh_fails_fast() {
        let fetcher = Arc::new(SequenceFetcher::new(vec![Some(testing::jwks(&[
            &testing::PRIMARY,
        ]))]));
        let source = key_source(fetcher.clone(), Duration::from_secs(60));

        assert_eq!(
            source.get_key("nope").await.unwrap_err(),
            AuthErrorKind::UnknownKey
        );
        assert_eq!(fetcher.calls(), 2);

        // Within the cooldown no further fetch is attempted
        assert_eq!(
            source.get_key("still-nope").await.unwrap_err(),
            AuthErrorKind::UnknownKey
        );
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_refresh() {
        let fetcher = Arc::new(SequenceFetcher::new(vec![
            Some(testing::jwks(&[&testing::PRIMARY])),
            Some(testing::jwks(&[&testing::PRIMARY, &testing::ROTATED])),
        ]));
        let source = Arc::new(key_source(fetcher.clone(), Duration::from_secs(60)));

        let mut handles = vec![];
        for _ in 0..16 {
            let source = source.clone();
            handles.push(tokio::spawn(async move {
                source.get_key(testing::ROTATED.kid).await
            }));
        }
        for handle in handles {
            let key = handle.await.unwrap().unwrap();
            assert_eq!(key.kid(), testing::ROTATED.kid);
        }

        // One cold load plus one forced refresh
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_failed_refresh() {
        let fetcher = Arc::new(SequenceFetcher::new(vec![
            Some(testing::jwks(&[&testing::PRIMARY])),
            None,
        ]));
        let source = Arc::new(key_source(fetcher.clone(), Duration::from_secs(60)));
        source.get_key(testing::PRIMARY.kid).await.unwrap();

        let mut handles = vec![];
        for _ in 0..8 {
            let source = source.clone();
            handles.push(tokio::spawn(async move {
                source.get_key(testing::ROTATED.kid).await
            }));
        }
        for handle in handles {
            assert_eq!(
                handle.await.unwrap().unwrap_err(),
                AuthErrorKind::KeySourceUnavailable
            );
        }
        assert_eq!(fetcher.calls(), 2);

        // Later misses within the cooldown do not hit the failing endpoint
        for kid in ["a", "b", "c", "d", "e"] {
            assert_eq!(
                source.get_key(kid).await.unwrap_err(),
                AuthErrorKind::KeySourceUnavailable
            );
        }
        assert_eq!(fetcher.calls(), 2);

        // Cached keys keep working during the outage
        assert!(source.get_key(testing::PRIMARY.kid).await.is_ok());
    }

    #[tokio::test]
    async fn test_rotated_key_unknown_until_cooldown_passes() {
        let fetcher = Arc::new(SequenceFetcher::new(vec![
            Some(testing::jwks(&[&testing::PRIMARY])),
            Some(testing::jwks(&[&testing::PRIMARY])),
            Some(testing::jwks(&[&testing::PRIMARY, &testing::ROTATED])),
        ]));
        let source = key_source(fetcher.clone(), Duration::from_millis(100));

        // A junk kid spends the forced refresh
        assert_eq!(
            source.get_key("junk").await.unwrap_err(),
            AuthErrorKind::UnknownKey
        );
        assert_eq!(
            source.get_key(testing::ROTATED.kid).await.unwrap_err(),
            AuthErrorKind::UnknownKey
        );
        assert_eq!(fetcher.calls(), 2);

        tokio::time::sleep(Duration::from_millis(150)).await;
        let rotated = source.get_key(testing::ROTATED.kid).await.unwrap();
        assert_eq!(rotated.kid(), testing::ROTATED.kid);
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_unavailable() {
        let fetcher = Arc::new(SequenceFetcher::new(vec![None]));
        let source = key_source(fetcher.clone(), Duration::from_secs(60));

        assert_eq!(
            source.get_key(testing::PRIMARY.kid).await.unwrap_err(),
            AuthErrorKind::KeySourceUnavailable
        );
    }

    #[tokio::test]
    async fn test_refresh_failure_is_unavailable() {
        let fetcher = Arc::new(SequenceFetcher::new(vec![
            Some(testing::jwks(&[&testing::PRIMARY])),
            None,
        ]));
        let source = key_source(fetcher.clone(), Duration::ZERO);

        source.get_key(testing::PRIMARY.kid).await.unwrap();
        assert_eq!(
            source.get_key(testing::ROTATED.kid).await.unwrap_err(),
            AuthErrorKind::KeySourceUnavailable
        );
        // The previous snapshot survives a failed refresh
        assert!(source.get_key(testing::PRIMARY.kid).await.is_ok());
    }

    #[tokio::test]
    async fn test_clear_refetches() {
        let fetcher = Arc::new(SequenceFetcher::new(vec![Some(testing::jwks(&[
            &testing::PRIMARY,
        ]))]));
        let source = key_source(fetcher.clone(), Duration::from_secs(60));

        source.get_key(testing::PRIMARY.kid).await.unwrap();
        source.clear().await;
        source.get_key(testing::PRIMARY.kid).await.unwrap();
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_http_fetcher() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(testing::jwks(&[&testing::PRIMARY])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpJwksFetcher::new(
            format!("{}/.well-known/jwks.json", server.uri()),
            Duration::from_secs(2),
        )
        .unwrap();
        let document = fetcher.fetch().await.unwrap();
        assert_eq!(document.keys.len(), 1);
        assert_eq!(document.keys[0].kid.as_deref(), Some(testing::PRIMARY.kid));
    }

    #[tokio::test]
    async fn test_http_fetcher_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = HttpJwksFetcher::new(server.uri(), Duration::from_secs(2)).unwrap();
        assert!(matches!(
            fetcher.fetch().await,
            Err(KeySourceError::Status(503))
        ));
    }

    #[tokio::test]
    async fn test_http_fetcher_invalid_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let fetcher = HttpJwksFetcher::new(server.uri(), Duration::from_secs(2)).unwrap();
        assert!(matches!(
            fetcher.fetch().await,
            Err(KeySourceError::Document(_))
        ));
    }

    #[tokio::test]
    async fn test_http_fetcher_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(testing::jwks(&[&testing::PRIMARY]))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let fetcher = Arc::new(
            HttpJwksFetcher::new(server.uri(), Duration::from_millis(200)).unwrap(),
        );
        let source = KeySource::new(
            fetcher,
            Algorithm::RS256,
            Duration::from_secs(600),
            Duration::from_secs(5),
        );
        assert_eq!(
            source.get_key(testing::PRIMARY.kid).await.unwrap_err(),
            AuthErrorKind::KeySourceUnavailable
        );
    }
}
