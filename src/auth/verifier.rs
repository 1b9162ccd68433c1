use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{
    decode, decode_header,
    errors::ErrorKind,
    jwk::{Jwk, JwkSet},
    Algorithm, DecodingKey, Validation,
};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::claims::{decode_claim, ClaimError, IdentityClaim, TokenPayload};

/// Turns a client-supplied ID token into an identity claim.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<IdentityClaim, ClaimError>;
}

/// Accepts any well-formed token without checking who signed it.
pub struct DecodeOnlyVerifier;

#[async_trait]
impl IdentityVerifier for DecodeOnlyVerifier {
    async fn verify(&self, token: &str) -> Result<IdentityClaim, ClaimError> {
        warn!("identity token accepted without signature verification (AUTH_MODE=decode-only)");
        decode_claim(token, OffsetDateTime::now_utc())
    }
}

/// How long a fetched key set is trusted before an unknown `kid` may
/// trigger another fetch.
const REFRESH_COOLDOWN: Duration = Duration::from_secs(60);

struct KeyCache {
    set: JwkSet,
    fetched_at: Option<Instant>,
}

/// Verifies ID tokens against the issuer's published JSON Web Key Set.
///
/// Keys are fetched lazily and cached. A token signed with an unknown `kid`
/// triggers at most one refetch per cooldown window, however many such
/// tokens arrive.
pub struct JwksVerifier {
    http: reqwest::Client,
    jwks_url: Option<String>,
    audience: String,
    issuers: Vec<String>,
    algorithms: Vec<Algorithm>,
    cooldown: Duration,
    keys: RwLock<KeyCache>,
}

impl JwksVerifier {
    pub fn new(
        jwks_url: impl Into<String>,
        audience: impl Into<String>,
        issuers: Vec<String>,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            jwks_url: Some(jwks_url.into()),
            audience: audience.into(),
            issuers,
            algorithms: vec![Algorithm::RS256],
            cooldown: REFRESH_COOLDOWN,
            keys: RwLock::new(KeyCache { set: JwkSet { keys: Vec::new() }, fetched_at: None }),
        })
    }

    /// A verifier over a fixed key set that never goes to the network.
    pub fn with_keys(
        keys: JwkSet,
        audience: impl Into<String>,
        issuers: Vec<String>,
        algorithms: Vec<Algorithm>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            jwks_url: None,
            audience: audience.into(),
            issuers,
            algorithms,
            cooldown: REFRESH_COOLDOWN,
            keys: RwLock::new(KeyCache { set: keys, fetched_at: None }),
        }
    }

    async fn fetch(&self, url: &str) -> Result<JwkSet, ClaimError> {
        let fetched = async {
            self.http
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .json::<JwkSet>()
                .await
        }
        .await
        .map_err(|e| {
            warn!(error = %e, url, "jwks fetch failed");
            ClaimError::KeysUnavailable
        })?;
        debug!(keys = fetched.keys.len(), "jwks refreshed");
        Ok(fetched)
    }

    async fn cached_key(&self, kid: &str) -> Result<Option<DecodingKey>, ClaimError> {
        let cache = self.keys.read().await;
        cache.set.find(kid).map(key_from_jwk).transpose()
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, ClaimError> {
        if let Some(key) = self.cached_key(kid).await? {
            return Ok(key);
        }
        let Some(url) = self.jwks_url.as_deref() else {
            return Err(ClaimError::KeysUnavailable);
        };

        // Misses queue here; only the first one goes to the network.
        let mut cache = self.keys.write().await;
        if let Some(jwk) = cache.set.find(kid) {
            return key_from_jwk(jwk);
        }
        let cooling = cache
            .fetched_at
            .is_some_and(|at| at.elapsed() < self.cooldown);
        if !cooling {
            cache.fetched_at = Some(Instant::now());
            cache.set = self.fetch(url).await?;
        } else if cache.set.keys.is_empty() {
            return Err(ClaimError::KeysUnavailable);
        }
        match cache.set.find(kid) {
            Some(jwk) => key_from_jwk(jwk),
            None => Err(ClaimError::Rejected(format!("unknown signing key {kid}"))),
        }
    }
}

fn key_from_jwk(jwk: &Jwk) -> Result<DecodingKey, ClaimError> {
    DecodingKey::from_jwk(jwk).map_err(|e| ClaimError::Rejected(e.to_string()))
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> ClaimError {
    match err.kind() {
        ErrorKind::ExpiredSignature => ClaimError::ExpiredClaim,
        ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            ClaimError::MalformedToken
        }
        _ => ClaimError::Rejected(err.to_string()),
    }
}

#[async_trait]
impl IdentityVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> Result<IdentityClaim, ClaimError> {
        let header = decode_header(token).map_err(|_| ClaimError::MalformedToken)?;
        if !self.algorithms.contains(&header.alg) {
            return Err(ClaimError::Rejected(format!(
                "unsupported algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| ClaimError::Rejected("token has no key id".into()))?;
        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(header.alg);
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(&self.issuers);

        let data = decode::<TokenPayload>(token, &key, &validation).map_err(map_jwt_error)?;
        let claim = data.claims.into_claim(OffsetDateTime::now_utc())?;
        debug!(kid = %kid, "identity token verified");
        Ok(claim)
    }
}
