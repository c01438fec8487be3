// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! JWT validator. Given a bearer string, returns a
//! [`crate::domain::UserClaims`], fails [`JwtError::Invalid`] (signature,
//! format, missing required claim, disallowed algorithm, bad
//! audience/issuer, `nbf` in the future, `iat` implausible, age beyond
//! `max_token_age`, unsupported api-version), or fails [`JwtError::Expired`]
//! (now − skew > exp).
//!
//! Grounded structurally on
//! `orchestrator/core/src/infrastructure/smcp/signature.rs`'s
//! `ContextTokenVerifier`, which wraps the same `jsonwebtoken` crate; this
//! validator generalizes from that file's single hard-coded RS256 check to
//! a full algorithm-allowlist / claim-name / max-age / api-version
//! contract.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use thiserror::Error;

use crate::config::Settings;
use crate::domain::UserClaims;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("invalid token: {0}")]
    Invalid(String),
    #[error("token has expired")]
    Expired,
}

impl JwtError {
    pub fn is_expired(&self) -> bool {
        matches!(self, JwtError::Expired)
    }
}

fn parse_algorithm(name: &str) -> Option<Algorithm> {
    match name.to_ascii_uppercase().as_str() {
        "HS256" => Some(Algorithm::HS256),
        "HS384" => Some(Algorithm::HS384),
        "HS512" => Some(Algorithm::HS512),
        "RS256" => Some(Algorithm::RS256),
        "RS384" => Some(Algorithm::RS384),
        "RS512" => Some(Algorithm::RS512),
        "ES256" => Some(Algorithm::ES256),
        "ES384" => Some(Algorithm::ES384),
        "PS256" => Some(Algorithm::PS256),
        "PS384" => Some(Algorithm::PS384),
        "PS512" => Some(Algorithm::PS512),
        _ => None,
    }
}

fn is_hmac(alg: Algorithm) -> bool {
    matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

/// Validates bearer tokens against a fixed configuration snapshot.
/// Stateless and cheap to clone; held in shared `AppState`.
#[derive(Clone)]
pub struct JwtValidator {
    allowed_algorithms: Vec<Algorithm>,
    decoding_key_material: String,
    issuer: Option<String>,
    audience: Option<String>,
    max_token_age: Option<Duration>,
    clock_skew: Duration,
    user_id_claim: String,
    exp_claim: String,
    iat_claim: String,
    tenant_claim: String,
    api_version_claim: String,
    allowed_api_versions: Vec<String>,
}

impl JwtValidator {
    pub fn from_settings(settings: &Settings) -> Result<Self, JwtError> {
        let allowed_algorithms: Vec<Algorithm> = settings
            .jwt_allowed_algorithms
            .iter()
            .map(|name| {
                parse_algorithm(name)
                    .ok_or_else(|| JwtError::Invalid(format!("unsupported algorithm {name:?}")))
            })
            .collect::<Result<_, _>>()?;
        if allowed_algorithms.is_empty() {
            return Err(JwtError::Invalid("no allowed algorithms configured".to_string()));
        }

        Ok(JwtValidator {
            allowed_algorithms,
            decoding_key_material: settings.jwt_secret_key.clone(),
            issuer: settings.jwt_issuer.clone(),
            audience: settings.jwt_audience.clone(),
            max_token_age: settings.jwt_max_token_age,
            clock_skew: settings.jwt_clock_skew,
            user_id_claim: settings.jwt_user_id_claim.clone(),
            exp_claim: settings.jwt_exp_claim.clone(),
            iat_claim: settings.jwt_iat_claim.clone(),
            tenant_claim: settings.jwt_tenant_claim.clone(),
            api_version_claim: settings.jwt_api_version_claim.clone(),
            allowed_api_versions: settings.jwt_allowed_api_versions.clone(),
        })
    }

    fn decoding_key(&self, alg: Algorithm) -> Result<DecodingKey, JwtError> {
        if is_hmac(alg) {
            Ok(DecodingKey::from_secret(self.decoding_key_material.as_bytes()))
        } else {
            DecodingKey::from_rsa_pem(self.decoding_key_material.as_bytes())
                .or_else(|_| DecodingKey::from_ec_pem(self.decoding_key_material.as_bytes()))
                .map_err(|e| JwtError::Invalid(format!("invalid key material: {e}")))
        }
    }

    /// Validate a bearer string (without the `Bearer ` prefix) and
    /// extract [`UserClaims`].
    pub fn validate(&self, token: &str) -> Result<UserClaims, JwtError> {
        // Reject alg=none before any other check, including jsonwebtoken's
        // own header parsing below — `Algorithm` has no `none` variant, so
        // `decode_header` would also fail on a genuine `none` header, but
        // only incidentally (as an unparseable enum), not as a rejection
        // this validator can point to. Decoding the raw header ourselves
        // here makes that rejection explicit and first.
        if token
            .split('.')
            .next()
            .and_then(|h| base64_url_decode(h).ok())
            .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok())
            .and_then(|v| v.get("alg").and_then(|a| a.as_str().map(String::from)))
            .map(|a| a.eq_ignore_ascii_case("none"))
            .unwrap_or(false)
        {
            return Err(JwtError::Invalid("alg=none is never accepted".to_string()));
        }

        let header = decode_header(token)
            .map_err(|e| JwtError::Invalid(format!("malformed token header: {e}")))?;
        if !self.allowed_algorithms.contains(&header.alg) {
            return Err(JwtError::Invalid(format!(
                "algorithm {:?} is not in the allowlist",
                header.alg
            )));
        }

        let mut validation = Validation::new(header.alg);
        validation.algorithms = self.allowed_algorithms.clone();
        validation.leeway = self.clock_skew.as_secs();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.required_spec_claims = HashSet::new();

        if let Some(aud) = &self.audience {
            validation.set_audience(&[aud.as_str()]);
        } else {
            validation.validate_aud = false;
        }
        if let Some(iss) = &self.issuer {
            validation.set_issuer(&[iss.as_str()]);
        }

        let key = self.decoding_key(header.alg)?;
        let decoded = decode::<HashMap<String, Value>>(token, &key, &validation).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid(e.to_string()),
            }
        })?;
        let claims = decoded.claims;

        self.check_iat_and_age(&claims)?;
        self.check_api_version(&claims)?;
        self.extract_claims(claims)
    }

    fn check_iat_and_age(&self, claims: &HashMap<String, Value>) -> Result<(), JwtError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        let skew = self.clock_skew.as_secs() as i64;

        if let Some(iat) = claims.get(&self.iat_claim).and_then(Value::as_i64) {
            if iat > now + skew {
                return Err(JwtError::Invalid("iat is implausibly in the future".to_string()));
            }
            if let Some(max_age) = self.max_token_age {
                let age = now - iat;
                if age > max_age.as_secs() as i64 {
                    return Err(JwtError::Invalid("token exceeds max_token_age".to_string()));
                }
            }
        } else if self.max_token_age.is_some() {
            return Err(JwtError::Invalid(format!(
                "max_token_age is configured but claim {:?} is missing",
                self.iat_claim
            )));
        }
        Ok(())
    }

    fn check_api_version(&self, claims: &HashMap<String, Value>) -> Result<(), JwtError> {
        if self.allowed_api_versions.is_empty() {
            return Ok(());
        }
        let version = claims
            .get(&self.api_version_claim)
            .and_then(Value::as_str)
            .ok_or_else(|| JwtError::Invalid("missing required api-version claim".to_string()))?;
        if !self.allowed_api_versions.iter().any(|v| v == version) {
            return Err(JwtError::Invalid(format!(
                "api version {version:?} is not in the allowed set"
            )));
        }
        Ok(())
    }

    fn extract_claims(&self, mut claims: HashMap<String, Value>) -> Result<UserClaims, JwtError> {
        let user_id = claims
            .remove(&self.user_id_claim)
            .or_else(|| claims.remove("user_id"))
            .and_then(|v| v.as_str().map(String::from))
            .ok_or_else(|| {
                JwtError::Invalid(format!(
                    "token missing required {:?} (or user_id) claim",
                    self.user_id_claim
                ))
            })?;
        if user_id.is_empty() {
            return Err(JwtError::Invalid("user_id claim is empty".to_string()));
        }

        let email = claims.remove("email").and_then(|v| v.as_str().map(String::from));
        let roles = string_set(claims.remove("roles"));
        let groups = string_set(claims.remove("groups"));
        let workspace = claims
            .remove(&self.tenant_claim)
            .or_else(|| claims.remove("workspace"))
            .and_then(|v| v.as_str().map(String::from));

        claims.remove(&self.exp_claim);
        claims.remove(&self.iat_claim);
        claims.remove("nbf");
        claims.remove("aud");
        claims.remove("iss");

        Ok(UserClaims {
            user_id,
            email,
            roles,
            groups,
            workspace,
            extra: claims,
        })
    }
}

fn string_set(value: Option<Value>) -> HashSet<String> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        _ => HashSet::new(),
    }
}

/// Minimal base64url decoder for the header-inspection pre-check in
/// [`JwtValidator::validate`]: the `alg=none` rejection has to run before
/// `decode_header` is even called, so it cannot rely on that function's
/// own internal decoding of the first segment.
fn base64_url_decode(input: &str) -> Result<Vec<u8>, &'static str> {
    const TABLE: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
    let mut reverse = [255u8; 256];
    for (i, &c) in TABLE.iter().enumerate() {
        reverse[c as usize] = i as u8;
    }
    let mut out = Vec::with_capacity(input.len() * 3 / 4 + 3);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;
    for byte in input.bytes() {
        let value = reverse[byte as usize];
        if value == 255 {
            continue;
        }
        buffer = (buffer << 6) | value as u32;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
    }
    Ok(out)
}
