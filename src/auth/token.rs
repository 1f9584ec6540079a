//! Hand-rolled compact token format: three dot-separated URL-safe base64
//! segments (`header.claims.signature`), signed with HMAC-SHA-256. The wire
//! format matches the usual JWS compact serialization so any JWT library can
//! read what we issue.

use axum::extract::FromRef;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::auth::claims::{Claims, TokenKind};
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Verification failures. All of these collapse to a generic 401 at the
/// HTTP boundary; the variants exist for logging and tests only.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token not yet valid")]
    NotYetValid,
    #[error("issuer mismatch")]
    IssuerMismatch,
    #[error("audience mismatch")]
    AudienceMismatch,
}

fn encode_segment(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

fn decode_segment(text: &str) -> Result<Vec<u8>, TokenError> {
    URL_SAFE_NO_PAD.decode(text).map_err(|_| TokenError::Malformed)
}

fn sign_segments(data: &str, secret: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(data.as_bytes());
    encode_segment(&mac.finalize().into_bytes())
}

/// Issues and verifies tokens. Built once per process from config; the
/// secret has already been validated at startup.
#[derive(Clone)]
pub struct TokenSigner {
    secret: Vec<u8>,
    algorithm: String,
    issuer: String,
    audience: String,
    access_ttl: i64,
    refresh_ttl: i64,
}

impl FromRef<AppState> for TokenSigner {
    fn from_ref(state: &AppState) -> Self {
        let cfg = &state.config.token;
        Self {
            secret: cfg.secret.as_bytes().to_vec(),
            algorithm: cfg.algorithm.clone(),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: cfg.ttl_seconds,
            refresh_ttl: cfg.refresh_ttl_seconds,
        }
    }
}

impl TokenSigner {
    pub fn issue(
        &self,
        user_id: Uuid,
        name: &str,
        email: &str,
        kind: TokenKind,
    ) -> anyhow::Result<String> {
        self.issue_at(user_id, name, email, kind, OffsetDateTime::now_utc().unix_timestamp())
    }

    fn issue_at(
        &self,
        user_id: Uuid,
        name: &str,
        email: &str,
        kind: TokenKind,
        now: i64,
    ) -> anyhow::Result<String> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user_id,
            name: name.to_string(),
            email: email.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now,
            nbf: now,
            exp: now + ttl,
        };

        let header = json!({ "alg": self.algorithm, "typ": "JWT" });
        let header_seg = encode_segment(&serde_json::to_vec(&header)?);
        let claims_seg = encode_segment(&serde_json::to_vec(&claims)?);
        let signature = sign_segments(&format!("{header_seg}.{claims_seg}"), &self.secret);

        debug!(user_id = %user_id, kind = ?kind, "token issued");
        Ok(format!("{header_seg}.{claims_seg}.{signature}"))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, OffsetDateTime::now_utc().unix_timestamp())
    }

    /// Checks run in a fixed order: structure, signature, then the temporal
    /// and identity claims. Nothing here panics on hostile input; every
    /// failure is a value.
    fn verify_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (header_seg, claims_seg, signature) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(h), Some(c), Some(s), None) => (h, c, s),
                _ => return Err(TokenError::Malformed),
            };

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC can take key of any size");
        mac.update(header_seg.as_bytes());
        mac.update(b".");
        mac.update(claims_seg.as_bytes());
        let given = decode_segment(signature)?;
        // verify_slice compares in constant time
        mac.verify_slice(&given).map_err(|_| TokenError::BadSignature)?;

        let claims: Claims = serde_json::from_slice(&decode_segment(claims_seg)?)
            .map_err(|_| TokenError::Malformed)?;

        if claims.exp <= now {
            return Err(TokenError::Expired);
        }
        if claims.nbf > now {
            return Err(TokenError::NotYetValid);
        }
        if claims.iss != self.issuer {
            return Err(TokenError::IssuerMismatch);
        }
        if claims.aud != self.audience {
            return Err(TokenError::AudienceMismatch);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_signer() -> TokenSigner {
        TokenSigner {
            secret: b"test-secret".to_vec(),
            algorithm: "HS256".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            access_ttl: 86_400,
            refresh_ttl: 604_800,
        }
    }

    #[test]
    fn issue_and_verify_round_trip() {
        let signer = make_signer();
        let user_id = Uuid::new_v4();
        let token = signer
            .issue(user_id, "Alice", "alice@example.com", TokenKind::Access)
            .expect("issue");
        let claims = signer.verify(&token).expect("verify");
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.name, "Alice");
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.iss, "test-issuer");
        assert_eq!(claims.aud, "test-aud");
        assert_eq!(claims.exp, claims.iat + 86_400);
        assert_eq!(claims.nbf, claims.iat);
    }

    #[test]
    fn refresh_token_only_differs_in_lifetime() {
        let signer = make_signer();
        let token = signer
            .issue(Uuid::new_v4(), "Bob", "bob@example.com", TokenKind::Refresh)
            .expect("issue");
        let claims = signer.verify(&token).expect("verify");
        assert_eq!(claims.exp, claims.iat + 604_800);
    }

    #[test]
    fn verify_rejects_after_expiry() {
        let signer = make_signer();
        let now = 1_700_000_000;
        let token = signer
            .issue_at(Uuid::new_v4(), "A", "a@example.com", TokenKind::Access, now)
            .expect("issue");
        assert!(signer.verify_at(&token, now + 100).is_ok());
        assert_eq!(
            signer.verify_at(&token, now + 86_401).unwrap_err(),
            TokenError::Expired
        );
    }

    #[test]
    fn verify_rejects_before_nbf() {
        let signer = make_signer();
        let now = 1_700_000_000;
        let token = signer
            .issue_at(Uuid::new_v4(), "A", "a@example.com", TokenKind::Access, now)
            .expect("issue");
        assert_eq!(
            signer.verify_at(&token, now - 10).unwrap_err(),
            TokenError::NotYetValid
        );
    }

    #[test]
    fn verify_rejects_wrong_issuer_and_audience() {
        let mut other = make_signer();
        other.issuer = "someone-else".into();
        let token = other
            .issue(Uuid::new_v4(), "A", "a@example.com", TokenKind::Access)
            .expect("issue");
        assert_eq!(
            make_signer().verify(&token).unwrap_err(),
            TokenError::IssuerMismatch
        );

        let mut other = make_signer();
        other.audience = "other-client".into();
        let token = other
            .issue(Uuid::new_v4(), "A", "a@example.com", TokenKind::Access)
            .expect("issue");
        assert_eq!(
            make_signer().verify(&token).unwrap_err(),
            TokenError::AudienceMismatch
        );
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let signer = make_signer();
        let token = signer
            .issue(Uuid::new_v4(), "A", "a@example.com", TokenKind::Access)
            .expect("issue");
        let mut other = make_signer();
        other.secret = b"another-secret".to_vec();
        assert_eq!(other.verify(&token).unwrap_err(), TokenError::BadSignature);
    }

    #[test]
    fn verify_rejects_wrong_segment_count() {
        let signer = make_signer();
        let token = signer
            .issue(Uuid::new_v4(), "A", "a@example.com", TokenKind::Access)
            .expect("issue");
        let two_segments = token.rsplit_once('.').unwrap().0;
        assert_eq!(
            signer.verify(two_segments).unwrap_err(),
            TokenError::Malformed
        );
        assert_eq!(
            signer.verify(&format!("{token}.extra")).unwrap_err(),
            TokenError::Malformed
        );
        assert_eq!(signer.verify("").unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn verify_rejects_undecodable_segments() {
        let signer = make_signer();
        assert_eq!(
            signer.verify("not base64!.still not!.nope!").unwrap_err(),
            TokenError::Malformed
        );
    }

    #[test]
    fn flipping_any_character_breaks_verification() {
        let signer = make_signer();
        let token = signer
            .issue(Uuid::new_v4(), "Alice", "alice@example.com", TokenKind::Access)
            .expect("issue");
        for (i, c) in token.char_indices() {
            if c == '.' {
                continue;
            }
            let replacement = if c == 'x' { 'y' } else { 'x' };
            let mut tampered = token.clone();
            tampered.replace_range(i..i + 1, &replacement.to_string());
            assert!(
                signer.verify(&tampered).is_err(),
                "tampering at byte {i} went undetected"
            );
        }
    }

    #[test]
    fn correctly_signed_garbage_claims_are_malformed() {
        let signer = make_signer();
        let header = encode_segment(br#"{"alg":"HS256","typ":"JWT"}"#);
        let claims = encode_segment(b"not json at all");
        let signature = sign_segments(&format!("{header}.{claims}"), &signer.secret);
        assert_eq!(
            signer
                .verify(&format!("{header}.{claims}.{signature}"))
                .unwrap_err(),
            TokenError::Malformed
        );
    }
}
