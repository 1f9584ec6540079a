use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Access and refresh tokens share one structure; they differ only in
/// lifetime and in the cookie name that carries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claim-set carried inside a signed token.
///
/// `name` and `email` are denormalized display attributes snapshotted at
/// issuance; they can go stale until the next login/refresh and that is
/// accepted, not worked around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub email: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}
