use serde::Deserialize;

/// Known insecure default; the process must refuse to start with it.
const PLACEHOLDER_SECRET: &str = "change-this-secret-key-in-production";

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub secret: String,
    /// Informational only; signing is fixed to HMAC-SHA-256.
    pub algorithm: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub cookie: CookieConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    pub name: String,
    pub path: String,
    pub domain: String,
    pub secure: bool,
    pub same_site: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub path: String,
    pub max_bytes: usize,
}

/// Attempt cap on the public auth endpoints, per client, per window.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_attempts: u32,
    pub window_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub token: TokenConfig,
    pub upload: UploadConfig,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;

        let secret = std::env::var("TOKEN_SECRET").unwrap_or_default();
        validate_secret(&secret)?;

        let token = TokenConfig {
            secret,
            algorithm: std::env::var("TOKEN_ALGORITHM").unwrap_or_else(|_| "HS256".into()),
            issuer: std::env::var("TOKEN_ISSUER").unwrap_or_else(|_| "taskhub-api".into()),
            audience: std::env::var("TOKEN_AUDIENCE").unwrap_or_else(|_| "taskhub-client".into()),
            ttl_seconds: std::env::var("TOKEN_TTL_SECONDS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(86_400),
            refresh_ttl_seconds: std::env::var("TOKEN_REFRESH_TTL_SECONDS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(604_800),
            cookie: CookieConfig {
                name: std::env::var("COOKIE_NAME").unwrap_or_else(|_| "auth_token".into()),
                path: std::env::var("COOKIE_PATH").unwrap_or_else(|_| "/".into()),
                domain: std::env::var("COOKIE_DOMAIN").unwrap_or_default(),
                secure: std::env::var("COOKIE_SECURE")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(false),
                same_site: std::env::var("COOKIE_SAMESITE").unwrap_or_else(|_| "Strict".into()),
            },
        };

        let upload = UploadConfig {
            path: std::env::var("UPLOAD_PATH").unwrap_or_else(|_| "uploads".into()),
            max_bytes: std::env::var("UPLOAD_MAX_BYTES")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(10 * 1024 * 1024),
        };

        let rate_limit = RateLimitConfig {
            max_attempts: std::env::var("RATE_LIMIT_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(5),
            window_seconds: std::env::var("RATE_LIMIT_WINDOW_SECONDS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(300),
        };

        Ok(Self {
            database_url,
            token,
            upload,
            rate_limit,
        })
    }
}

/// A missing or placeholder signing secret is a fatal startup error,
/// never a request-time one.
fn validate_secret(secret: &str) -> anyhow::Result<()> {
    if secret.is_empty() || secret == PLACEHOLDER_SECRET {
        anyhow::bail!("TOKEN_SECRET is missing or still set to the placeholder value");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_secret() {
        assert!(validate_secret("").is_err());
    }

    #[test]
    fn rejects_placeholder_secret() {
        assert!(validate_secret("change-this-secret-key-in-production").is_err());
    }

    #[test]
    fn accepts_real_secret() {
        assert!(validate_secret("a-long-random-secret").is_ok());
    }
}
