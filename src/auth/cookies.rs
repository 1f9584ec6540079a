//! Set-Cookie header rendering for the auth token pair. The refresh token
//! rides in a sibling cookie named `<name>_refresh`.

use crate::config::CookieConfig;

pub fn refresh_cookie_name(cfg: &CookieConfig) -> String {
    format!("{}_refresh", cfg.name)
}

/// Renders a Set-Cookie value carrying `token` for `max_age` seconds.
/// HttpOnly is unconditional; the client never needs script access.
pub fn set_cookie(cfg: &CookieConfig, name: &str, token: &str, max_age: i64) -> String {
    let mut cookie = format!(
        "{name}={token}; Max-Age={max_age}; Path={}; SameSite={}; HttpOnly",
        cfg.path, cfg.same_site
    );
    if cfg.secure {
        cookie.push_str("; Secure");
    }
    if !cfg.domain.is_empty() {
        cookie.push_str(&format!("; Domain={}", cfg.domain));
    }
    cookie
}

/// A cookie that immediately expires, used on logout.
pub fn clear_cookie(cfg: &CookieConfig, name: &str) -> String {
    set_cookie(cfg, name, "", 0)
}
