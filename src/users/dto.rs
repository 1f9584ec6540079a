use serde::Deserialize;

/// Profile update; both fields optional, only the account holder may apply.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}
