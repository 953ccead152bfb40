//! Login response interpretation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Field names the target has been seen to put the token under, in the
/// order they are tried.
pub const TOKEN_FIELDS: [&str; 4] = ["token", "accessToken", "access_token", "jwt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    User,
    Anonymous,
}

impl Role {
    /// Parse a role name as the target spells it (`ADMIN`, `ROLE_USER`, ...)
    pub fn parse(raw: &str) -> Option<Self> {
        let upper = raw.trim().to_ascii_uppercase();
        match upper.strip_prefix("ROLE_").unwrap_or(&upper) {
            "ADMIN" => Some(Role::Admin),
            "USER" => Some(Role::User),
            "ANONYMOUS" => Some(Role::Anonymous),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
            Role::Anonymous => "ANONYMOUS",
        };
        f.write_str(name)
    }
}

/// What a successful `authenticate` established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub token: String,
    pub role: Role,
    /// Status of the login response
    pub status: u16,
}

/// Pull a bearer token out of a login response body.
///
/// Tries the known field names first and falls back to the whole body when
/// the target answered with a bare token string.
pub fn extract_token(body: &Value) -> Option<String> {
    if let Some(obj) = body.as_object() {
        return TOKEN_FIELDS
            .iter()
            .filter_map(|field| obj.get(*field))
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|token| !token.is_empty())
            .map(str::to_string);
    }
    body.as_str()
        .map(|raw| raw.trim().trim_matches('"').trim())
        .filter(|raw| !raw.is_empty() && !raw.contains(char::is_whitespace))
        .map(str::to_string)
}

/// Role stated by the server, if it states one
pub fn role_from_body(body: &Value) -> Option<Role> {
    let obj = body.as_object()?;
    if let Some(role) = obj.get("role").and_then(Value::as_str).and_then(Role::parse) {
        return Some(role);
    }
    obj.get("roles")
        .and_then(Value::as_array)
        .and_then(|roles| roles.iter().filter_map(Value::as_str).find_map(Role::parse))
}
