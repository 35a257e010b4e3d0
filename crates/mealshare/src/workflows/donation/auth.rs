use std::fmt;
use std::str::FromStr;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::listings::UserId;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_NAME_HEADER: &str = "x-user-name";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Donor,
    Receiver,
    Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Donor => "donor",
            Role::Receiver => "receiver",
            Role::Admin => "admin",
        }
    }

    pub const fn can_publish(self) -> bool {
        matches!(self, Role::Donor)
    }

    pub const fn can_claim(self) -> bool {
        matches!(self, Role::Receiver)
    }

    pub const fn can_verify_pickup(self) -> bool {
        matches!(self, Role::Donor)
    }

    pub const fn can_run_sweep(self) -> bool {
        matches!(self, Role::Admin)
    }

    pub const fn can_view_analytics(self) -> bool {
        matches!(self, Role::Donor)
    }

    pub const fn can_browse(self) -> bool {
        true
    }
}

impl FromStr for Role {
    type Err = AuthRejection;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "donor" => Ok(Role::Donor),
            "receiver" => Ok(Role::Receiver),
            "admin" => Ok(Role::Admin),
            other => Err(AuthRejection::UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Authenticated identity forwarded by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user: UserId,
    pub role: Role,
    pub name: Option<String>,
}

impl Caller {
    pub fn new(user: impl Into<String>, role: Role) -> Self {
        Self {
            user: UserId(user.into()),
            role,
            name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AuthRejection> {
        let user = header_value(headers, USER_ID_HEADER)
            .ok_or(AuthRejection::MissingHeader(USER_ID_HEADER))?;
        let role = header_value(headers, USER_ROLE_HEADER)
            .ok_or(AuthRejection::MissingHeader(USER_ROLE_HEADER))?
            .parse::<Role>()?;
        let name = header_value(headers, USER_NAME_HEADER);
        Ok(Self {
            user: UserId(user),
            role,
            name,
        })
    }
}

fn header_value(headers: &HeaderMap, key: &str) -> Option<String> {
    headers
        .get(key)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Caller::from_headers(&parts.headers)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthRejection {
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    #[error("unknown role `{0}`")]
    UnknownRole(String),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.to_string() });
        (StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response()
    }
}
