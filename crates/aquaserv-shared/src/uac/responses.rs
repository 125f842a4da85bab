use crate::token::AccessToken;

use super::{PermissionOverrides, PermissionSet, UserInfo};

/// Returned by both login and registration
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: AccessToken,
    pub user: UserInfo,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: AccessToken,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct EffectivePermissionsResponse {
    pub effective_permissions: PermissionSet,
}

/// Full breakdown of a single user's permissions for management screens
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserPermissionsResponse {
    pub role_permissions: PermissionSet,
    #[serde(flatten)]
    pub overrides: PermissionOverrides,
    pub effective_permissions: PermissionSet,
}

impl UserPermissionsResponse {
    pub fn new(role_permissions: PermissionSet, overrides: PermissionOverrides) -> Self {
        let effective_permissions = overrides.effective(&role_permissions);
        Self {
            role_permissions,
            overrides,
            effective_permissions,
        }
    }
}

/// Body the backend uses for errors when it has something to say
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ErrorResponse {
    pub message: String,
}
