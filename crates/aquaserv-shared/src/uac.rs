//! Shared items related to user account control

mod permissions;
mod responses;
mod user;

pub use permissions::{PermissionKey, PermissionOverrides, PermissionSet};
pub use responses::{
    AuthResponse, EffectivePermissionsResponse, ErrorResponse, RefreshResponse,
    UserPermissionsResponse,
};
pub use user::{DisplayName, UserInfo};
