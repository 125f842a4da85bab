use aquaserv_shared::{
    const_config::path::user_permissions_path,
    id::UserId,
    uac::{PermissionKey, PermissionOverrides, UserPermissionsResponse},
};
use tracing::info;

use crate::{ApiRequest, Client, ClientError};

impl Client {
    #[tracing::instrument(skip(self))]
    pub async fn get_user_permissions(
        &self,
        user_id: &UserId,
    ) -> Result<UserPermissionsResponse, ClientError> {
        self.send_json(ApiRequest::get(user_permissions_path(user_id)))
            .await
    }

    /// Replaces the overrides stored for the user and returns the resulting
    /// permissions
    #[tracing::instrument(skip(self))]
    pub async fn update_user_permissions(
        &self,
        user_id: &UserId,
        overrides: &PermissionOverrides,
    ) -> Result<UserPermissionsResponse, ClientError> {
        let request = ApiRequest::put(user_permissions_path(user_id)).json(overrides)?;
        let result: UserPermissionsResponse = self.send_json(request).await?;
        if self.user_id().as_ref() == Some(user_id) {
            info!("permissions of the signed in user changed, reloading");
            self.resolve_permissions().await;
        }
        Ok(result)
    }

    /// Flips whether `key` is effective for the user, touching only the
    /// overrides
    #[tracing::instrument(skip(self))]
    pub async fn toggle_user_permission(
        &self,
        user_id: &UserId,
        key: &PermissionKey,
    ) -> Result<UserPermissionsResponse, ClientError> {
        let UserPermissionsResponse {
            role_permissions,
            mut overrides,
            ..
        } = self.get_user_permissions(user_id).await?;
        let is_now_effective = overrides.toggle(key, &role_permissions);
        info!(is_now_effective);
        self.update_user_permissions(user_id, &overrides).await
    }
}
