use std::{fmt::Debug, sync::Arc};

use aquaserv_shared::{
    const_config::storage::{
        STORAGE_ALL_KEYS, STORAGE_KEY_ACCESS_TOKEN, STORAGE_KEY_PERMISSIONS, STORAGE_KEY_USER,
        STORAGE_KEY_USER_ID,
    },
    id::UserId,
    token::AccessToken,
    uac::{PermissionSet, UserInfo},
};
use tracing::{info, instrument};

use crate::SessionStorage;

/// Snapshot of what is known about the signed in user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<AccessToken>,
    /// Kept separately from `user` as it is what a new access token is
    /// requested with
    pub user_id: Option<UserId>,
    pub user: Option<UserInfo>,
    pub permissions: PermissionSet,
}

/// Where the client is in the login lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    LoggedOut,
    LoggingIn,
    LoggedIn,
    LoggingOut,
    /// Logged out because the session could not be recovered. Treated the same
    /// as [`AuthState::LoggedOut`] except it lets the UI explain why
    SessionExpired,
}

/// In memory session mirrored to [`SessionStorage`] on every change
pub(crate) struct CredentialStore {
    session: Session,
    storage: Arc<dyn SessionStorage>,
    /// Incremented every time the access token changes
    epoch: u64,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}

impl AuthState {
    pub fn is_logged_out(&self) -> bool {
        matches!(self, Self::LoggedOut | Self::SessionExpired)
    }
}

impl CredentialStore {
    /// Restores whatever was persisted. Values that fail to parse are dropped
    #[instrument(skip(storage))]
    pub(crate) fn load(storage: Arc<dyn SessionStorage>) -> Self {
        let session = Session {
            access_token: read_value(storage.as_ref(), STORAGE_KEY_ACCESS_TOKEN),
            user_id: read_value(storage.as_ref(), STORAGE_KEY_USER_ID),
            user: read_value(storage.as_ref(), STORAGE_KEY_USER),
            permissions: read_value(storage.as_ref(), STORAGE_KEY_PERMISSIONS).unwrap_or_default(),
        };
        info!(
            is_authenticated = session.is_authenticated(),
            has_user_id = session.user_id.is_some(),
            "session restored from storage"
        );
        Self {
            session,
            storage,
            epoch: 0,
        }
    }

    pub(crate) fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Replaces the whole session after a successful login or registration.
    /// Permissions start empty until they are resolved
    pub(crate) fn establish(&mut self, access_token: AccessToken, user: UserInfo) {
        self.epoch += 1;
        self.write(STORAGE_KEY_ACCESS_TOKEN, &access_token);
        self.write(STORAGE_KEY_USER_ID, &user.id);
        self.write(STORAGE_KEY_USER, &user);
        self.write(STORAGE_KEY_PERMISSIONS, &PermissionSet::default());
        self.session = Session {
            access_token: Some(access_token),
            user_id: Some(user.id.clone()),
            user: Some(user),
            permissions: PermissionSet::default(),
        };
    }

    pub(crate) fn replace_access_token(&mut self, access_token: AccessToken) {
        self.epoch += 1;
        self.write(STORAGE_KEY_ACCESS_TOKEN, &access_token);
        self.session.access_token = Some(access_token);
    }

    pub(crate) fn set_permissions(&mut self, permissions: PermissionSet) {
        self.write(STORAGE_KEY_PERMISSIONS, &permissions);
        self.session.permissions = permissions;
    }

    /// Removes every persisted key together
    pub(crate) fn clear(&mut self) {
        self.epoch += 1;
        for key in STORAGE_ALL_KEYS {
            if let Err(e) = self.storage.remove(key) {
                tracing::error!(?e, key, "failed to remove value from storage");
            }
        }
        self.session = Session::default();
    }

    fn write<T: serde::Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(text) => {
                if let Err(e) = self.storage.set(key, &text) {
                    tracing::error!(?e, key, "failed to write value to storage");
                }
            }
            Err(e) => tracing::error!(?e, key, "failed to serialize value for storage"),
        }
    }
}

fn read_value<T: serde::de::DeserializeOwned>(storage: &dyn SessionStorage, key: &str) -> Option<T> {
    let text = match storage.get(key) {
        Ok(text) => text?,
        Err(e) => {
            tracing::warn!(?e, key, "failed to read from session storage");
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(?e, key, "discarding stored value that failed to parse");
            None
        }
    }
}

impl Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("session", &self.session)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}
