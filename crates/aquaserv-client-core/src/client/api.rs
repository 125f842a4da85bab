use aquaserv_shared::{
    const_config::path::{
        PATH_AUTH_LOGIN, PATH_AUTH_LOGOUT, PATH_AUTH_REGISTER, PATH_USERS_ME_PERMISSIONS,
    },
    log_err_as_warn,
    req_args::{LoginReqArgs, RegisterReqArgs},
    uac::{AuthResponse, EffectivePermissionsResponse, PermissionSet},
};
use secrecy::ExposeSecret as _;
use tracing::{error, info};

use super::{credentials::AuthState, process_response, request::ApiRequest, SessionEvent};
use crate::{Client, ClientError, LoginOutcome};

pub mod admin;

impl Client {
    /// On success the session is stored and the permissions are loaded.
    /// Failing to load permissions does not fail the login
    #[tracing::instrument(skip(self))]
    pub async fn login(&self, args: &LoginReqArgs) -> Result<LoginOutcome, ClientError> {
        let body = serde_json::json!({
            "email": args.email,
            "password": args.password.expose_secret(),
        });
        self.authenticate(ApiRequest::from(PATH_AUTH_LOGIN).json_value(body))
            .await
    }

    /// Creates the account and signs in as the new user
    #[tracing::instrument(skip(self))]
    pub async fn register(&self, args: &RegisterReqArgs) -> Result<LoginOutcome, ClientError> {
        let body = serde_json::json!({
            "name": args.name,
            "email": args.email,
            "password": args.password.expose_secret(),
            "phone": args.phone,
        });
        self.authenticate(ApiRequest::from(PATH_AUTH_REGISTER).json_value(body))
            .await
    }

    // WARNING: `request` contains the password, it must not be logged
    async fn authenticate(&self, request: ApiRequest) -> Result<LoginOutcome, ClientError> {
        self.set_auth_state(AuthState::LoggingIn);
        let auth_response = match self.request_session(request).await {
            Ok(auth_response) => auth_response,
            Err(e) => {
                // Nothing was stored so go back to what we had before
                let mut guard = self.lock_inner();
                guard.auth_state = if guard.credentials.session().is_authenticated() {
                    AuthState::LoggedIn
                } else {
                    AuthState::LoggedOut
                };
                return Err(e);
            }
        };

        let AuthResponse { access_token, user } = auth_response;
        info!(user_id = %user.id, "authenticated");
        {
            let mut guard = self.lock_inner();
            guard.refresh_in_flight = None;
            guard.credentials.establish(access_token, user);
            guard.auth_state = AuthState::LoggedIn;
        }
        self.notify(SessionEvent::LoggedIn);

        Ok(match self.try_resolve_permissions().await {
            Ok(_) => LoginOutcome::Success,
            Err(e) => {
                self.handle_permission_failure(e);
                LoginOutcome::SuccessWithoutPermissions
            }
        })
    }

    async fn request_session(&self, request: ApiRequest) -> Result<AuthResponse, ClientError> {
        let response = self.execute(request).await?;
        process_response(response).await?.json()
    }

    /// Local state is cleared even if the server cannot be told about the
    /// logout. The error is still returned for information
    #[tracing::instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), ClientError> {
        let token = {
            let mut guard = self.lock_inner();
            guard.auth_state = AuthState::LoggingOut;
            let token = guard.credentials.session().access_token.clone();
            guard.clear_session();
            token
        };
        self.notify(SessionEvent::LoggedOut);

        let result = match token {
            // Sent directly as there is no longer a session to recover
            Some(token) => match self
                .dispatch(&PATH_AUTH_LOGOUT.into(), Some(&token))
                .await
            {
                Ok(response) => process_response(response).await.map(|_| ()),
                Err(e) => Err(e),
            },
            None => Ok(()),
        };
        {
            let mut guard = self.lock_inner();
            if guard.auth_state == AuthState::LoggingOut {
                guard.auth_state = AuthState::LoggedOut;
            }
        }
        log_err_as_warn!(&result);
        result
    }

    /// Loads the effective permissions of the signed in user and stores them.
    ///
    /// Never fails, if the permissions cannot be loaded the user is left with
    /// none
    #[tracing::instrument(skip(self))]
    pub async fn resolve_permissions(&self) -> PermissionSet {
        match self.try_resolve_permissions().await {
            Ok(permissions) => permissions,
            Err(e) => {
                self.handle_permission_failure(e);
                PermissionSet::default()
            }
        }
    }

    async fn try_resolve_permissions(&self) -> Result<PermissionSet, ClientError> {
        let user_id = self.user_id();
        let EffectivePermissionsResponse {
            effective_permissions,
        } = self.send_json(PATH_USERS_ME_PERMISSIONS.into()).await?;
        let mut guard = self.lock_inner();
        if guard.credentials.session().user_id == user_id
            && guard.credentials.session().is_authenticated()
        {
            guard
                .credentials
                .set_permissions(effective_permissions.clone());
        } else {
            info!("session changed while loading permissions, not storing them");
        }
        Ok(effective_permissions)
    }

    fn handle_permission_failure(&self, e: ClientError) {
        error!(?e, "failed to load permissions, continuing without any");
        let mut guard = self.lock_inner();
        if guard.credentials.session().is_authenticated() {
            guard.credentials.set_permissions(PermissionSet::default());
        }
    }
}
