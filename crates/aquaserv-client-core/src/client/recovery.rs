//! Recovers from an expired access token. A call that gets a 401 asks for a new
//! token and is replayed once. Calls that hit a 401 while a refresh is running
//! wait on that same refresh instead of starting another

use aquaserv_shared::{
    const_config::path::PATH_AUTH_REFRESH, req_args::RefreshReqArgs, token::AccessToken,
    uac::RefreshResponse,
};
use futures::future::{BoxFuture, FutureExt as _, Shared};
use reqwest::StatusCode;
use tracing::{info, instrument, warn};

use super::{
    credentials::AuthState,
    process_response,
    request::{ApiRequest, PendingCall},
    transmit, Client, SessionEvent, WeakClient,
};
use crate::ClientError;

/// Handle on a refresh that any number of callers can await. The client keeps a
/// copy so a refresh abandoned by its callers is finished by the next call
pub(crate) type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

#[derive(Debug, Clone)]
pub(crate) enum RefreshOutcome {
    Refreshed(AccessToken),
    Expired,
}

/// What to do about a 401, decided while holding the lock
enum Recovery {
    /// The token changed since the call was sent, use whatever is there now
    TokenChanged(Option<AccessToken>),
    Await(SharedRefresh),
    NoUserId,
}

impl Client {
    /// Sends the request and handles a 401 by recovering the session and
    /// replaying the request once. Other statuses are returned as is
    #[instrument(skip(self))]
    pub(crate) async fn execute(
        &self,
        request: ApiRequest,
    ) -> Result<reqwest::Response, ClientError> {
        let mut call = PendingCall::new(request);
        if !call.request().is_auth_exempt() {
            self.finish_pending_refresh().await?;
        }
        loop {
            let (epoch, token) = self.current_credentials();
            let response = self.dispatch(call.request(), token.as_ref()).await?;
            if response.status() != StatusCode::UNAUTHORIZED || call.request().is_auth_exempt() {
                return Ok(response);
            }
            if call.is_retried() {
                warn!("still unauthorized after recovering the session");
                self.expire_session();
                return Err(ClientError::SessionExpired);
            }
            call.mark_retried();
            self.recover_session(epoch).await?;
        }
    }

    /// Waits on a refresh that is still outstanding (possibly abandoned by the
    /// calls that started it) so the next request goes out with its result
    async fn finish_pending_refresh(&self) -> Result<(), ClientError> {
        let in_flight = self.lock_inner().refresh_in_flight.clone();
        let Some(refresh) = in_flight else {
            return Ok(());
        };
        info!("waiting on outstanding refresh before sending");
        match refresh.await {
            RefreshOutcome::Refreshed(_) => Ok(()),
            RefreshOutcome::Expired if self.is_authenticated() => Ok(()),
            RefreshOutcome::Expired => Err(ClientError::SessionExpired),
        }
    }

    /// `call_epoch` is the epoch of the token the failed call was sent with
    #[instrument(skip(self))]
    async fn recover_session(&self, call_epoch: u64) -> Result<AccessToken, ClientError> {
        let recovery = {
            let mut guard = self.lock_inner();
            if guard.credentials.epoch() != call_epoch {
                Recovery::TokenChanged(guard.credentials.session().access_token.clone())
            } else if let Some(in_flight) = guard.refresh_in_flight.as_ref() {
                Recovery::Await(in_flight.clone())
            } else if let Some(user_id) = guard.credentials.session().user_id.clone() {
                let request =
                    ApiRequest::from(PATH_AUTH_REFRESH).json(&RefreshReqArgs { user_id })?;
                let url = format!("{}{}", guard.server_address, request.path());
                let refresh = refresh_access_token(self.downgrade(), request, url, call_epoch)
                    .boxed()
                    .shared();
                guard.refresh_in_flight = Some(refresh.clone());
                Recovery::Await(refresh)
            } else {
                Recovery::NoUserId
            }
        };

        match recovery {
            Recovery::TokenChanged(Some(token)) => Ok(token),
            Recovery::TokenChanged(None) => Err(ClientError::SessionExpired),
            Recovery::NoUserId => {
                warn!("no user id stored, unable to refresh the session");
                self.expire_session();
                Err(ClientError::SessionExpired)
            }
            Recovery::Await(refresh) => match refresh.await {
                RefreshOutcome::Refreshed(token) => Ok(token),
                RefreshOutcome::Expired => Err(ClientError::SessionExpired),
            },
        }
    }

    /// Stores the new token, or ends the session if the refresh failed. Nothing
    /// is applied if the session is no longer the one the refresh was started
    /// for
    fn apply_refresh(
        &self,
        result: Result<RefreshResponse, ClientError>,
        started_epoch: u64,
    ) -> RefreshOutcome {
        let (outcome, event) = {
            let mut guard = self.lock_inner();
            if guard.credentials.epoch() != started_epoch {
                info!("session changed while refreshing, discarding result");
                return RefreshOutcome::Expired;
            }
            guard.refresh_in_flight = None;
            match result {
                Ok(RefreshResponse { access_token }) => {
                    guard.credentials.replace_access_token(access_token.clone());
                    (
                        RefreshOutcome::Refreshed(access_token),
                        SessionEvent::TokenRefreshed,
                    )
                }
                Err(e) => {
                    warn!(?e, "failed to refresh the session");
                    guard.clear_session();
                    guard.auth_state = AuthState::SessionExpired;
                    (RefreshOutcome::Expired, SessionEvent::SessionExpired)
                }
            }
        };
        self.notify(event);
        outcome
    }

    /// Forced logout, the UI is told via [`SessionEvent::SessionExpired`]
    #[instrument(skip(self))]
    pub(crate) fn expire_session(&self) {
        {
            let mut guard = self.lock_inner();
            guard.clear_session();
            guard.auth_state = AuthState::SessionExpired;
        }
        self.notify(SessionEvent::SessionExpired);
    }
}

/// Requests a new access token. The refresh credential is the session cookie
/// held by the http client so the bearer token is not sent
///
/// Only a weak handle is held while the request is out. The future is stored in
/// the client it refreshes and would otherwise keep it alive
#[instrument(skip(client, request, url))]
async fn refresh_access_token(
    client: WeakClient,
    request: ApiRequest,
    url: String,
    started_epoch: u64,
) -> RefreshOutcome {
    let result: Result<RefreshResponse, ClientError> = async {
        let response = transmit(&client.api_client, url, &request, None).await?;
        process_response(response).await?.json()
    }
    .await;
    match client.upgrade() {
        Some(client) => client.apply_refresh(result, started_epoch),
        None => {
            info!("client dropped while refreshing");
            RefreshOutcome::Expired
        }
    }
}
