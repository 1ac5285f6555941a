//! Target side of the handshake.
//!
//! [`HandshakeServer`] holds the protocol state of one receive session and is
//! transport agnostic; [`HandshakeServer::router`] exposes it over HTTP.
//! The server is `Listening` until the first `addUser` whose blob decodes,
//! then `Done`. Only that first request fires the completion signal.

use crate::config::SessionConfig;
use crate::identity::Identity;
use crate::info::{AddUserRequest, GetInfoResponse, HandshakeParams, StatusResponse};
use crate::session::ReceiveState;
use crate::store::CredentialStore;
use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use connect_core::error::PairingError;
use connect_core::Credential;
use connect_crypto::BlobCodec;
use connect_discovery::Advertisement;
use std::sync::Arc;
use tokio::sync::{oneshot, watch, Mutex};
use tracing::{debug, info, warn};

/// Phase of the handshake state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerPhase {
    Listening,
    Done,
}

/// Result of an accepted `addUser`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddUserOutcome {
    /// This request completed the pairing.
    Paired(Credential),
    /// A credential was already held; the request was a no-op.
    AlreadyPaired,
}

struct ServerState {
    credential: Option<Credential>,
    completion: Option<oneshot::Sender<Credential>>,
}

/// Handshake state for one receive session.
pub struct HandshakeServer {
    config: SessionConfig,
    identity: Arc<Identity>,
    codec: Arc<dyn BlobCodec>,
    store: Option<Arc<dyn CredentialStore>>,
    advertisement: std::sync::Mutex<Option<Arc<dyn Advertisement>>>,
    session_state: Option<Arc<watch::Sender<ReceiveState>>>,
    state: Mutex<ServerState>,
}

impl HandshakeServer {
    /// Create a server and the receiver of its single completion signal.
    pub fn new(
        config: SessionConfig,
        identity: Arc<Identity>,
        codec: Arc<dyn BlobCodec>,
    ) -> (Self, oneshot::Receiver<Credential>) {
        let (tx, rx) = oneshot::channel();
        let server = Self {
            config,
            identity,
            codec,
            store: None,
            advertisement: std::sync::Mutex::new(None),
            session_state: None,
            state: Mutex::new(ServerState {
                credential: None,
                completion: Some(tx),
            }),
        };
        (server, rx)
    }

    /// Persist the credential here once paired.
    pub fn with_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Session state to move to `Paired` when `addUser` completes.
    pub fn with_session_state(mut self, state: Arc<watch::Sender<ReceiveState>>) -> Self {
        self.session_state = Some(state);
        self
    }

    /// Advertisement to tear down once paired.
    pub fn attach_advertisement(&self, advertisement: Arc<dyn Advertisement>) {
        if let Ok(mut slot) = self.advertisement.lock() {
            *slot = Some(advertisement);
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub async fn phase(&self) -> ServerPhase {
        if self.state.lock().await.credential.is_some() {
            ServerPhase::Done
        } else {
            ServerPhase::Listening
        }
    }

    /// Credential received by this session, if any.
    pub async fn credential(&self) -> Option<Credential> {
        self.state.lock().await.credential.clone()
    }

    /// `getInfo`: read-only status document.
    pub async fn get_info(&self) -> GetInfoResponse {
        let state = self.state.lock().await;
        let active_user = state.credential.as_ref().map(|c| c.username());
        GetInfoResponse::new(&self.config, &self.identity, active_user)
    }

    /// `resetUsers`: same document as `getInfo`.
    ///
    /// A credential is only ever stored by a completed `addUser`, so there is
    /// no unfinalized user to discard and a held credential is kept.
    pub async fn reset_users(&self) -> GetInfoResponse {
        let state = self.state.lock().await;
        match state.credential.as_ref() {
            Some(credential) => debug!(
                "resetUsers after pairing with {}, keeping credential",
                credential.username()
            ),
            None => debug!("resetUsers before pairing, nothing to discard"),
        }
        let active_user = state.credential.as_ref().map(|c| c.username());
        GetInfoResponse::new(&self.config, &self.identity, active_user)
    }

    /// `addUser`: validate, decode and store the credential.
    ///
    /// The state lock is held from the "already paired" check until the
    /// credential is stored in memory and the session is `Paired`, so
    /// concurrent requests cannot both pair. Persistence, advertisement
    /// teardown and the completion signal happen after the lock is released.
    pub async fn add_user(&self, params: &HandshakeParams) -> Result<AddUserOutcome, PairingError> {
        let request = params.add_user_request()?;

        let (credential, completion) = {
            let mut state = self.state.lock().await;
            if state.credential.is_some() {
                debug!("addUser from {} ignored, already paired", request.user_name);
                return Ok(AddUserOutcome::AlreadyPaired);
            }

            let credential = self.decode(&request)?;
            info!(
                "Paired with {} (device {})",
                credential.username(),
                params.device_name.as_deref().unwrap_or("unknown")
            );
            state.credential = Some(credential.clone());
            if let Some(session_state) = &self.session_state {
                session_state.send_replace(ReceiveState::Paired);
            }
            (credential, state.completion.take())
        };

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&credential).await {
                warn!("Failed to persist credential: {}", e);
            }
        }

        let advertisement = self
            .advertisement
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(Arc::clone));
        if let Some(advertisement) = advertisement {
            advertisement.stop();
        }

        if let Some(tx) = completion {
            let _ = tx.send(credential.clone());
        }

        Ok(AddUserOutcome::Paired(credential))
    }

    fn decode(&self, request: &AddUserRequest) -> Result<Credential, PairingError> {
        let client_key = BASE64
            .decode(request.client_key.as_bytes())
            .map_err(|e| PairingError::Decode(format!("clientKey is not base64: {}", e)))?;
        let blob = BASE64
            .decode(request.blob.as_bytes())
            .map_err(|e| PairingError::Decode(format!("blob is not base64: {}", e)))?;

        debug!(
            "Decoding blob for {} ({} bytes)",
            request.user_name,
            blob.len()
        );

        self.codec
            .decrypt(
                self.identity.keys(),
                &client_key,
                self.identity.device_id(),
                &request.user_name,
                &blob,
            )
            .map_err(|e| PairingError::Decode(e.to_string()))
    }

    /// Dispatch one request by its `action` parameter.
    pub async fn handle(&self, params: HandshakeParams) -> Response {
        let action = params.action.clone().unwrap_or_default();
        debug!("Handshake request: {}", action);

        match action.as_str() {
            "getInfo" => Json(self.get_info().await).into_response(),
            "resetUsers" => Json(self.reset_users().await).into_response(),
            "addUser" => match self.add_user(&params).await {
                Ok(_) => Json(StatusResponse::ok()).into_response(),
                Err(e) => error_response(&e),
            },
            other => error_response(&PairingError::UnknownAction(other.to_string())),
        }
    }

    /// HTTP routes for this server, mounted at `path`.
    pub fn router(self: Arc<Self>, path: &str) -> Router {
        Router::new()
            .route(path, get(handle_get).post(handle_post))
            .with_state(self)
    }
}

fn error_response(err: &PairingError) -> Response {
    warn!("Handshake request rejected: {}", err);
    match err {
        PairingError::Decode(_) => (StatusCode::FORBIDDEN, Json(StatusResponse::login_failed())),
        _ => (StatusCode::BAD_REQUEST, Json(StatusResponse::bad_request())),
    }
    .into_response()
}

async fn handle_get(
    State(server): State<Arc<HandshakeServer>>,
    Query(params): Query<HandshakeParams>,
) -> Response {
    server.handle(params).await
}

async fn handle_post(
    State(server): State<Arc<HandshakeServer>>,
    Query(query): Query<HandshakeParams>,
    form: Option<Form<HandshakeParams>>,
) -> Response {
    let params = match form {
        Some(Form(form)) => query.merge(form),
        None => query,
    };
    server.handle(params).await
}
