//! Pairing session orchestrators.
//!
//! [`ReceiveSession`] owns the HTTP listener and the advertisement for one
//! receive attempt and resolves to the first credential pushed to it.
//! [`PushSession`] feeds a [`DeviceRegistry`] from a [`Locator`] and pushes a
//! held credential to a chosen device.

use crate::client::HandshakeClient;
use crate::config::SessionConfig;
use crate::identity::Identity;
use crate::server::HandshakeServer;
use crate::store::{CredentialStore, FileCredentialStore};
use connect_core::error::{DiscoveryError, Error, HandshakeError, PairingError, Result};
use connect_core::{Credential, DeviceEntry};
use connect_crypto::{BlobCodec, SealedBlobCodec};
use connect_discovery::{
    AdvertiseHandle, Advertiser, DeviceRegistry, Locator, PATH_ATTRIBUTE, SERVICE_TYPE,
    VERSION_ATTRIBUTE,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Receive flow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveState {
    Idle,
    Advertising,
    AwaitingHandshake,
    Paired,
    Failed,
}

/// Push flow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushState {
    Idle,
    Discovering,
    Connecting,
    Paired,
    Failed,
}

/// Receive a credential from a peer.
pub struct ReceiveSession {
    config: SessionConfig,
    codec: Arc<dyn BlobCodec>,
    store: Option<Arc<dyn CredentialStore>>,
    advertiser: Advertiser,
}

impl ReceiveSession {
    /// Create a session. A configured credential path enables file persistence.
    pub fn new(config: SessionConfig) -> Self {
        let store = config
            .credential_path
            .clone()
            .map(|path| Arc::new(FileCredentialStore::new(path)) as Arc<dyn CredentialStore>);
        Self {
            config,
            codec: Arc::new(SealedBlobCodec),
            store,
            advertiser: Advertiser::new(),
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn BlobCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Bind the listener, start serving and advertise.
    ///
    /// Fails with `Error::Bind` if the port is taken and with a discovery
    /// error if the advertisement cannot be published; in both cases
    /// nothing is left running.
    pub async fn start(self) -> Result<ReceiveHandle> {
        let (state, _) = watch::channel(ReceiveState::Idle);
        let state = Arc::new(state);

        let identity = Arc::new(Identity::generate(&self.config));
        info!(
            "Receive session for {} ({})",
            identity.device_name(),
            identity.device_id()
        );

        let (server, completion) =
            HandshakeServer::new(self.config.clone(), Arc::clone(&identity), self.codec);
        let server = server.with_session_state(Arc::clone(&state));
        let server = Arc::new(match self.store {
            Some(store) => server.with_store(store),
            None => server,
        });

        let addr = self.config.listen_addr();
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(source) => {
                state.send_replace(ReceiveState::Failed);
                return Err(Error::Bind { addr, source });
            }
        };
        let local_addr = listener
            .local_addr()
            .map_err(|source| Error::Bind { addr, source })?;

        let shutdown = Arc::new(Notify::new());
        let router = Arc::clone(&server).router(&self.config.path);
        let serve_shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { serve_shutdown.notified().await })
                .await;
            if let Err(e) = result {
                warn!("Handshake listener stopped with error: {}", e);
            }
            debug!("Handshake listener on {} closed", local_addr);
        });
        info!("Handshake listener on {}{}", local_addr, self.config.path);

        let advertisement = if self.config.advertise {
            state.send_replace(ReceiveState::Advertising);
            let attributes = [
                (VERSION_ATTRIBUTE, self.config.version.as_str()),
                (PATH_ATTRIBUTE, self.config.path.as_str()),
            ];
            match self
                .advertiser
                .start(&self.config.device_name, local_addr.port(), &attributes)
            {
                Ok(handle) => {
                    server.attach_advertisement(Arc::new(handle.clone()));
                    Some(handle)
                }
                Err(e) => {
                    shutdown.notify_one();
                    state.send_replace(ReceiveState::Failed);
                    return Err(e);
                }
            }
        } else {
            None
        };

        state.send_replace(ReceiveState::AwaitingHandshake);

        Ok(ReceiveHandle {
            server,
            completion: Some(completion),
            shutdown,
            advertisement,
            state,
            local_addr,
            stopped: AtomicBool::new(false),
        })
    }

    /// Start and wait for the first credential without a deadline.
    pub async fn run(self) -> Result<Credential> {
        let mut handle = self.start().await?;
        handle.wait().await
    }
}

/// A running receive session.
pub struct ReceiveHandle {
    server: Arc<HandshakeServer>,
    completion: Option<oneshot::Receiver<Credential>>,
    shutdown: Arc<Notify>,
    advertisement: Option<AdvertiseHandle>,
    state: Arc<watch::Sender<ReceiveState>>,
    local_addr: SocketAddr,
    stopped: AtomicBool,
}

impl ReceiveHandle {
    /// Address the handshake listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ReceiveState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ReceiveState> {
        self.state.subscribe()
    }

    pub fn server(&self) -> &Arc<HandshakeServer> {
        &self.server
    }

    /// Wait for the completion signal, then tear the session down.
    pub async fn wait(&mut self) -> Result<Credential> {
        let completion = self.completion.take().ok_or_else(|| {
            PairingError::InvalidState("receive session already awaited".to_string())
        })?;

        match completion.await {
            Ok(credential) => {
                self.stop();
                Ok(credential)
            }
            Err(_) => {
                self.stop();
                Err(PairingError::InvalidState("session ended before pairing".to_string()).into())
            }
        }
    }

    /// [`wait`](Self::wait) with a deadline; on expiry the session is stopped.
    ///
    /// A credential stored just as the deadline passed is still returned.
    pub async fn wait_timeout(&mut self, timeout: Duration) -> Result<Credential> {
        let waited = tokio::time::timeout(timeout, self.wait()).await;
        match waited {
            Ok(result) => result,
            Err(_) => {
                self.stop();
                if let Some(credential) = self.server.credential().await {
                    debug!("Paired with {} at the deadline", credential.username());
                    return Ok(credential);
                }
                warn!("No pairing request within {:?}", timeout);
                Err(Error::Timeout)
            }
        }
    }

    /// Stop advertising and close the listener.
    ///
    /// Idempotent and does not wait for in-flight requests. A session that
    /// has not paired is marked `Failed`.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(handle) = &self.advertisement {
            handle.stop();
        }
        self.shutdown.notify_one();
        self.state.send_if_modified(|state| {
            if *state == ReceiveState::Paired {
                false
            } else {
                *state = ReceiveState::Failed;
                true
            }
        });
        debug!("Receive session on {} stopped", self.local_addr);
    }
}

impl Drop for ReceiveHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Push a held credential to a discovered device.
pub struct PushSession {
    credential: Credential,
    identity: Arc<Identity>,
    client: HandshakeClient,
    registry: DeviceRegistry,
    locator: Option<Arc<dyn Locator>>,
    lookup_task: Option<JoinHandle<()>>,
    state: watch::Sender<PushState>,
}

impl PushSession {
    /// Fails only if the HTTP client cannot be set up.
    pub fn new(config: SessionConfig, credential: Credential) -> Result<Self> {
        let identity = Arc::new(Identity::generate(&config));
        let client = HandshakeClient::new(Arc::clone(&identity), Arc::new(SealedBlobCodec))?;
        let (state, _) = watch::channel(PushState::Idle);
        Ok(Self {
            credential,
            identity,
            client,
            registry: DeviceRegistry::new(),
            locator: None,
            lookup_task: None,
            state,
        })
    }

    /// Build a session around the credential held by `store`.
    pub async fn from_store(config: SessionConfig, store: &dyn CredentialStore) -> Result<Self> {
        let credential = store.load().await?;
        info!("Loaded credential for {}", credential.username());
        Self::new(config, credential)
    }

    pub fn with_codec(mut self, codec: Arc<dyn BlobCodec>) -> Result<Self> {
        self.client = HandshakeClient::new(Arc::clone(&self.identity), codec)?;
        Ok(self)
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn state(&self) -> PushState {
        *self.state.borrow()
    }

    /// Start looking up peers; entries flow into [`registry`](Self::registry).
    pub fn start_discovery(&mut self, locator: Arc<dyn Locator>) -> Result<()> {
        self.stop_discovery();

        let stream = match locator.lookup(SERVICE_TYPE) {
            Ok(stream) => stream,
            Err(e) => {
                self.state.send_replace(PushState::Failed);
                return Err(e);
            }
        };

        let registry = self.registry.clone();
        self.lookup_task = Some(tokio::spawn(async move {
            registry.consume(stream).await;
        }));
        self.locator = Some(locator);
        self.state.send_replace(PushState::Discovering);
        debug!("Discovery started for {}", SERVICE_TYPE);
        Ok(())
    }

    /// Wait until at least one device is known.
    ///
    /// On expiry discovery is stopped and the session is marked `Failed`.
    pub async fn wait_for_device(&mut self, timeout: Duration) -> Result<DeviceEntry> {
        self.registry.wait_for(1, timeout).await;
        match self.registry.snapshot().await.into_iter().next() {
            Some(entry) => Ok(entry),
            None => {
                warn!("No device found within {:?}", timeout);
                self.stop_discovery();
                self.state.send_replace(PushState::Failed);
                Err(Error::Timeout)
            }
        }
    }

    /// Stop the running lookup, if any. Registry contents are kept.
    pub fn stop_discovery(&mut self) {
        if let Some(locator) = self.locator.take() {
            locator.stop();
        }
        if let Some(task) = self.lookup_task.take() {
            task.abort();
        }
    }

    /// Run the handshake against one device.
    pub async fn connect(&self, device: &DeviceEntry) -> std::result::Result<(), HandshakeError> {
        self.state.send_replace(PushState::Connecting);
        info!("Connecting to {} at {}", device.name, device.address);

        match self.client.pair(&device.address, &self.credential).await {
            Ok(()) => {
                self.state.send_replace(PushState::Paired);
                Ok(())
            }
            Err(e) => {
                warn!("Pairing with {} failed: {}", device.name, e);
                self.state.send_replace(PushState::Failed);
                Err(e)
            }
        }
    }

    /// Try every known device in arrival order until one accepts.
    ///
    /// Returns the device that accepted the credential.
    pub async fn connect_first(&self) -> Result<DeviceEntry> {
        let devices = self.registry.snapshot().await;
        let mut last_error = None;

        for device in devices {
            match self.connect(&device).await {
                Ok(()) => return Ok(device),
                Err(e) => last_error = Some(e),
            }
        }

        self.state.send_replace(PushState::Failed);
        Err(match last_error {
            Some(e) => e.into(),
            None => DiscoveryError::NoDevicesFound.into(),
        })
    }
}

impl Drop for PushSession {
    fn drop(&mut self) {
        self.stop_discovery();
    }
}
