//! Runtime construction, wiring and teardown.

use std::path::PathBuf;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, info, warn};

use fleetdesk_config::{Config, ConfigValidator};
use fleetdesk_core::Subscription;
use fleetdesk_gateway::RequestGateway;
use fleetdesk_protocols::error::TransferError;
use fleetdesk_protocols::{CredentialSource, SessionInvalidator};
use fleetdesk_realtime::{ConnectionManager, Connector, ReconnectPolicy, WebSocketConnector};
use fleetdesk_session::{AuthApi, FileTokenStore, HttpAuthApi, SessionManager, StoreKeys, TokenStore};
use fleetdesk_transfer::{
    TransferKind, TransferQueue, TransferRequest, TransferTask, download_to_path, upload_from_path,
};

use crate::error::RuntimeError;

/// The pluggable edges of a runtime: where the token lives, how the auth
/// endpoints are reached and which transport carries realtime traffic.
pub struct RuntimeParts {
    pub store: Arc<dyn TokenStore>,
    pub auth: Arc<dyn AuthApi>,
    pub connector: Arc<dyn Connector>,
}

impl RuntimeParts {
    /// File-backed store, HTTP auth and WebSocket transport.
    pub fn from_config(config: &Config) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    fn with_client(config: &Config, client: reqwest::Client) -> Self {
        Self {
            store: Arc::new(FileTokenStore::new(
                config.storage.resolved_dir(),
                StoreKeys::from(&config.storage),
            )),
            auth: Arc::new(HttpAuthApi::new(&config.api, &config.request).with_client(client)),
            connector: Arc::new(WebSocketConnector::new()),
        }
    }
}

/// The process-wide session runtime.
///
/// The session manager is the single owner of the credential. The gateway
/// and the realtime connection read it through [`CredentialSource`], and only
/// the gateway may clear it, through [`SessionInvalidator`].
pub struct Runtime {
    config: Config,
    session: Arc<SessionManager>,
    gateway: Arc<RequestGateway>,
    realtime: Arc<ConnectionManager>,
    transfers: TransferQueue,
    links: Mutex<Vec<Subscription>>,
}

impl Runtime {
    /// Validate `config`, build the production parts and restore any
    /// persisted session.
    pub async fn start(config: Config) -> Result<Self, RuntimeError> {
        Self::validate(&config)?;
        let client = reqwest::Client::new();
        let parts = RuntimeParts::with_client(&config, client.clone());
        Ok(Self::assemble(config, parts, Some(client)).await)
    }

    /// Like [`start`](Self::start), with caller-supplied parts.
    pub async fn with_parts(config: Config, parts: RuntimeParts) -> Result<Self, RuntimeError> {
        Self::validate(&config)?;
        Ok(Self::assemble(config, parts, None).await)
    }

    fn validate(config: &Config) -> Result<(), RuntimeError> {
        let warnings = ConfigValidator::validate(config)?.into_result()?;
        for warning in warnings {
            warn!("Config {}: {}", warning.path, warning.message);
        }
        Ok(())
    }

    async fn assemble(config: Config, parts: RuntimeParts, client: Option<reqwest::Client>) -> Self {
        let session = Arc::new(SessionManager::new(parts.store, parts.auth));
        let credentials: Arc<dyn CredentialSource> = session.clone();
        let invalidator: Arc<dyn SessionInvalidator> = session.clone();

        let mut gateway =
            RequestGateway::new(&config.api, &config.request, credentials.clone(), invalidator);
        if let Some(client) = client {
            gateway = gateway.with_client(client);
        }

        let realtime = Arc::new(ConnectionManager::new(
            config.realtime.url.clone(),
            ReconnectPolicy::from(&config.realtime),
            parts.connector,
            credentials,
        ));
        let transfers = TransferQueue::from_config(&config.transfer);

        let mut links = Vec::new();
        if config.realtime.auto_connect {
            links.push(link_realtime(&session, &realtime));
        }

        let snapshot = session.restore().await;
        info!(
            "Runtime started (session {:?}, transfer concurrency {})",
            snapshot.status,
            transfers.concurrency()
        );

        Self {
            config,
            session,
            gateway: Arc::new(gateway),
            realtime,
            transfers,
            links: Mutex::new(links),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn gateway(&self) -> &Arc<RequestGateway> {
        &self.gateway
    }

    pub fn realtime(&self) -> &Arc<ConnectionManager> {
        &self.realtime
    }

    pub fn transfers(&self) -> &TransferQueue {
        &self.transfers
    }

    /// Queue a download of `endpoint` into `dest`.
    pub fn download(
        &self,
        id: impl Into<String>,
        endpoint: impl Into<String>,
        dest: impl Into<PathBuf>,
    ) -> Result<TransferTask, TransferError> {
        let endpoint = endpoint.into();
        let dest = dest.into();
        let request = TransferRequest::new(id, TransferKind::Download)
            .with_descriptor(json!({ "endpoint": endpoint, "path": dest }));

        let gateway = Arc::clone(&self.gateway);
        self.transfers.enqueue(request, move |ctx| async move {
            download_to_path(&gateway, &endpoint, &dest, &ctx).await.map(|_| ())
        })
    }

    /// Queue an upload of the file at `source` to `endpoint`.
    pub fn upload(
        &self,
        id: impl Into<String>,
        endpoint: impl Into<String>,
        source: impl Into<PathBuf>,
    ) -> Result<TransferTask, TransferError> {
        let endpoint = endpoint.into();
        let source = source.into();
        let request = TransferRequest::new(id, TransferKind::Upload)
            .with_descriptor(json!({ "endpoint": endpoint, "path": source }));

        let gateway = Arc::clone(&self.gateway);
        self.transfers.enqueue(request, move |ctx| async move {
            upload_from_path(&gateway, &endpoint, &source, &ctx).await.map(|_| ())
        })
    }

    /// Disconnect realtime and drop the session-to-realtime link. Persisted
    /// credentials stay in place, so the next start restores them. Safe to
    /// call more than once.
    pub fn shutdown(&self) {
        let links: Vec<Subscription> = self.links.lock().drain(..).collect();
        for link in links {
            link.dispose();
        }
        self.realtime.disconnect();
        info!("Runtime shut down");
    }
}

/// Connect when the session becomes authenticated, disconnect when it is
/// cleared. Holds the connection weakly since the connection itself holds
/// the session.
fn link_realtime(session: &SessionManager, realtime: &Arc<ConnectionManager>) -> Subscription {
    let realtime: Weak<ConnectionManager> = Arc::downgrade(realtime);
    session.on_change(move |change| {
        let Some(realtime) = realtime.upgrade() else {
            return;
        };
        if change.became_authenticated() {
            debug!("Session authenticated, connecting realtime");
            realtime.connect();
        } else if change.became_unauthenticated() {
            debug!("Session cleared, disconnecting realtime");
            realtime.disconnect();
        }
    })
}
