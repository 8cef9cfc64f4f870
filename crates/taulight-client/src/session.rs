//! Session manager: the set of live clients keyed by uuid.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use taulight_core::{Connection, Dispatcher, StreamConnection, handshake};
use taulight_proto::Link;
use uuid::Uuid;

use crate::{
    ClientError, ClientInfo, MemberClient, Notifier, SessionConfig, chains::push_factory,
};

/// Owns every client connection of the process.
///
/// Records are created by [`connect`](Self::connect) once the handshake
/// succeeded and removed by [`disconnect`](Self::disconnect),
/// [`prune`](Self::prune) or [`shutdown`](Self::shutdown).
pub struct SessionManager {
    config: Arc<SessionConfig>,
    notifier: Arc<dyn Notifier>,
    clients: Mutex<HashMap<Uuid, Arc<MemberClient>>>,
}

impl SessionManager {
    /// Empty manager. Forwarded messages of every client go to `notifier`.
    pub fn new(config: SessionConfig, notifier: impl Notifier) -> Self {
        Self {
            config: Arc::new(config),
            notifier: Arc::new(notifier),
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Settings applied to new connections.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Parse `link` and [`connect_link`](Self::connect_link).
    ///
    /// # Errors
    ///
    /// - `ClientError::Link` if `link` is not a valid descriptor
    /// - see [`connect_link`](Self::connect_link)
    pub async fn connect(&self, id: Uuid, link: &str) -> Result<Arc<MemberClient>, ClientError> {
        let link: Link = link.parse()?;
        self.connect_link(id, link).await
    }

    /// Open a connection, handshake, start its dispatcher and register the
    /// client under `id`. A previous client with the same id is replaced and
    /// closed. On failure nothing is registered.
    ///
    /// # Errors
    ///
    /// - `ClientError::Connection` if the hub is unreachable or rejects the
    ///   handshake
    pub async fn connect_link(&self, id: Uuid, link: Link) -> Result<Arc<MemberClient>, ClientError> {
        let connection = StreamConnection::connect(&link, &self.config.connection).await?;
        if let Err(e) = handshake(&connection, &link, self.config.connection.handshake_timeout).await {
            tracing::warn!(client = %id, endpoint = %link.endpoint(), error = %e, "handshake failed");
            connection.shutdown().await;
            return Err(e.into());
        }

        let factory = push_factory(id, Arc::clone(&self.notifier));
        let (dispatcher, task) =
            Dispatcher::spawn(Arc::new(connection), factory, self.config.dispatcher.clone());
        let client = Arc::new(MemberClient::new(id, link, dispatcher, task, Arc::clone(&self.config)));

        let previous = self.records().insert(id, Arc::clone(&client));
        if let Some(previous) = previous {
            tracing::info!(client = %id, "replacing existing connection");
            previous.close().await;
        }

        tracing::info!(client = %id, endpoint = %client.endpoint(), "client connected");
        Ok(client)
    }

    /// Live client by id.
    ///
    /// # Errors
    ///
    /// - `ClientError::ClientNotFound` if no client has this id
    pub fn get_client(&self, id: Uuid) -> Result<Arc<MemberClient>, ClientError> {
        self.records().get(&id).cloned().ok_or(ClientError::ClientNotFound(id))
    }

    /// Remove and close a client.
    ///
    /// # Errors
    ///
    /// - `ClientError::ClientNotFound` if no client has this id
    pub async fn disconnect(&self, id: Uuid) -> Result<(), ClientError> {
        let client = self.records().remove(&id).ok_or(ClientError::ClientNotFound(id))?;
        client.close().await;
        Ok(())
    }

    /// Listing of every registered client, ordered by uuid.
    pub fn clients(&self) -> Vec<ClientInfo> {
        let mut infos: Vec<ClientInfo> = self.records().values().map(|c| c.info()).collect();
        infos.sort_by_key(|info| info.uuid);
        infos
    }

    /// Drop clients whose connection is dead. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut clients = self.records();
        let before = clients.len();
        clients.retain(|id, client| {
            let alive = client.is_connected();
            if !alive {
                tracing::info!(client = %id, "pruned dead client");
            }
            alive
        });
        before - clients.len()
    }

    /// Close every client.
    pub async fn shutdown(&self) {
        let clients: Vec<Arc<MemberClient>> = self.records().drain().map(|(_, c)| c).collect();
        for client in clients {
            client.close().await;
        }
    }

    fn records(&self) -> MutexGuard<'_, HashMap<Uuid, Arc<MemberClient>>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
