// src/connector/session.rs - Connection state shared by every connector family

use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info};

use super::{BackendKind, ConnectionState, ConnectorOptions};
use crate::config::BackendConfig;
use crate::error::{HarnessError, Result, TransportError};
use crate::transport::{with_timeout, TransportResult};

/// Configuration, options and connection state for one connector
pub(crate) struct Session {
    config: BackendConfig,
    kind: BackendKind,
    options: ConnectorOptions,
    state: ConnectionState,
    page_size: usize,
}

impl Session {
    pub fn new(config: BackendConfig, kind: BackendKind, options: ConnectorOptions) -> Self {
        let page_size = options.page_size;
        Self {
            config,
            kind,
            options,
            state: ConnectionState::Disconnected,
            page_size,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn step_timeout(&self) -> Duration {
        self.options.step_timeout
    }

    pub fn visibility_timeout(&self) -> Duration {
        self.options.visibility_timeout
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn ensure_connected(&self, operation: &'static str) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(HarnessError::NotConnected { operation })
        }
    }

    /// Validate settings and build the connector's layout before any I/O.
    /// Failures leave the session in `Failed`.
    pub fn prepare<T, F>(&mut self, build: F) -> Result<T>
    where
        F: FnOnce(&BackendConfig) -> Result<T>,
    {
        let prepared = self
            .config
            .require_all(self.kind.required_settings())
            .and_then(|_| self.resolve_page_size())
            .and_then(|_| build(&self.config));

        if let Err(e) = &prepared {
            error!(backend = %self.config.name, error = %e, "❌ Invalid backend configuration");
            self.state = ConnectionState::Failed;
        }
        prepared
    }

    fn resolve_page_size(&mut self) -> Result<()> {
        match self.config.parse_setting::<usize>("page_size")? {
            Some(0) => Err(HarnessError::invalid_config(format!(
                "backend '{}' setting 'page_size' must be at least 1",
                self.config.name
            ))),
            Some(size) => {
                self.page_size = size;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Run the transport's open call under the step timeout
    pub async fn open<F>(&mut self, open: F) -> Result<()>
    where
        F: Future<Output = TransportResult<()>>,
    {
        debug!(backend = %self.config.name, "Opening {} session", self.kind);
        match with_timeout(self.options.step_timeout, "connect", open).await {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                info!(backend = %self.config.name, kind = %self.kind, "🔌 Connected");
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Failed;
                error!(backend = %self.config.name, error = %e, "❌ Connect failed");
                Err(e.into_connect_error())
            }
        }
    }

    /// Bound one transport call by the step timeout
    pub async fn timed<T, F>(&self, operation: &str, call: F) -> TransportResult<T>
    where
        F: Future<Output = TransportResult<T>>,
    {
        with_timeout(self.options.step_timeout, operation, call).await
    }

    /// Run a create-if-not-exists call; an existing namespace is success
    pub async fn create_if_missing<F>(&self, namespace: &str, create: F) -> Result<()>
    where
        F: Future<Output = TransportResult<()>>,
    {
        match self.timed("create namespace", create).await {
            Ok(()) => {
                info!(backend = %self.config.name, namespace = %namespace, "📦 Created namespace");
                Ok(())
            }
            Err(TransportError::AlreadyExists(_)) => {
                debug!(backend = %self.config.name, namespace = %namespace, "Namespace already exists");
                Ok(())
            }
            Err(e) => {
                error!(backend = %self.config.name, namespace = %namespace, error = %e, "❌ Namespace setup failed");
                Err(e.into_schema_error(namespace))
            }
        }
    }

    /// Returns true when the caller still has a session to close
    pub fn begin_disconnect(&mut self) -> bool {
        let had_session = self.state != ConnectionState::Disconnected;
        if had_session {
            debug!(backend = %self.config.name, "Disconnecting");
        }
        self.state = ConnectionState::Disconnected;
        had_session
    }
}
