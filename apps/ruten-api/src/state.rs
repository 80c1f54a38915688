//! Shared application state.
//!
//! Built once at startup and cloned into every handler. The default client
//! is optional: without credentials the service still runs, local changes
//! degrade to local-only results and the sync routes answer 503.

use std::sync::Arc;

use ruten_core::{ConfigurationError, Credential};
use ruten_db::Database;
use ruten_sync::{
    ApiLogSink, CatalogService, ClientError, FanoutSink, Notifier, ObservabilitySink, RutenClient,
    SyncConfig, TracingSink,
};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<SyncConfig>,
    /// Every remote call is traced and persisted to the call log.
    pub sink: Arc<dyn ObservabilitySink>,
    client: Result<Arc<RutenClient>, ConfigurationError>,
    service: CatalogService,
}

impl AppState {
    /// `credential` is usually [`Credential::from_env`]; its error is kept as
    /// the reason no default client exists.
    pub fn new(
        config: SyncConfig,
        db: Database,
        credential: Result<Credential, ConfigurationError>,
    ) -> Self {
        let sink: Arc<dyn ObservabilitySink> = Arc::new(FanoutSink::new(vec![
            Arc::new(TracingSink),
            Arc::new(ApiLogSink::new(db.api_logs())),
        ]));

        let client = credential.and_then(|credential| {
            RutenClient::new(credential, &config.remote, sink.clone())
                .map(Arc::new)
                .map_err(|e| match e {
                    ClientError::Configuration(e) => e,
                    other => ConfigurationError::Invalid(other.to_string()),
                })
        });

        match &client {
            Ok(client) => info!(
                api_key = %client.credential().api_key_preview(),
                base_url = %config.remote.base_url,
                "Marketplace client ready"
            ),
            Err(e) => warn!(error = %e, "No marketplace client, running local-only"),
        }

        let notifier = client
            .clone()
            .map(|client| client as Arc<dyn Notifier>);
        let service = CatalogService::new(db.clone(), notifier);

        AppState {
            db,
            config: Arc::new(config),
            sink,
            client,
            service,
        }
    }

    pub fn service(&self) -> &CatalogService {
        &self.service
    }

    /// The default client, or a 503 naming what is missing.
    pub fn client(&self) -> ApiResult<&RutenClient> {
        match &self.client {
            Ok(client) => Ok(client.as_ref()),
            Err(e) => Err(ApiError::from(e.clone())),
        }
    }

    pub fn client_or_reason(&self) -> Result<&RutenClient, &ConfigurationError> {
        self.client.as_ref().map(|client| client.as_ref())
    }

    /// Page size used when a request names none.
    pub fn default_page_size(&self) -> u32 {
        self.config.sync.page_size
    }
}
