//! Shared application state

use std::ops::Deref;
use std::sync::Arc;

use curate_core::{AuthProvider, BlobStore, ContentType, DocumentStore, SuggestionService};
use curate_storage::{
    BlobStoreConfig, FsBlobStore, InMemoryDocumentStore, RedbDocumentStore,
    RedbDocumentStoreConfig, StorageError,
};
use curate_sync::{
    ClaudeSuggestionService, FormBuilder, FormSession, InMemoryAuthProvider, LiveSyncConfig,
    LiveSyncStore, LogNotifier, Notifier, PersistenceAdapter, SchemaRegistry,
    StaticSuggestionService, SyncError,
};
use dashmap::DashMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ServerConfig, StorageBackend, SuggestionBackend};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to open document store: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to open blob store: {0}")]
    Blob(#[from] curate_core::BlobError),

    #[error("Failed to start live sync: {0}")]
    Sync(#[from] SyncError),
}

/// Backends the state is assembled from
pub struct Backends {
    pub documents: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub suggestions: Arc<dyn SuggestionService>,
}

impl Backends {
    /// In-memory everything; used by tests and demos
    pub fn in_memory(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            documents: Arc::new(InMemoryDocumentStore::new()),
            blobs,
            auth: Arc::new(InMemoryAuthProvider::new()),
            suggestions: Arc::new(StaticSuggestionService::default()),
        }
    }
}

/// Open the document store named by the config
pub fn open_documents(config: &ServerConfig) -> Result<Arc<dyn DocumentStore>, StorageError> {
    Ok(match config.storage {
        StorageBackend::Memory => Arc::new(InMemoryDocumentStore::new()),
        StorageBackend::Redb => {
            if let Some(parent) = config.db_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Arc::new(RedbDocumentStore::open(
                RedbDocumentStoreConfig::default().with_db_path(&config.db_path),
            )?)
        }
    })
}

/// Open the filesystem blob store named by the config
pub async fn open_blobs(config: &ServerConfig) -> Result<FsBlobStore, curate_core::BlobError> {
    FsBlobStore::new(
        BlobStoreConfig::default()
            .with_base_dir(&config.blob_dir)
            .with_public_base_url(&config.public_base_url)
            .with_max_blob_size(config.max_blob_size),
    )
    .await
}

fn open_suggestions(config: &ServerConfig) -> Arc<dyn SuggestionService> {
    match config.suggestions {
        SuggestionBackend::Static => Arc::new(StaticSuggestionService::default()),
        SuggestionBackend::Claude => {
            let service = match std::env::var("ANTHROPIC_API_KEY") {
                Ok(key) => ClaudeSuggestionService::new(key, config.suggestion_model.clone()),
                Err(_) => Err(curate_core::SuggestionError::MissingApiKey),
            };
            match service {
                Ok(service) => Arc::new(service),
                Err(e) => {
                    warn!(error = %e, "Claude suggestions unavailable, using built-in schemas");
                    Arc::new(StaticSuggestionService::default())
                }
            }
        }
    }
}

pub struct AppInner {
    pub config: ServerConfig,
    pub registry: SchemaRegistry,
    pub documents: Arc<dyn DocumentStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub adapter: Arc<PersistenceAdapter>,
    pub live: LiveSyncStore,
    pub auth: Arc<dyn AuthProvider>,
    pub suggestions: Arc<dyn SuggestionService>,
    pub notifier: Arc<dyn Notifier>,
    /// Add-content forms, one per user and type
    forms: DashMap<(String, ContentType), Arc<FormSession>>,
}

/// Cloneable handle onto the application state
#[derive(Clone)]
pub struct AppState(Arc<AppInner>);

impl Deref for AppState {
    type Target = AppInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AppState {
    /// Open every backend from the config and start live sync
    pub async fn open(config: ServerConfig) -> Result<Self, StartupError> {
        let documents = open_documents(&config)?;
        let blobs: Arc<dyn BlobStore> = Arc::new(open_blobs(&config).await?);
        let suggestions = open_suggestions(&config);
        let backends = Backends {
            documents,
            blobs,
            auth: Arc::new(InMemoryAuthProvider::new()),
            suggestions,
        };
        Self::from_backends(config, backends).await
    }

    pub async fn from_backends(config: ServerConfig, backends: Backends) -> Result<Self, StartupError> {
        let adapter = Arc::new(PersistenceAdapter::new(
            backends.documents.clone(),
            backends.blobs.clone(),
        ));
        let live = LiveSyncStore::new(
            backends.documents.clone(),
            LiveSyncConfig::default().with_sort(config.sort),
        );
        live.start().await?;

        info!(storage = ?config.storage, sort = ?config.sort, "Application state ready");

        Ok(Self(Arc::new(AppInner {
            config,
            registry: SchemaRegistry::builtin(),
            documents: backends.documents,
            blobs: backends.blobs,
            adapter,
            live,
            auth: backends.auth,
            suggestions: backends.suggestions,
            notifier: Arc::new(LogNotifier),
            forms: DashMap::new(),
        })))
    }

    /// The add-content form of `uid` for `content_type`
    pub fn form_session(&self, uid: &str, content_type: ContentType) -> Arc<FormSession> {
        self.forms
            .entry((uid.to_string(), content_type))
            .or_insert_with(|| {
                Arc::new(FormSession::new(
                    FormBuilder::from_registry(&self.registry, content_type),
                    self.adapter.clone(),
                    self.notifier.clone(),
                ))
            })
            .clone()
    }
}
