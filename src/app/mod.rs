//! Process wiring: resolve backends once, then serve or run a single job.

use crate::api::{ApiServer, ApiState};
use crate::config::Config;
use crate::daily::DailyClient;
use crate::db;
use crate::embedding;
use crate::global::DataPaths;
use crate::index::{IndexComponents, IndexOrchestrator, OrchestratorSettings};
use crate::source::{CloudSource, RecordingSource, UploadSource};
use crate::store::SqliteIndexStore;
use crate::transcription::Transcriber;
use crate::uploads::UploadStagingArea;
use anyhow::{anyhow, Context, Result};
use fs2::FileExt;
use std::fs::File;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A fully wired index service. Only a service built with [`Service::build`]
/// holds the data directory lock and may run jobs.
pub struct Service {
    pub orchestrator: IndexOrchestrator,
    pub uploads: UploadStagingArea,
    _lock: Option<File>,
}

impl Service {
    pub async fn build(config: &Config) -> Result<Self> {
        let paths = DataPaths::resolve(config.storage.data_dir.as_ref())?;
        paths.ensure()?;
        info!("Using data directory {:?}", paths.root);

        let lock = acquire_lock(&paths)?;

        let store = SqliteIndexStore::open(&paths.index_db())?;
        let uploads = UploadStagingArea::open(
            &paths.index_db(),
            paths.uploads_dir(),
            config.server.max_upload_bytes,
        )?;

        Self::assemble(config, &paths, store, uploads, Some(lock)).await
    }

    /// Persisted view for inspection while another process may be serving.
    /// Takes no lock; state comes from the store, not from a live job.
    pub async fn inspect(config: &Config) -> Result<Self> {
        let paths = DataPaths::resolve(config.storage.data_dir.as_ref())?;
        paths.ensure()?;

        // Schema must exist before read-only connections can attach
        drop(db::open(&paths.index_db())?);

        let store = SqliteIndexStore::open_read_only(&paths.index_db())?;
        let uploads = UploadStagingArea::open_read_only(
            &paths.index_db(),
            paths.uploads_dir(),
            config.server.max_upload_bytes,
        )?;

        Self::assemble(config, &paths, store, uploads, None).await
    }

    async fn assemble(
        config: &Config,
        paths: &DataPaths,
        store: SqliteIndexStore,
        uploads: UploadStagingArea,
        lock: Option<File>,
    ) -> Result<Self> {
        let transcriber = Transcriber::from_config(&config.transcription)?;
        if transcriber.is_available() {
            info!("Transcription backend {} is ready", transcriber.name());
        } else {
            warn!(
                "Transcription backend {} is not available; index requests will be rejected",
                transcriber.name()
            );
        }

        let embedder = embedding::create_provider(&config.embedding)?;
        if !embedder.is_available() {
            warn!("Embedding model {} is not available", embedder.model_name());
        }

        let cloud: Option<Arc<dyn RecordingSource>> = match DailyClient::from_config(&config.daily)
        {
            Some(client) => Some(Arc::new(CloudSource::new(
                Arc::new(client),
                paths.staging_dir(),
                Duration::from_secs(config.indexing.recording_timeout_seconds),
            ))),
            None => {
                info!("No Daily API key configured; cloud recordings are disabled");
                None
            }
        };

        let orchestrator = IndexOrchestrator::new(
            IndexComponents {
                store: Arc::new(store),
                transcriber: Arc::new(transcriber),
                embedder,
                cloud,
                uploads: Arc::new(UploadSource::new(uploads.clone())),
            },
            OrchestratorSettings::from(config),
        );
        orchestrator.load_existing().await?;

        Ok(Self {
            orchestrator,
            uploads,
            _lock: lock,
        })
    }

    pub fn api_state(&self) -> ApiState {
        ApiState {
            orchestrator: self.orchestrator.clone(),
            status: self.orchestrator.status_registry(self.uploads.clone()),
            uploads: self.uploads.clone(),
        }
    }
}

pub async fn run_service(config: Config) -> Result<()> {
    info!("Starting recall-index service");

    let service = Service::build(&config).await?;
    let api_server = ApiServer::new(config.bind_address(), service.api_state());

    info!("recall-index is ready!");
    info!(
        "Try: curl -X POST http://{}/db/index -H 'content-type: application/json' -d '{{\"source\":\"upload\"}}'",
        config.bind_address()
    );

    api_server.start().await
}

/// One process per data directory; a second writer would race the index.
fn acquire_lock(paths: &DataPaths) -> Result<File> {
    let lock_path = paths.lock_file();
    let file = File::create(&lock_path)
        .with_context(|| format!("Failed to create lock file {:?}", lock_path))?;
    file.try_lock_exclusive().map_err(|_| {
        anyhow!(
            "Another recall-index process is using {:?}; stop it first",
            paths.root
        )
    })?;
    Ok(file)
}
