//! # Drive
//!
//! Wires one account's session, clients and caches together.
//!
//! ```text
//!              transport (shared)
//!       ┌──────────┼──────────────┐
//!   user client  drive client  download client
//!       │            │               │
//!  SessionManager ─► DriveApi     DownloadClient
//!                    │               │
//!                RemoteTree ─────────┤
//!                    │               │
//!           DriveFileSystem    DirectDownload
//! ```

use bridge_traits::http::HttpClient;
use bridge_traits::storage::StateStore;
use core_auth::{fetch_client_profile, AccountCredentials, ClientProfile, DeviceIdentity, SessionManager, SessionState};
use core_runtime::config::DriveConfig;
use provider_pikpak::{ClientPipeline, DownloadClient, DriveApi};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::direct::DirectDownload;
use crate::error::{FsError, Result};
use crate::filesystem::DriveFileSystem;
use crate::tree::RemoteTree;

/// One signed-in account with its filesystem views
pub struct Drive {
    config: DriveConfig,
    session: Arc<SessionManager>,
    tree: Arc<RemoteTree>,
    downloads: Arc<DownloadClient>,
    file_system: Arc<DriveFileSystem>,
    direct: Arc<DirectDownload>,
}

impl Drive {
    /// In-memory drive with a freshly generated device id
    pub fn new(
        config: DriveConfig,
        profile: ClientProfile,
        account: AccountCredentials,
        transport: Arc<dyn HttpClient>,
    ) -> Result<Self> {
        let identity = Arc::new(DeviceIdentity::generate(profile)?);
        let session = SessionManager::new(
            Arc::new(ClientPipeline::user_service(Arc::clone(&transport), Arc::clone(&identity))),
            identity,
            account,
            &config,
        );
        Ok(Self::assemble(config, Arc::new(session), transport))
    }

    /// Drive whose session document lives in `store`
    ///
    /// A saved device id and token pair are reused so a restart neither
    /// looks like a new device nor forces a sign-in.
    #[instrument(skip_all)]
    pub async fn open(
        config: DriveConfig,
        profile: ClientProfile,
        account: AccountCredentials,
        transport: Arc<dyn HttpClient>,
        store: Arc<dyn StateStore>,
    ) -> Result<Self> {
        let saved = SessionState::load(store.as_ref()).await?;

        let identity = match &saved {
            Some(state) if !state.device_id.is_empty() => {
                debug!("Reusing saved device id");
                DeviceIdentity::new(profile, state.device_id.clone())?
            }
            _ => DeviceIdentity::generate(profile)?,
        };
        let identity = Arc::new(identity);

        let mut session = SessionManager::new(
            Arc::new(ClientPipeline::user_service(Arc::clone(&transport), Arc::clone(&identity))),
            identity,
            account,
            &config,
        )
        .with_store(store);
        if let Some(state) = &saved {
            session = session.with_restored_state(state);
        }

        Ok(Self::assemble(config, Arc::new(session), transport))
    }

    /// Bootstrap the client profile and read the account from `store`
    ///
    /// # Errors
    ///
    /// [`FsError::AuthenticationFailed`] when the store has no account
    /// document.
    #[instrument(skip_all)]
    pub async fn from_store(
        config: DriveConfig,
        transport: Arc<dyn HttpClient>,
        store: Arc<dyn StateStore>,
    ) -> Result<Self> {
        let web = ClientPipeline::web(Arc::clone(&transport));
        let profile = fetch_client_profile(&web, &config.web_base_url).await?;

        let account = AccountCredentials::load(store.as_ref())
            .await?
            .ok_or_else(|| FsError::AuthenticationFailed("no account configured".to_string()))?;

        Self::open(config, profile, account, transport, store).await
    }

    fn assemble(config: DriveConfig, session: Arc<SessionManager>, transport: Arc<dyn HttpClient>) -> Self {
        let api = DriveApi::new(
            ClientPipeline::drive_api(Arc::clone(&transport), Arc::clone(&session)),
            &config,
        );
        let tree = Arc::new(RemoteTree::new(Arc::new(api), &config));
        let downloads = Arc::new(DownloadClient::new(
            ClientPipeline::download(transport, session.identity().device_id()),
            config.max_download_connections,
        ));

        let file_system = Arc::new(DriveFileSystem::new(
            Arc::clone(&tree),
            Arc::clone(&downloads),
            config.rate_limit_retry_after,
            config.rate_limit_pause,
        ));
        let direct = Arc::new(DirectDownload::new(
            Arc::clone(&tree),
            Arc::clone(&downloads),
            config.max_download_connections,
            config.rate_limit_retry_after,
            config.rate_limit_pause,
        ));

        info!(device_id = %session.identity().device_id(), "Drive assembled");
        Self {
            config,
            session,
            tree,
            downloads,
            file_system,
            direct,
        }
    }

    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn tree(&self) -> &Arc<RemoteTree> {
        &self.tree
    }

    pub fn downloads(&self) -> &Arc<DownloadClient> {
        &self.downloads
    }

    pub fn file_system(&self) -> Arc<DriveFileSystem> {
        Arc::clone(&self.file_system)
    }

    pub fn direct_download(&self) -> Arc<DirectDownload> {
        Arc::clone(&self.direct)
    }
}
