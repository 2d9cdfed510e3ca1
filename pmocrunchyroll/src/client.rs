//! Client principal pour interagir avec Crunchyroll
//!
//! Ce module assemble la configuration, le stockage de session, l'autorité de
//! jetons, le dispatcher et le coordinateur de lecture.

use crate::api::CrunchyrollApi;
use crate::api::auth::{AuthState, Credentials};
use crate::config_ext::CrunchyrollConfigExt;
use crate::error::Result;
use crate::models::PlaybackRequest;
use crate::playback::{PlaybackCoordinator, PlaybackSettings};
use crate::player::HostPlayer;
use crate::session::{FileSessionStore, SessionStore};
use crate::stream::{CmsStreamResolver, StreamResolver};
use crate::ui::PlaybackUi;
use pmoconfig::Config;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Client Crunchyroll haut-niveau
pub struct CrunchyrollClient {
    api: Arc<CrunchyrollApi>,
    resolver: Arc<dyn StreamResolver>,
    settings: PlaybackSettings,
}

impl CrunchyrollClient {
    /// Crée un client dont la session est persistée dans `profile_dir`, puis
    /// l'authentifie
    ///
    /// # Exemple
    ///
    /// ```rust,no_run
    /// use pmocrunchyroll::{Credentials, CrunchyrollClient};
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let credentials = Credentials::new("user@example.com", "password");
    ///     let client = CrunchyrollClient::new(credentials, "/tmp/crunchyroll").await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(credentials: Credentials, profile_dir: impl AsRef<Path>) -> Result<Self> {
        let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(profile_dir));
        let api = CrunchyrollApi::builder()
            .session_store(store)
            .build(credentials)?;
        Self::with_api(api, PlaybackSettings::default()).await
    }

    /// Crée un client en utilisant la configuration de pmoconfig
    ///
    /// # Exemple
    ///
    /// ```rust,no_run
    /// use pmocrunchyroll::CrunchyrollClient;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let client = CrunchyrollClient::from_config().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn from_config() -> Result<Self> {
        let config = pmoconfig::get_config();
        Self::from_config_obj(config.as_ref()).await
    }

    /// Crée un client depuis un objet Config spécifique
    pub async fn from_config_obj(config: &Config) -> Result<Self> {
        let credentials = config.get_crunchyroll_credentials()?;
        let profile_dir = config.get_crunchyroll_profile_dir()?;
        let settings = config.get_playback_settings()?;

        let mut builder = CrunchyrollApi::builder()
            .locale(config.get_crunchyroll_locale()?)
            .session_store(Arc::new(FileSessionStore::new(&profile_dir)));
        if let Some(api_base) = config.get_crunchyroll_api_base()? {
            info!("Using Crunchyroll API at {}", api_base);
            builder = builder.api_base(api_base);
        }

        Self::with_api(builder.build(credentials)?, settings).await
    }

    /// Démarre l'authentification d'un dispatcher déjà construit
    pub async fn with_api(api: CrunchyrollApi, settings: PlaybackSettings) -> Result<Self> {
        api.start().await?;
        let api = Arc::new(api);
        Ok(Self {
            resolver: Arc::new(CmsStreamResolver::new(api.clone())),
            api,
            settings,
        })
    }

    /// Remplace le résolveur de flux
    pub fn with_resolver(mut self, resolver: Arc<dyn StreamResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn api(&self) -> &Arc<CrunchyrollApi> {
        &self.api
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    pub fn auth_state(&self) -> AuthState {
        self.api.auth().state()
    }

    /// Coordinateur de lecture branché sur ce client
    pub fn coordinator(
        &self,
        player: Arc<dyn HostPlayer>,
        ui: Arc<dyn PlaybackUi>,
    ) -> PlaybackCoordinator {
        PlaybackCoordinator::new(self.resolver.clone(), self.api.clone(), player, ui)
            .with_settings(self.settings)
    }

    /// Lit un épisode jusqu'à ce que le lecteur change de média ou s'arrête
    pub async fn play(
        &self,
        player: Arc<dyn HostPlayer>,
        ui: Arc<dyn PlaybackUi>,
        request: PlaybackRequest,
    ) -> Result<()> {
        let handle = self.coordinator(player, ui).start(request).await?;
        handle.wait().await;
        Ok(())
    }

    /// Déconnexion : la session persistée est supprimée
    pub async fn logout(&self) -> Result<()> {
        info!("Logging out of Crunchyroll");
        self.api.auth().destroy().await
    }
}
