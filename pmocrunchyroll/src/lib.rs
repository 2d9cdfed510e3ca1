//! # pmocrunchyroll - Session et synchronisation de lecture Crunchyroll
//!
//! Cette crate authentifie un compte Crunchyroll, signe chaque appel à l'API et
//! garde la lecture locale synchronisée avec l'état du serveur (reprise,
//! marqueurs de saut d'intro/générique, épisode suivant).
//!
//! ## Vue d'ensemble
//!
//! - `TokenAuthority` : machine à états d'authentification, rafraîchissement
//!   unique en vol et nombre de reconnexions borné
//! - `CrunchyrollApi` : dispatcher qui ajoute le jeton porteur et les paramètres
//!   CMS `Policy`/`Signature`/`Key-Pair-Id` à chaque requête
//! - `PlaybackCoordinator` : démarre le lecteur hôte puis supervise les tâches
//!   de synchronisation, de saut et d'annonce de l'épisode suivant
//!
//! Le lecteur ([`HostPlayer`]), les dialogues ([`PlaybackUi`]) et la résolution
//! des flux ([`StreamResolver`]) sont des collaborateurs externes.
//!
//! ## Structure des modules
//!
//! ```text
//! pmocrunchyroll/
//! ├── src/
//! │   ├── lib.rs              # Module principal (ce fichier)
//! │   ├── client.rs           # Client haut-niveau
//! │   ├── session.rs          # Session et stockage persistant
//! │   ├── models.rs           # Structures de données, décodage du catalogue
//! │   ├── api/
//! │   │   ├── mod.rs          # Dispatcher de requêtes signées
//! │   │   ├── auth.rs         # Autorité de jetons
//! │   │   ├── playheads.rs    # Positions de lecture
//! │   │   └── content.rs      # Objets, épisode suivant, flux
//! │   ├── stream.rs           # Résolution des flux
//! │   ├── player.rs           # Interface du lecteur hôte
//! │   ├── ui.rs               # Interface des dialogues
//! │   ├── playback/           # Coordinateur et tâches de fond
//! │   ├── config_ext.rs       # Extension pmoconfig
//! │   ├── logging.rs          # Initialisation des logs
//! │   └── error.rs            # Gestion des erreurs
//! ```
//!
//! ## Utilisation
//!
//! ```rust,no_run
//! use pmocrunchyroll::{CrunchyrollClient, PlaybackRequest};
//! # use pmocrunchyroll::{HostPlayer, PlaybackUi};
//! # use std::sync::Arc;
//! # async fn run(player: Arc<dyn HostPlayer>, ui: Arc<dyn PlaybackUi>) -> anyhow::Result<()> {
//! let client = CrunchyrollClient::from_config().await?;
//!
//! client
//!     .play(
//!         player,
//!         ui,
//!         PlaybackRequest {
//!             series_id: Some("GRDV0019R".into()),
//!             episode_id: "GRVNQ3Z9R".into(),
//!             stream_id: "GRVNQ3Z9R".into(),
//!             ..Default::default()
//!         },
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```yaml
//! accounts:
//!   crunchyroll:
//!     username: "user@example.com"
//!     password: "encrypted:..."
//!     locale: "en-US"
//! host:
//!   crunchyroll:
//!     profile_dir: "crunchyroll"
//! playback:
//!   sync_playtime: true
//!   skip_intro: true
//!   skip_credits: true
//!   up_next: true
//! ```

pub mod api;
pub mod client;
pub mod config_ext;
pub mod error;
pub mod logging;
pub mod models;
pub mod playback;
pub mod player;
pub mod session;
pub mod stream;
pub mod ui;

pub use api::CrunchyrollApi;
pub use api::auth::{AuthState, Credentials, TokenAuthority};
pub use client::CrunchyrollClient;
pub use config_ext::CrunchyrollConfigExt;
pub use error::{CrunchyrollError, Result};
pub use models::{
    CatalogObject, Episode, HistoryEntry, HistoryPage, PlayableItem, PlaybackRequest,
    PlayheadInfo, SkipKind, SkipWindow, StreamDescriptor, SubtitleTrack,
};
pub use playback::{PlaybackCoordinator, PlaybackHandle, PlaybackSettings, PlaybackTimings};
pub use player::{HostPlayer, PlayOptions};
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionStore};
pub use stream::{CmsStreamResolver, StreamResolver};
pub use ui::{PlaybackUi, UpNextNotice};
