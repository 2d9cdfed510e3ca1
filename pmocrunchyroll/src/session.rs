//! Session d'authentification et sa persistance
//!
//! La [`Session`] regroupe le jeton porteur et les paramètres de signature CMS
//! (`Policy`, `Signature`, `Key-Pair-Id`). Elle n'est créée et modifiée que par
//! la [`TokenAuthority`](crate::api::auth::TokenAuthority) ; le [`SessionStore`]
//! se contente de la charger, la sauvegarder et la supprimer.

use crate::error::{CrunchyrollError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Nom du fichier de session dans le répertoire de profil
pub const SESSION_FILE: &str = "session_data.json";

/// Paramètres de signature CMS, issus de la ressource index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmsSigning {
    pub policy: String,
    pub signature: String,
    pub key_pair_id: String,
    /// Préfixe des URLs CMS (ex: `/US/M2/crunchyroll`)
    #[serde(default)]
    pub bucket: String,
}

/// Session authentifiée
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub account_id: String,
    pub cms: CmsSigning,
}

impl Session {
    /// La session est expirée dès que `now > expires_at`
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Valeur de l'en-tête `Authorization`
    pub fn authorization_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }

    /// Paramètres de requête ajoutés à chaque appel signé
    pub fn signing_params(&self) -> [(&'static str, &str); 3] {
        [
            ("Policy", self.cms.policy.as_str()),
            ("Signature", self.cms.signature.as_str()),
            ("Key-Pair-Id", self.cms.key_pair_id.as_str()),
        ]
    }
}

/// Stockage persistant d'un enregistrement de session unique
pub trait SessionStore: Send + Sync {
    /// Charge la session persistée, `None` si absente ou illisible
    fn load(&self) -> Result<Option<Session>>;

    fn save(&self, session: &Session) -> Result<()>;

    /// Supprime la session persistée (sans erreur si elle n'existe pas)
    fn delete(&self) -> Result<()>;
}

/// Session persistée en JSON dans `<profile_dir>/session_data.json`
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Crée un store dans le répertoire de profil donné
    pub fn new(profile_dir: impl AsRef<Path>) -> Self {
        Self {
            path: profile_dir.as_ref().join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            debug!("No persisted session at {}", self.path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str::<Session>(&content) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                // Un fichier corrompu équivaut à l'absence de session
                warn!(
                    "Ignoring unreadable session file {}: {}",
                    self.path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, content).map_err(|e| {
            CrunchyrollError::SessionStore(format!(
                "Failed to write {}: {}",
                self.path.display(),
                e
            ))
        })?;
        debug!("Session saved to {}", self.path.display());
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Session file {} deleted", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Store en mémoire, pour les tests ou les hôtes sans disque
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<Session>>> {
        self.session
            .lock()
            .map_err(|_| CrunchyrollError::SessionStore("session lock poisoned".into()))
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>> {
        Ok(self.slot()?.clone())
    }

    fn save(&self, session: &Session) -> Result<()> {
        *self.slot()? = Some(session.clone());
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        *self.slot()? = None;
        Ok(())
    }
}
