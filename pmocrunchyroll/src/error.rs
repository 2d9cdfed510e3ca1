//! Gestion des erreurs pour le client Crunchyroll

use thiserror::Error;

/// Type Result personnalisé pour pmocrunchyroll
pub type Result<T> = std::result::Result<T, CrunchyrollError>;

/// Erreurs possibles lors de l'utilisation du client Crunchyroll
#[derive(Error, Debug)]
pub enum CrunchyrollError {
    /// Le jeton d'accès a expiré ou a été refusé (récupérable par rafraîchissement)
    #[error("Access token expired or rejected")]
    AuthExpired,

    /// Plafond de tentatives de connexion atteint : l'utilisateur doit
    /// ressaisir ses identifiants
    #[error("Authentication aborted after {attempts} failed attempts")]
    AuthAborted { attempts: u32 },

    /// Erreur réseau (connexion, timeout, ...)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Réponse HTTP non-2xx
    #[error("Crunchyroll API error (status {status}): {body}")]
    Api { status: u16, body: String },

    /// Réponse 2xx dont le corps n'est pas du JSON valide
    #[error("Malformed JSON response (status {status}): {body}")]
    MalformedJson { status: u16, body: String },

    /// Charge utile reçue mais de forme inattendue
    #[error("Unexpected payload: {0}")]
    Decode(String),

    /// Aucun flux lisible pour ce contenu
    #[error("No playable stream: {0}")]
    StreamUnavailable(String),

    /// Échec d'une tâche de synchronisation en arrière-plan
    #[error("Synchronisation error: {0}")]
    Sync(String),

    /// Erreur de persistance de la session
    #[error("Session store error: {0}")]
    SessionStore(String),

    /// Erreur d'entrée/sortie
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Erreur de (dé)sérialisation JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Erreur de configuration (anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

impl CrunchyrollError {
    /// Crée une erreur depuis un code de statut HTTP et le corps brut de la réponse
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        match status {
            401 => Self::AuthExpired,
            _ => Self::Api {
                status,
                body: body.into(),
            },
        }
    }

    /// Crée une erreur de décodage
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Code HTTP associé à l'erreur, si elle provient d'une réponse
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::AuthExpired => Some(401),
            Self::Api { status, .. } | Self::MalformedJson { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Vérifie si l'erreur impose d'arrêter la lecture (identifiants à ressaisir)
    pub fn is_fatal_auth(&self) -> bool {
        matches!(self, Self::AuthAborted { .. })
    }

    /// Vérifie si l'erreur est une erreur réseau
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(matches!(
            CrunchyrollError::from_status(401, ""),
            CrunchyrollError::AuthExpired
        ));

        match CrunchyrollError::from_status(503, "maintenance") {
            CrunchyrollError::Api { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "maintenance");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_status_accessor() {
        let err = CrunchyrollError::MalformedJson {
            status: 200,
            body: "<html>".into(),
        };
        assert_eq!(err.status(), Some(200));
        assert_eq!(CrunchyrollError::decode("x").status(), None);
    }

    #[test]
    fn test_fatal_auth() {
        assert!(CrunchyrollError::AuthAborted { attempts: 3 }.is_fatal_auth());
        assert!(!CrunchyrollError::AuthExpired.is_fatal_auth());
    }
}
