//! Coordination de la lecture
//!
//! Le [`PlaybackCoordinator`] résout le flux, démarre le lecteur hôte puis
//! lance trois tâches de fond sur un [`PlaybackSession`] partagé :
//!
//! - synchronisation de la position de lecture (toutes les 10 s),
//! - détection des fenêtres de saut (toutes les secondes),
//! - annonce de l'épisode suivant.
//!
//! Chaque tâche vérifie à chaque tour que le lecteur joue toujours le fichier
//! résolu ; sinon elle s'arrête proprement.

mod backend;
mod coordinator;
pub mod resume;
pub mod skip;
mod state;
pub mod sync;
pub mod upnext;

pub use backend::PlaybackBackend;
pub use coordinator::{PlaybackCoordinator, PlaybackHandle};
pub use resume::{resume_offer, resume_position};
pub use skip::{SkipHandler, filter_skip_windows};
pub use state::PlaybackSession;
pub use upnext::compute_up_next_offset;

use std::time::Duration;

/// Préférences de lecture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSettings {
    /// Reprise et synchronisation de la position de lecture
    pub sync_playtime: bool,
    pub skip_intro: bool,
    pub skip_credits: bool,
    pub up_next: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            sync_playtime: true,
            skip_intro: true,
            skip_credits: true,
            up_next: true,
        }
    }
}

/// Délais et intervalles du coordinateur
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackTimings {
    pub sync_interval: Duration,
    pub skip_interval: Duration,
    /// Attente du démarrage avant de lancer les tâches
    pub start_timeout: Duration,
    /// Attente du démarrage en mode adaptatif
    pub adaptive_start_timeout: Duration,
    /// Pause supplémentaire après un démarrage adaptatif réussi
    pub adaptive_settle: Duration,
    /// Confirmation avant de basculer en lecture directe
    pub fallback_timeout: Duration,
    /// Intervalle de surveillance de [`PlaybackHandle::wait`]
    pub supervise_interval: Duration,
    /// Durée maximale d'affichage d'une proposition de saut
    pub skip_prompt_max: Duration,
}

impl Default for PlaybackTimings {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(10),
            skip_interval: Duration::from_secs(1),
            start_timeout: Duration::from_secs(30),
            adaptive_start_timeout: Duration::from_secs(10),
            adaptive_settle: Duration::from_secs(3),
            fallback_timeout: Duration::from_secs(2),
            supervise_interval: Duration::from_secs(1),
            skip_prompt_max: Duration::from_secs(10),
        }
    }
}
