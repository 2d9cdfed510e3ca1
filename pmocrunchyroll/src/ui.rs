//! Interactions avec l'utilisateur, déléguées à l'hôte

use crate::models::{Episode, PlayableItem, PlaybackRequest, SkipKind, SkipWindow};
use async_trait::async_trait;
use std::time::Duration;

/// Annonce de l'épisode suivant
#[derive(Debug, Clone, PartialEq)]
pub struct UpNextNotice {
    pub current: PlayableItem,
    pub next: Episode,
    /// Demande de lecture à rejouer pour enchaîner
    pub request: PlaybackRequest,
    /// Position (secondes) à laquelle afficher l'annonce
    pub notify_at: u32,
}

/// Dialogues présentés par l'hôte
#[async_trait]
pub trait PlaybackUi: Send + Sync {
    /// Message d'erreur bloquant la tentative de lecture
    async fn show_error(&self, message: &str);

    /// Propose de sauter `window` ; `true` si l'utilisateur accepte avant `timeout`
    async fn offer_skip(&self, kind: &SkipKind, window: SkipWindow, timeout: Duration) -> bool;

    /// Propose de reprendre à `percent` % ; `true` pour reprendre
    async fn ask_resume(&self, percent: u32) -> bool;

    async fn notify_up_next(&self, notice: UpNextNotice);
}
