//! Détection des fenêtres de saut (intro, générique...)

use super::{PlaybackSession, PlaybackSettings};
use crate::models::{SkipKind, SkipWindow};
use crate::player::HostPlayer;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Reçoit les fenêtres atteintes ; doit rendre la main immédiatement
pub trait SkipHandler: Send + Sync {
    fn offer(&self, kind: SkipKind, window: SkipWindow);
}

/// Retire les fenêtres désactivées par les préférences
pub fn filter_skip_windows(
    windows: &BTreeMap<SkipKind, SkipWindow>,
    settings: &PlaybackSettings,
) -> BTreeMap<SkipKind, SkipWindow> {
    windows
        .iter()
        .filter(|(kind, _)| match kind {
            SkipKind::Intro => settings.skip_intro,
            SkipKind::Credits => settings.skip_credits,
            _ => true,
        })
        .map(|(kind, window)| (kind.clone(), *window))
        .collect()
}

/// Vérifie chaque `interval` si la position entre dans une fenêtre restante
///
/// Chaque fenêtre atteinte est transmise une seule fois au `handler` puis
/// retirée. La tâche s'arrête quand il n'en reste plus ou quand le lecteur ne
/// joue plus le flux de la session.
pub async fn run_skip_detector(
    session: Arc<PlaybackSession>,
    player: Arc<dyn HostPlayer>,
    handler: Arc<dyn SkipHandler>,
    interval: Duration,
    cancel: CancellationToken,
) {
    info!("Skip detection started for {}", session.content_id());

    while session.has_skip_windows().await && session.is_current(player.as_ref()) {
        let time = player.current_time();
        for (kind, window) in session.take_due_windows(time).await {
            debug!("Reached {} window at {:.0}s", kind, time);
            handler.offer(kind, window);
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!("Skip detection finished for {}", session.content_id());
}
