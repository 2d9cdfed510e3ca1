//! Synchronisation périodique de la position de lecture

use super::{PlaybackBackend, PlaybackSession};
use crate::error::CrunchyrollError;
use crate::player::HostPlayer;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Envoie la position courante toutes les `interval` tant que le lecteur joue
/// le flux de la session
///
/// Rien n'est envoyé si la position n'a pas avancé depuis le dernier envoi
/// (pause). Les erreurs réseau sont journalisées et n'arrêtent pas la tâche.
pub async fn run_playhead_sync(
    session: Arc<PlaybackSession>,
    player: Arc<dyn HostPlayer>,
    backend: Arc<dyn PlaybackBackend>,
    interval: Duration,
    cancel: CancellationToken,
) {
    info!("Playhead sync started for {}", session.content_id());

    while session.is_current(player.as_ref()) {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        if !session.is_current(player.as_ref()) {
            break;
        }

        let time = player.current_time();
        if time <= session.last_synced() {
            continue;
        }
        session.set_last_synced(time);

        match backend.update_playhead(session.content_id(), time).await {
            Ok(()) => debug!("Playhead {:.0}s synced for {}", time, session.content_id()),
            Err(e) => {
                let err = CrunchyrollError::Sync(format!(
                    "playhead update for {} failed: {}",
                    session.content_id(),
                    e
                ));
                warn!("{}", err);
            }
        }
    }

    info!("Playhead sync finished for {}", session.content_id());
}
