//! Interface du lecteur hôte
//!
//! Le moteur ne décode rien : il pilote un lecteur externe et observe son état
//! (fichier ouvert, position, présence d'un média).

use crate::error::Result;
use crate::models::{PlayableItem, SubtitleTrack};
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Intervalle de scrutation de la condition « média actif »
pub const MEDIA_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Options de démarrage d'une lecture
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayOptions {
    /// Confier le flux au démultiplexeur adaptatif (HLS)
    pub adaptive: bool,
    pub subtitles: Vec<SubtitleTrack>,
}

/// Lecteur multimédia de l'hôte
pub trait HostPlayer: Send + Sync {
    /// Vrai aussi quand la lecture est en pause
    fn is_playing(&self) -> bool;

    /// Position courante en secondes
    fn current_time(&self) -> f64;

    /// URL du fichier actuellement ouvert
    fn current_file(&self) -> Option<String>;

    fn play(&self, url: &str, item: &PlayableItem, options: &PlayOptions) -> Result<()>;

    /// Bascule pause/lecture
    fn pause(&self);

    fn seek(&self, seconds: f64);

    fn stop(&self);

    /// Condition « un média est chargé » de l'hôte
    fn has_active_media(&self) -> bool;

    /// L'hôte sait lire un flux adaptatif
    fn supports_adaptive(&self) -> bool {
        false
    }
}

/// Vérifie que le lecteur joue encore `stream_url`
pub fn is_playing_url(player: &dyn HostPlayer, stream_url: &str) -> bool {
    player.is_playing() && player.current_file().as_deref() == Some(stream_url)
}

/// Attend qu'un média soit actif, au plus `timeout`
pub async fn wait_for_playback(player: &dyn HostPlayer, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !player.has_active_media() {
        if Instant::now() >= deadline {
            return false;
        }
        sleep(MEDIA_POLL_INTERVAL).await;
    }
    true
}
