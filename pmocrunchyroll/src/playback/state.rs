use crate::models::{SkipKind, SkipWindow, StreamDescriptor};
use crate::player::{HostPlayer, is_playing_url};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// État partagé d'une tentative de lecture
///
/// Le descripteur est immuable ; `last_synced` n'est écrit que par la tâche de
/// synchronisation et les fenêtres restantes ne sont retirées que par le
/// détecteur de saut.
#[derive(Debug)]
pub struct PlaybackSession {
    descriptor: StreamDescriptor,
    content_id: String,
    last_synced: AtomicU64,
    remaining_skip_windows: Mutex<BTreeMap<SkipKind, SkipWindow>>,
}

impl PlaybackSession {
    /// `skip_windows` est la copie (éventuellement filtrée) consommée par le détecteur
    pub fn new(
        descriptor: StreamDescriptor,
        content_id: impl Into<String>,
        skip_windows: BTreeMap<SkipKind, SkipWindow>,
    ) -> Self {
        Self {
            descriptor,
            content_id: content_id.into(),
            last_synced: AtomicU64::new(0f64.to_bits()),
            remaining_skip_windows: Mutex::new(skip_windows),
        }
    }

    pub fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    pub fn stream_url(&self) -> &str {
        &self.descriptor.stream_url
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    /// Garde d'identité : le lecteur joue-t-il encore ce flux ?
    pub fn is_current(&self, player: &dyn HostPlayer) -> bool {
        is_playing_url(player, self.stream_url())
    }

    pub fn last_synced(&self) -> f64 {
        f64::from_bits(self.last_synced.load(Ordering::Acquire))
    }

    pub(crate) fn set_last_synced(&self, time: f64) {
        self.last_synced.store(time.to_bits(), Ordering::Release);
    }

    pub async fn remaining_skip_windows(&self) -> BTreeMap<SkipKind, SkipWindow> {
        self.remaining_skip_windows.lock().await.clone()
    }

    /// Retire et retourne les fenêtres contenant `time`, dans l'ordre des types
    pub(crate) async fn take_due_windows(&self, time: f64) -> Vec<(SkipKind, SkipWindow)> {
        let mut windows = self.remaining_skip_windows.lock().await;
        let due: Vec<(SkipKind, SkipWindow)> = windows
            .iter()
            .filter(|(_, window)| window.contains(time))
            .map(|(kind, window)| (kind.clone(), *window))
            .collect();
        for (kind, _) in &due {
            windows.remove(kind);
        }
        due
    }

    pub(crate) async fn has_skip_windows(&self) -> bool {
        !self.remaining_skip_windows.lock().await.is_empty()
    }
}
