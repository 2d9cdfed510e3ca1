use super::resume::{resume_offer, resume_position};
use super::skip::{SkipHandler, filter_skip_windows, run_skip_detector};
use super::sync::run_playhead_sync;
use super::upnext::compute_up_next_offset;
use super::{PlaybackBackend, PlaybackSession, PlaybackSettings, PlaybackTimings};
use crate::error::{CrunchyrollError, Result};
use crate::models::{PlaybackRequest, SkipKind, SkipWindow, StreamDescriptor};
use crate::player::{HostPlayer, PlayOptions, wait_for_playback};
use crate::stream::StreamResolver;
use crate::ui::{PlaybackUi, UpNextNotice};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Orchestration d'une lecture et de ses tâches de fond
pub struct PlaybackCoordinator {
    resolver: Arc<dyn StreamResolver>,
    backend: Arc<dyn PlaybackBackend>,
    player: Arc<dyn HostPlayer>,
    ui: Arc<dyn PlaybackUi>,
    settings: PlaybackSettings,
    timings: PlaybackTimings,
}

impl PlaybackCoordinator {
    pub fn new(
        resolver: Arc<dyn StreamResolver>,
        backend: Arc<dyn PlaybackBackend>,
        player: Arc<dyn HostPlayer>,
        ui: Arc<dyn PlaybackUi>,
    ) -> Self {
        Self {
            resolver,
            backend,
            player,
            ui,
            settings: PlaybackSettings::default(),
            timings: PlaybackTimings::default(),
        }
    }

    pub fn with_settings(mut self, settings: PlaybackSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_timings(mut self, timings: PlaybackTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    /// Démarre la lecture d'un épisode et lance les tâches de fond
    ///
    /// Échoue avant de toucher au lecteur si le flux ne peut pas être résolu
    /// ou si l'authentification est définitivement refusée ; l'erreur est
    /// aussi présentée à l'utilisateur.
    pub async fn start(&self, request: PlaybackRequest) -> Result<PlaybackHandle> {
        info!("Starting playback of episode {}", request.episode_id);

        let mut descriptor = match self.resolve(&request).await {
            Ok(descriptor) => descriptor,
            Err(e) => {
                error!("Failed to resolve stream for {}: {}", request.episode_id, e);
                self.ui.show_error(&e.to_string()).await;
                return Err(e);
            }
        };

        if self.player.is_playing() {
            debug!("Player already busy, replacing current media");
        }

        self.load_metadata(&request, &mut descriptor).await;
        self.start_player(&descriptor).await?;

        let skip_windows = filter_skip_windows(&descriptor.skip_windows, &self.settings);
        let session = Arc::new(PlaybackSession::new(
            descriptor,
            request.episode_id.clone(),
            skip_windows,
        ));
        let cancel = CancellationToken::new();
        let mut handle = PlaybackHandle {
            session: session.clone(),
            player: self.player.clone(),
            cancel: cancel.clone(),
            tasks: Vec::new(),
            supervise_interval: self.timings.supervise_interval,
        };

        if !wait_for_playback(self.player.as_ref(), self.timings.start_timeout).await {
            error!(
                "Timeout reached, video did not start in {:?}",
                self.timings.start_timeout
            );
            return Ok(handle);
        }

        if self.settings.sync_playtime {
            handle.tasks.push(tokio::spawn(resume_then_sync(
                session.clone(),
                self.player.clone(),
                self.backend.clone(),
                self.ui.clone(),
                request.clone(),
                self.timings.sync_interval,
                cancel.clone(),
            )));
        } else {
            info!("Playtime sync disabled");
        }

        if session.has_skip_windows().await {
            // Le détecteur alimente la file ; une seule proposition visible à la fois
            let (queue, offers) = mpsc::unbounded_channel();
            let detector = run_skip_detector(
                session.clone(),
                self.player.clone(),
                Arc::new(SkipQueue(queue)),
                self.timings.skip_interval,
                cancel.clone(),
            );
            let prompts = run_skip_prompts(
                offers,
                session.clone(),
                self.player.clone(),
                self.ui.clone(),
                self.timings.skip_prompt_max,
                cancel.clone(),
            );
            handle.tasks.push(tokio::spawn(async move {
                tokio::join!(detector, prompts);
            }));
        } else {
            debug!("No skip windows to watch");
        }

        if self.settings.up_next {
            handle.tasks.push(tokio::spawn(announce_up_next(
                session,
                self.player.clone(),
                self.backend.clone(),
                self.ui.clone(),
                request,
                cancel,
            )));
        }

        Ok(handle)
    }

    async fn resolve(&self, request: &PlaybackRequest) -> Result<StreamDescriptor> {
        let descriptor = self.resolver.resolve(request).await?;
        if descriptor.stream_url.is_empty() {
            return Err(CrunchyrollError::StreamUnavailable(format!(
                "no playable URL for {}",
                request.episode_id
            )));
        }
        Ok(descriptor)
    }

    // Métadonnées facultatives : un échec est journalisé
    async fn load_metadata(&self, request: &PlaybackRequest, descriptor: &mut StreamDescriptor) {
        match self
            .backend
            .load_metadata(&request.episode_id, request.series_id.as_deref())
            .await
        {
            Ok((Some(episode), series)) => {
                let mut item = episode.to_playable();
                if item.series_title.is_none() {
                    item.series_title = series.map(|s| s.title);
                }
                descriptor.metadata = item;
            }
            Ok((None, _)) => info!("No metadata found for episode {}", request.episode_id),
            Err(e) => warn!(
                "Unable to load metadata for episode {}: {}",
                request.episode_id, e
            ),
        }
    }

    /// Lecture adaptative si possible, sinon lecture directe après un court délai
    async fn start_player(&self, descriptor: &StreamDescriptor) -> Result<()> {
        let player = self.player.as_ref();
        let mut options = PlayOptions {
            adaptive: false,
            subtitles: descriptor.subtitle_tracks.clone(),
        };

        if descriptor.adaptive && player.supports_adaptive() {
            options.adaptive = true;
            player.play(&descriptor.stream_url, &descriptor.metadata, &options)?;

            if wait_for_playback(player, self.timings.adaptive_start_timeout).await {
                sleep(self.timings.adaptive_settle).await;
            }
            if wait_for_playback(player, self.timings.fallback_timeout).await {
                return Ok(());
            }

            info!("Adaptive playback failed to start, trying direct playback");
            options.adaptive = false;
        }

        player.play(&descriptor.stream_url, &descriptor.metadata, &options)
    }
}

/// Reprise éventuelle puis synchronisation périodique
async fn resume_then_sync(
    session: Arc<PlaybackSession>,
    player: Arc<dyn HostPlayer>,
    backend: Arc<dyn PlaybackBackend>,
    ui: Arc<dyn PlaybackUi>,
    request: PlaybackRequest,
    interval: Duration,
    cancel: CancellationToken,
) {
    let playhead = match request.playhead {
        Some(playhead) if playhead > 0.0 => playhead,
        _ => match backend.fetch_playhead(session.content_id()).await {
            Ok(info) => info.map(|i| i.playhead).unwrap_or(0.0),
            Err(e) => {
                warn!("Failed to fetch playhead for {}: {}", session.content_id(), e);
                0.0
            }
        },
    };
    debug!("Playhead for {} is {:.0}s", session.content_id(), playhead);

    if session.is_current(player.as_ref()) && !cancel.is_cancelled() {
        if request.resume_requested && playhead > 0.0 {
            player.seek(resume_position(playhead));
        } else if let Some(percent) = session
            .descriptor()
            .metadata
            .duration
            .and_then(|duration| resume_offer(playhead, duration))
        {
            player.pause();
            sleep(Duration::from_millis(500)).await;
            if ui.ask_resume(percent).await && session.is_current(player.as_ref()) {
                info!("Resuming {} at {}%", session.content_id(), percent);
                player.seek(resume_position(playhead));
                sleep(Duration::from_secs(1)).await;
            }
            player.pause();
        }
    }

    run_playhead_sync(session, player, backend, interval, cancel).await;
}

/// Résout l'épisode suivant et transmet l'annonce à l'interface
async fn announce_up_next(
    session: Arc<PlaybackSession>,
    player: Arc<dyn HostPlayer>,
    backend: Arc<dyn PlaybackBackend>,
    ui: Arc<dyn PlaybackUi>,
    request: PlaybackRequest,
    cancel: CancellationToken,
) {
    let next = tokio::select! {
        _ = cancel.cancelled() => return,
        next = backend.up_next(session.content_id()) => next,
    };

    let next = match next {
        Ok(Some(next)) => next,
        Ok(None) => {
            debug!("No next episode after {}", session.content_id());
            return;
        }
        Err(e) => {
            warn!("Cannot resolve next episode: {}", e);
            return;
        }
    };

    let Some(stream_id) = next.stream_id.clone() else {
        warn!("Next episode {} has no stream", next.id);
        return;
    };

    let descriptor = session.descriptor();
    let Some(notify_at) = compute_up_next_offset(
        descriptor.metadata.duration,
        descriptor.skip_windows.get(&SkipKind::Credits).copied(),
        descriptor.skip_windows.get(&SkipKind::Preview).copied(),
    ) else {
        debug!("No up-next prompt scheduled for {}", session.content_id());
        return;
    };

    if !session.is_current(player.as_ref()) {
        return;
    }

    let notice = UpNextNotice {
        current: descriptor.metadata.clone(),
        request: PlaybackRequest {
            series_id: next.series_id.clone().or(request.series_id),
            episode_id: next.id.clone(),
            stream_id,
            resume_requested: false,
            playhead: None,
        },
        next,
        notify_at,
    };
    info!(
        "Next episode {} announced at {}s",
        notice.request.episode_id, notify_at
    );
    ui.notify_up_next(notice).await;
}

/// File des fenêtres atteintes, consommée par [`run_skip_prompts`]
struct SkipQueue(mpsc::UnboundedSender<(SkipKind, SkipWindow)>);

impl SkipHandler for SkipQueue {
    fn offer(&self, kind: SkipKind, window: SkipWindow) {
        if let Err(mpsc::error::SendError((kind, _))) = self.0.send((kind, window)) {
            debug!("Skip prompts closed, dropping {} offer", kind);
        }
    }
}

/// Présente les propositions de saut une par une, dans l'ordre de la file
///
/// Une fenêtre dépassée pendant l'attente n'est plus proposée. Accepter
/// déplace la lecture à la fin de la fenêtre si le lecteur joue toujours le
/// flux de la session.
async fn run_skip_prompts(
    mut offers: mpsc::UnboundedReceiver<(SkipKind, SkipWindow)>,
    session: Arc<PlaybackSession>,
    player: Arc<dyn HostPlayer>,
    ui: Arc<dyn PlaybackUi>,
    max_duration: Duration,
    cancel: CancellationToken,
) {
    loop {
        let (kind, window) = tokio::select! {
            _ = cancel.cancelled() => break,
            offer = offers.recv() => match offer {
                Some(offer) => offer,
                None => break,
            },
        };

        if !session.is_current(player.as_ref()) {
            break;
        }
        let time = player.current_time();
        if !window.contains(time) {
            debug!("{} window already left at {:.0}s", kind, time);
            continue;
        }

        let timeout = Duration::from_secs_f64(window.length()).min(max_duration);
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = ui.offer_skip(&kind, window, timeout) => accepted,
        };
        if accepted && session.is_current(player.as_ref()) {
            info!("Skipping {} to {:.0}s", kind, window.end);
            player.seek(window.end);
        }
    }
}

/// Lecture en cours ; la supprimer annule les tâches de fond
pub struct PlaybackHandle {
    session: Arc<PlaybackSession>,
    player: Arc<dyn HostPlayer>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    supervise_interval: Duration,
}

impl PlaybackHandle {
    pub fn session(&self) -> &Arc<PlaybackSession> {
        &self.session
    }

    /// Le lecteur joue encore le flux résolu
    pub fn is_active(&self) -> bool {
        self.session.is_current(self.player.as_ref())
    }

    /// Nombre de tâches de fond lancées
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Attend la fin de la lecture de ce flux puis arrête les tâches
    pub async fn wait(mut self) {
        while self.is_active() {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = sleep(self.supervise_interval) => {}
            }
        }
        info!("Playback of {} ended", self.session.content_id());
        self.shutdown().await;
    }

    /// Arrête le lecteur et les tâches
    pub async fn stop(mut self) {
        info!("Stopping playback of {}", self.session.content_id());
        self.cancel.cancel();
        if self.is_active() {
            self.player.stop();
        }
        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("Playback task failed: {}", e);
            }
        }
    }
}

impl fmt::Debug for PlaybackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackHandle")
            .field("content_id", &self.session.content_id())
            .field("tasks", &self.tasks.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
