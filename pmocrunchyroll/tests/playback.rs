//! Playback coordinator tests with a fake host player, on a paused clock

use async_trait::async_trait;
use pmocrunchyroll::models::Series;
use pmocrunchyroll::playback::skip::run_skip_detector;
use pmocrunchyroll::playback::sync::run_playhead_sync;
use pmocrunchyroll::playback::{PlaybackBackend, PlaybackSession, SkipHandler};
use pmocrunchyroll::{
    CmsStreamResolver, Credentials, CrunchyrollApi, CrunchyrollError, MemorySessionStore, Episode, HostPlayer, PlayOptions, PlayableItem, PlaybackCoordinator,
    PlaybackRequest, PlaybackSettings, PlaybackUi, PlayheadInfo, Result, SkipKind, SkipWindow,
    StreamDescriptor, StreamResolver, UpNextNotice,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STREAM_URL: &str = "https://cdn/e1.m3u8";

struct PlayerState {
    file: Option<String>,
    playing: bool,
    paused: bool,
    base: f64,
    anchor: Instant,
    plays: Vec<(String, bool, PlayableItem)>,
    seeks: Vec<f64>,
    stopped: bool,
}

/// Player whose position advances with the tokio clock
struct FakePlayer {
    state: Mutex<PlayerState>,
    start_at: f64,
    adaptive: bool,
    adaptive_fails: bool,
    never_starts: bool,
}

impl FakePlayer {
    fn new(start_at: f64) -> Self {
        Self {
            state: Mutex::new(PlayerState {
                file: None,
                playing: false,
                paused: false,
                base: 0.0,
                anchor: Instant::now(),
                plays: Vec::new(),
                seeks: Vec::new(),
                stopped: false,
            }),
            start_at,
            adaptive: false,
            adaptive_fails: false,
            never_starts: false,
        }
    }

    fn adaptive(mut self, fails: bool) -> Self {
        self.adaptive = true;
        self.adaptive_fails = fails;
        self
    }

    fn never_starts(mut self) -> Self {
        self.never_starts = true;
        self
    }

    /// Simulate playing the given stream without going through `play`
    fn load(&self, url: &str) {
        let mut state = self.state.lock().unwrap();
        state.file = Some(url.to_string());
        state.playing = true;
        state.paused = false;
        state.base = self.start_at;
        state.anchor = Instant::now();
    }

    fn switch_file(&self, url: &str) {
        self.state.lock().unwrap().file = Some(url.to_string());
    }

    fn plays(&self) -> Vec<(String, bool, PlayableItem)> {
        self.state.lock().unwrap().plays.clone()
    }

    fn seeks(&self) -> Vec<f64> {
        self.state.lock().unwrap().seeks.clone()
    }

    fn stopped(&self) -> bool {
        self.state.lock().unwrap().stopped
    }
}

impl HostPlayer for FakePlayer {
    fn is_playing(&self) -> bool {
        self.state.lock().unwrap().playing
    }

    fn current_time(&self) -> f64 {
        let state = self.state.lock().unwrap();
        if state.paused {
            state.base
        } else {
            state.base + state.anchor.elapsed().as_secs_f64()
        }
    }

    fn current_file(&self) -> Option<String> {
        self.state.lock().unwrap().file.clone()
    }

    fn play(&self, url: &str, item: &PlayableItem, options: &PlayOptions) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .plays
            .push((url.to_string(), options.adaptive, item.clone()));
        if self.never_starts || (options.adaptive && self.adaptive_fails) {
            return Ok(());
        }
        self.load(url);
        Ok(())
    }

    fn pause(&self) {
        let now = self.current_time();
        let mut state = self.state.lock().unwrap();
        if state.paused {
            state.paused = false;
            state.anchor = Instant::now();
        } else {
            state.paused = true;
            state.base = now;
        }
    }

    fn seek(&self, seconds: f64) {
        let mut state = self.state.lock().unwrap();
        state.seeks.push(seconds);
        state.base = seconds;
        state.anchor = Instant::now();
    }

    fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.stopped = true;
        state.playing = false;
        state.file = None;
    }

    fn has_active_media(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.playing && state.file.is_some()
    }

    fn supports_adaptive(&self) -> bool {
        self.adaptive
    }
}

#[derive(Default)]
struct FakeBackend {
    playhead: Option<f64>,
    next: Option<Episode>,
    episode: Option<Episode>,
    updates: Mutex<Vec<(String, f64)>>,
    up_next_delay: Duration,
}

impl FakeBackend {
    fn updates(&self) -> Vec<(String, f64)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlaybackBackend for FakeBackend {
    async fn fetch_playhead(&self, _content_id: &str) -> Result<Option<PlayheadInfo>> {
        Ok(self.playhead.map(|playhead| PlayheadInfo {
            playhead,
            fully_watched: false,
        }))
    }

    async fn update_playhead(&self, content_id: &str, playhead: f64) -> Result<()> {
        self.updates
            .lock()
            .unwrap()
            .push((content_id.to_string(), playhead));
        Ok(())
    }

    async fn up_next(&self, _content_id: &str) -> Result<Option<Episode>> {
        sleep(self.up_next_delay).await;
        Ok(self.next.clone())
    }

    async fn load_metadata(
        &self,
        _episode_id: &str,
        series_id: Option<&str>,
    ) -> Result<(Option<Episode>, Option<Series>)> {
        let series = series_id.map(|id| Series {
            id: id.to_string(),
            title: "The Show".into(),
            description: None,
        });
        Ok((self.episode.clone(), series))
    }
}

#[derive(Default)]
struct RecordingUi {
    accept_resume: bool,
    accept_skip: bool,
    /// Keep each skip prompt on screen until it times out
    hold_skip: bool,
    errors: Mutex<Vec<String>>,
    resume_asked: Mutex<Vec<u32>>,
    skips: Mutex<Vec<(SkipKind, SkipWindow, Duration)>>,
    notices: Mutex<Vec<UpNextNotice>>,
}

#[async_trait]
impl PlaybackUi for RecordingUi {
    async fn show_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    async fn offer_skip(&self, kind: &SkipKind, window: SkipWindow, timeout: Duration) -> bool {
        self.skips
            .lock()
            .unwrap()
            .push((kind.clone(), window, timeout));
        if self.hold_skip {
            sleep(timeout).await;
        }
        self.accept_skip
    }

    async fn ask_resume(&self, percent: u32) -> bool {
        self.resume_asked.lock().unwrap().push(percent);
        self.accept_resume
    }

    async fn notify_up_next(&self, notice: UpNextNotice) {
        self.notices.lock().unwrap().push(notice);
    }
}

struct StaticResolver(std::result::Result<StreamDescriptor, String>);

#[async_trait]
impl StreamResolver for StaticResolver {
    async fn resolve(&self, request: &PlaybackRequest) -> Result<StreamDescriptor> {
        match &self.0 {
            Ok(descriptor) => {
                let mut descriptor = descriptor.clone();
                descriptor.metadata.content_id = request.episode_id.clone();
                Ok(descriptor)
            }
            Err(reason) => Err(CrunchyrollError::StreamUnavailable(reason.clone())),
        }
    }
}

#[derive(Default)]
struct RecordingHandler {
    offers: Mutex<Vec<(SkipKind, SkipWindow)>>,
}

impl SkipHandler for RecordingHandler {
    fn offer(&self, kind: SkipKind, window: SkipWindow) {
        self.offers.lock().unwrap().push((kind, window));
    }
}

fn descriptor(adaptive: bool, windows: &[(SkipKind, SkipWindow)]) -> StreamDescriptor {
    StreamDescriptor {
        stream_url: STREAM_URL.into(),
        adaptive,
        subtitle_tracks: vec![],
        skip_windows: windows.iter().cloned().collect(),
        metadata: PlayableItem::default(),
    }
}

fn request() -> PlaybackRequest {
    PlaybackRequest {
        series_id: Some("S1".into()),
        episode_id: "E1".into(),
        stream_id: "V1".into(),
        ..Default::default()
    }
}

fn episode_one() -> Episode {
    Episode {
        id: "E1".into(),
        title: "Episode 1".into(),
        series_id: Some("S1".into()),
        episode_number: Some(1),
        duration: Some(1200.0),
        stream_id: Some("V1".into()),
        ..Default::default()
    }
}

fn quiet_settings() -> PlaybackSettings {
    PlaybackSettings {
        sync_playtime: false,
        skip_intro: true,
        skip_credits: true,
        up_next: false,
    }
}

#[tokio::test(start_paused = true)]
async fn test_skip_window_fires_once() {
    let player = Arc::new(FakePlayer::new(84.0));
    player.load(STREAM_URL);

    let window = SkipWindow::new(85.0, 95.0);
    let windows: BTreeMap<_, _> = [(SkipKind::Intro, window)].into_iter().collect();
    let session = Arc::new(PlaybackSession::new(
        descriptor(false, &[(SkipKind::Intro, window)]),
        "E1",
        windows,
    ));
    let handler = Arc::new(RecordingHandler::default());

    let task = tokio::spawn(run_skip_detector(
        session.clone(),
        player.clone(),
        handler.clone(),
        Duration::from_secs(1),
        CancellationToken::new(),
    ));

    // The detector ends on its own once the only window is consumed
    tokio::time::timeout(Duration::from_secs(30), task)
        .await
        .expect("skip detector should finish")
        .unwrap();

    let offers = handler.offers.lock().unwrap().clone();
    assert_eq!(offers, vec![(SkipKind::Intro, window)]);
    assert!(player.current_time() >= 85.0);
    assert!(session.remaining_skip_windows().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_skip_detector_stops_when_media_changes() {
    let player = Arc::new(FakePlayer::new(0.0));
    player.load(STREAM_URL);

    let window = SkipWindow::new(100.0, 120.0);
    let windows: BTreeMap<_, _> = [(SkipKind::Credits, window)].into_iter().collect();
    let session = Arc::new(PlaybackSession::new(descriptor(false, &[]), "E1", windows));
    let handler = Arc::new(RecordingHandler::default());

    let task = tokio::spawn(run_skip_detector(
        session,
        player.clone(),
        handler.clone(),
        Duration::from_secs(1),
        CancellationToken::new(),
    ));

    sleep(Duration::from_millis(3500)).await;
    player.switch_file("https://cdn/other.m3u8");

    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("skip detector should stop")
        .unwrap();
    assert!(handler.offers.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sync_stops_when_media_changes() {
    let player = Arc::new(FakePlayer::new(0.0));
    player.load(STREAM_URL);
    let backend = Arc::new(FakeBackend::default());
    let session = Arc::new(PlaybackSession::new(
        descriptor(false, &[]),
        "E1",
        BTreeMap::new(),
    ));

    let task = tokio::spawn(run_playhead_sync(
        session.clone(),
        player.clone(),
        backend.clone(),
        Duration::from_secs(10),
        CancellationToken::new(),
    ));

    sleep(Duration::from_secs(25)).await;
    assert_eq!(
        backend.updates(),
        vec![("E1".to_string(), 10.0), ("E1".to_string(), 20.0)]
    );
    assert_eq!(session.last_synced(), 20.0);

    player.switch_file("https://cdn/other.m3u8");
    tokio::time::timeout(Duration::from_secs(15), task)
        .await
        .expect("sync should stop")
        .unwrap();
    assert_eq!(backend.updates().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_sync_skips_unchanged_position() {
    let player = Arc::new(FakePlayer::new(0.0));
    player.load(STREAM_URL);
    let backend = Arc::new(FakeBackend::default());
    let session = Arc::new(PlaybackSession::new(
        descriptor(false, &[]),
        "E1",
        BTreeMap::new(),
    ));
    let cancel = CancellationToken::new();

    let task = tokio::spawn(run_playhead_sync(
        session,
        player.clone(),
        backend.clone(),
        Duration::from_secs(10),
        cancel.clone(),
    ));

    sleep(Duration::from_secs(15)).await;
    player.pause();
    sleep(Duration::from_secs(20)).await;
    // 10s, then the paused position once; the 30s tick sends nothing
    assert_eq!(
        backend.updates(),
        vec![("E1".to_string(), 10.0), ("E1".to_string(), 15.0)]
    );

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_coordinator_full_flow() {
    let player = Arc::new(FakePlayer::new(0.0).adaptive(false));
    let backend = Arc::new(FakeBackend {
        playhead: Some(300.0),
        episode: Some(episode_one()),
        next: Some(Episode {
            id: "E2".into(),
            title: "Episode 2".into(),
            series_id: Some("S1".into()),
            episode_number: Some(2),
            stream_id: Some("V2".into()),
            ..Default::default()
        }),
        ..Default::default()
    });
    let ui = Arc::new(RecordingUi {
        accept_resume: true,
        ..Default::default()
    });
    let resolver = Arc::new(StaticResolver(Ok(descriptor(
        true,
        &[
            (SkipKind::Credits, SkipWindow::new(1170.0, 1195.0)),
            (SkipKind::Preview, SkipWindow::new(1195.0, 1200.0)),
        ],
    ))));

    let coordinator = PlaybackCoordinator::new(resolver, backend.clone(), player.clone(), ui.clone());
    let handle = coordinator.start(request()).await.unwrap();
    assert_eq!(handle.task_count(), 3);
    assert!(handle.is_active());

    sleep(Duration::from_secs(2)).await;

    let plays = player.plays();
    assert_eq!(plays.len(), 1);
    assert!(plays[0].1, "adaptive playback expected");
    assert_eq!(plays[0].2.title, "Episode 1");
    assert_eq!(plays[0].2.series_title.as_deref(), Some("The Show"));

    assert_eq!(*ui.resume_asked.lock().unwrap(), vec![25]);
    assert_eq!(player.seeks(), vec![295.0]);

    let notices = ui.notices.lock().unwrap().clone();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].notify_at, 1170);
    assert_eq!(notices[0].request.episode_id, "E2");
    assert_eq!(notices[0].request.stream_id, "V2");
    assert_eq!(notices[0].current.content_id, "E1");

    handle.stop().await;
    assert!(player.stopped());
    assert!(ui.errors.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_resume_requested_seeks_without_prompt() {
    let player = Arc::new(FakePlayer::new(0.0));
    let backend = Arc::new(FakeBackend {
        episode: Some(episode_one()),
        ..Default::default()
    });
    let ui = Arc::new(RecordingUi::default());
    let resolver = Arc::new(StaticResolver(Ok(descriptor(false, &[]))));

    let coordinator = PlaybackCoordinator::new(resolver, backend, player.clone(), ui.clone())
        .with_settings(PlaybackSettings {
            up_next: false,
            ..Default::default()
        });
    let handle = coordinator
        .start(PlaybackRequest {
            resume_requested: true,
            playhead: Some(3.0),
            ..request()
        })
        .await
        .unwrap();

    sleep(Duration::from_secs(1)).await;
    assert_eq!(player.seeks(), vec![0.0]);
    assert!(ui.resume_asked.lock().unwrap().is_empty());

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_stream_reports_error() {
    let player = Arc::new(FakePlayer::new(0.0));
    let ui = Arc::new(RecordingUi::default());
    let resolver = Arc::new(StaticResolver(Err("geo-restricted".into())));

    let coordinator = PlaybackCoordinator::new(
        resolver,
        Arc::new(FakeBackend::default()),
        player.clone(),
        ui.clone(),
    );
    let err = coordinator.start(request()).await.unwrap_err();

    assert!(matches!(err, CrunchyrollError::StreamUnavailable(_)));
    assert_eq!(ui.errors.lock().unwrap().len(), 1);
    assert!(player.plays().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_empty_stream_url_is_unavailable() {
    let player = Arc::new(FakePlayer::new(0.0));
    let ui = Arc::new(RecordingUi::default());
    let mut empty = descriptor(false, &[]);
    empty.stream_url.clear();

    let coordinator = PlaybackCoordinator::new(
        Arc::new(StaticResolver(Ok(empty))),
        Arc::new(FakeBackend::default()),
        player.clone(),
        ui.clone(),
    );

    assert!(coordinator.start(request()).await.is_err());
    assert_eq!(ui.errors.lock().unwrap().len(), 1);
    assert!(player.plays().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_adaptive_failure_falls_back_to_direct_play() {
    let player = Arc::new(FakePlayer::new(0.0).adaptive(true));
    let coordinator = PlaybackCoordinator::new(
        Arc::new(StaticResolver(Ok(descriptor(true, &[])))),
        Arc::new(FakeBackend::default()),
        player.clone(),
        Arc::new(RecordingUi::default()),
    )
    .with_settings(quiet_settings());

    let handle = coordinator.start(request()).await.unwrap();

    let modes: Vec<bool> = player.plays().into_iter().map(|(_, adaptive, _)| adaptive).collect();
    assert_eq!(modes, vec![true, false]);
    assert!(handle.is_active());
    assert_eq!(handle.task_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_start_timeout_launches_no_task() {
    let player = Arc::new(FakePlayer::new(0.0).never_starts());
    let coordinator = PlaybackCoordinator::new(
        Arc::new(StaticResolver(Ok(descriptor(false, &[])))),
        Arc::new(FakeBackend::default()),
        player.clone(),
        Arc::new(RecordingUi::default()),
    );

    let handle = coordinator.start(request()).await.unwrap();
    assert_eq!(handle.task_count(), 0);
    assert!(!handle.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_accepted_skip_prompt_seeks_to_window_end() {
    let player = Arc::new(FakePlayer::new(0.0));
    let ui = Arc::new(RecordingUi {
        accept_skip: true,
        ..Default::default()
    });
    let coordinator = PlaybackCoordinator::new(
        Arc::new(StaticResolver(Ok(descriptor(
            false,
            &[(SkipKind::Intro, SkipWindow::new(5.0, 15.0))],
        )))),
        Arc::new(FakeBackend::default()),
        player.clone(),
        ui.clone(),
    )
    .with_settings(quiet_settings());

    let handle = coordinator.start(request()).await.unwrap();
    assert_eq!(handle.task_count(), 1);

    sleep(Duration::from_secs(7)).await;

    let skips = ui.skips.lock().unwrap().clone();
    assert_eq!(skips.len(), 1);
    assert_eq!(skips[0].0, SkipKind::Intro);
    assert_eq!(skips[0].2, Duration::from_secs(10));
    assert_eq!(player.seeks(), vec![15.0]);

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_disabled_intro_skip_is_not_watched() {
    let player = Arc::new(FakePlayer::new(0.0));
    let coordinator = PlaybackCoordinator::new(
        Arc::new(StaticResolver(Ok(descriptor(
            false,
            &[(SkipKind::Intro, SkipWindow::new(5.0, 15.0))],
        )))),
        Arc::new(FakeBackend::default()),
        player,
        Arc::new(RecordingUi::default()),
    )
    .with_settings(PlaybackSettings {
        skip_intro: false,
        ..quiet_settings()
    });

    let handle = coordinator.start(request()).await.unwrap();
    assert_eq!(handle.task_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_wait_returns_when_media_changes() {
    let player = Arc::new(FakePlayer::new(0.0));
    let backend = Arc::new(FakeBackend::default());
    let coordinator = PlaybackCoordinator::new(
        Arc::new(StaticResolver(Ok(descriptor(false, &[])))),
        backend.clone(),
        player.clone(),
        Arc::new(RecordingUi::default()),
    )
    .with_settings(PlaybackSettings {
        up_next: false,
        ..Default::default()
    });

    let handle = coordinator.start(request()).await.unwrap();
    assert_eq!(handle.task_count(), 1);

    let switcher = player.clone();
    tokio::spawn(async move {
        sleep(Duration::from_secs(15)).await;
        switcher.switch_file("https://cdn/other.m3u8");
    });

    tokio::time::timeout(Duration::from_secs(60), handle.wait())
        .await
        .expect("wait should return once the media changes");

    // One sync at 10s, nothing after the switch
    assert_eq!(backend.updates().len(), 1);
    assert!(!player.stopped());
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_skip_windows_are_queued() {
    let player = Arc::new(FakePlayer::new(0.0));
    let ui = Arc::new(RecordingUi {
        hold_skip: true,
        ..Default::default()
    });
    let coordinator = PlaybackCoordinator::new(
        Arc::new(StaticResolver(Ok(descriptor(
            false,
            &[
                (SkipKind::Recap, SkipWindow::new(5.0, 30.0)),
                (SkipKind::Intro, SkipWindow::new(5.0, 40.0)),
            ],
        )))),
        Arc::new(FakeBackend::default()),
        player.clone(),
        ui.clone(),
    )
    .with_settings(quiet_settings());

    let handle = coordinator.start(request()).await.unwrap();
    assert_eq!(handle.task_count(), 1);

    sleep(Duration::from_secs(35)).await;

    // The intro prompt waits for the recap prompt to close
    let kinds: Vec<SkipKind> = ui.skips.lock().unwrap().iter().map(|s| s.0.clone()).collect();
    assert_eq!(kinds, vec![SkipKind::Recap, SkipKind::Intro]);
    assert!(player.seeks().is_empty());

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_zero_playhead_is_fetched_from_backend() {
    let player = Arc::new(FakePlayer::new(0.0));
    let backend = Arc::new(FakeBackend {
        playhead: Some(300.0),
        episode: Some(episode_one()),
        ..Default::default()
    });
    let ui = Arc::new(RecordingUi {
        accept_resume: true,
        ..Default::default()
    });
    let coordinator = PlaybackCoordinator::new(
        Arc::new(StaticResolver(Ok(descriptor(false, &[])))),
        backend,
        player.clone(),
        ui.clone(),
    )
    .with_settings(PlaybackSettings {
        up_next: false,
        ..Default::default()
    });

    let handle = coordinator
        .start(PlaybackRequest {
            playhead: Some(0.0),
            ..request()
        })
        .await
        .unwrap();

    sleep(Duration::from_secs(2)).await;
    assert_eq!(*ui.resume_asked.lock().unwrap(), vec![25]);
    assert_eq!(player.seeks(), vec![295.0]);

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_up_next_dropped_after_media_change() {
    let player = Arc::new(FakePlayer::new(0.0));
    let backend = Arc::new(FakeBackend {
        episode: Some(episode_one()),
        next: Some(Episode {
            id: "E2".into(),
            title: "Episode 2".into(),
            series_id: Some("S1".into()),
            stream_id: Some("V2".into()),
            ..Default::default()
        }),
        up_next_delay: Duration::from_secs(5),
        ..Default::default()
    });
    let ui = Arc::new(RecordingUi::default());
    let coordinator = PlaybackCoordinator::new(
        Arc::new(StaticResolver(Ok(descriptor(
            false,
            &[
                (SkipKind::Credits, SkipWindow::new(1170.0, 1195.0)),
                (SkipKind::Preview, SkipWindow::new(1195.0, 1200.0)),
            ],
        )))),
        backend,
        player.clone(),
        ui.clone(),
    )
    .with_settings(PlaybackSettings {
        sync_playtime: false,
        up_next: true,
        ..Default::default()
    });

    let handle = coordinator.start(request()).await.unwrap();

    sleep(Duration::from_secs(2)).await;
    player.switch_file("https://cdn/other.m3u8");

    // The next episode resolves at 5s, after the switch
    sleep(Duration::from_secs(10)).await;
    assert!(ui.notices.lock().unwrap().is_empty());
    assert!(!handle.is_active());

    handle.stop().await;
}

// Real clock: the HTTP exchange with the mock server must not race paused timers
#[tokio::test]
async fn test_aborted_auth_fails_before_playing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_credentials"))
        .expect(3)
        .mount(&server)
        .await;

    let api = CrunchyrollApi::builder()
        .api_base(server.uri())
        .session_store(Arc::new(MemorySessionStore::new()))
        .build(Credentials::new("user@example.com", "secret"))
        .unwrap();
    assert!(api.start().await.is_err());

    let player = Arc::new(FakePlayer::new(0.0));
    let ui = Arc::new(RecordingUi::default());
    let coordinator = PlaybackCoordinator::new(
        Arc::new(CmsStreamResolver::new(Arc::new(api))),
        Arc::new(FakeBackend::default()),
        player.clone(),
        ui.clone(),
    );

    let err = coordinator.start(request()).await.unwrap_err();
    assert!(matches!(err, CrunchyrollError::AuthAborted { .. }));
    assert_eq!(ui.errors.lock().unwrap().len(), 1);
    assert!(player.plays().is_empty());
}
