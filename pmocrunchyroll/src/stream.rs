//! Résolution d'un contenu en flux lisible

use crate::api::{CrunchyrollApi, handle_response};
use crate::error::{CrunchyrollError, Result};
use crate::models::{PlayableItem, PlaybackRequest, SkipKind, SkipWindow, StreamDescriptor, SubtitleTrack};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Emplacement public des marqueurs de saut
pub const SKIP_EVENTS_BASE_URL: &str = "https://static.crunchyroll.com/skip-events/production";

/// Transforme une demande de lecture en [`StreamDescriptor`]
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, request: &PlaybackRequest) -> Result<StreamDescriptor>;
}

/// Résolveur basé sur l'endpoint CMS `videos/{id}/streams`
pub struct CmsStreamResolver {
    api: Arc<CrunchyrollApi>,
    skip_events_base: String,
}

impl CmsStreamResolver {
    pub fn new(api: Arc<CrunchyrollApi>) -> Self {
        Self {
            api,
            skip_events_base: SKIP_EVENTS_BASE_URL.to_string(),
        }
    }

    pub fn with_skip_events_base(mut self, base: impl Into<String>) -> Self {
        self.skip_events_base = base.into().trim_end_matches('/').to_string();
        self
    }

    // Les marqueurs de saut sont facultatifs : toute erreur donne une table vide
    async fn skip_windows(&self, episode_id: &str) -> BTreeMap<SkipKind, SkipWindow> {
        let url = format!("{}/{}.json", self.skip_events_base, episode_id);
        match self.fetch_skip_events(&url).await {
            Ok(value) => parse_skip_events(&value),
            Err(e) => {
                debug!("No skip events for {}: {}", episode_id, e);
                BTreeMap::new()
            }
        }
    }

    // Ressource publique : ni jeton porteur ni signature CMS
    async fn fetch_skip_events(&self, url: &str) -> Result<Value> {
        debug!("GET {} (unsigned)", url);
        let response = self.api.http().get(url).send().await?;
        handle_response(response).await
    }
}

#[async_trait]
impl StreamResolver for CmsStreamResolver {
    async fn resolve(&self, request: &PlaybackRequest) -> Result<StreamDescriptor> {
        let streams = self.api.get_streams(&request.stream_id).await?;
        let (stream_url, adaptive) = select_stream(&streams, self.api.locale())
            .ok_or_else(|| CrunchyrollError::StreamUnavailable(request.stream_id.clone()))?;

        Ok(StreamDescriptor {
            stream_url,
            adaptive,
            subtitle_tracks: parse_subtitles(&streams),
            skip_windows: self.skip_windows(&request.episode_id).await,
            metadata: PlayableItem {
                content_id: request.episode_id.clone(),
                ..Default::default()
            },
        })
    }
}

/// Choisit l'URL du flux : HLS adaptatif sans sous-titres incrustés, sinon
/// incrustés dans la locale, sinon n'importe quelle variante
pub fn select_stream(streams: &Value, locale: &str) -> Option<(String, bool)> {
    let variants = streams.pointer("/streams/adaptive_hls")?.as_object()?;
    let url_of = |key: &str| {
        variants
            .get(key)
            .and_then(|v| v.get("url"))
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
    };

    url_of("")
        .or_else(|| url_of(locale))
        .or_else(|| variants.keys().find_map(|k| url_of(k.as_str())))
        .map(|url| (url, true))
}

/// Pistes de sous-titres proposées à côté du flux
pub fn parse_subtitles(streams: &Value) -> Vec<SubtitleTrack> {
    let Some(subtitles) = streams.get("subtitles").and_then(Value::as_object) else {
        return Vec::new();
    };

    subtitles
        .iter()
        .filter_map(|(locale, track)| {
            let url = track.get("url")?.as_str()?;
            Some(SubtitleTrack {
                locale: locale.clone(),
                url: url.to_string(),
                format: track
                    .get("format")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            })
        })
        .collect()
}

/// Extrait les fenêtres `{start, end}` d'une réponse de marqueurs de saut
pub fn parse_skip_events(value: &Value) -> BTreeMap<SkipKind, SkipWindow> {
    let Some(events) = value.as_object() else {
        return BTreeMap::new();
    };

    let mut windows = BTreeMap::new();
    for (kind, event) in events {
        let start = event.get("start").and_then(Value::as_f64);
        let end = event.get("end").and_then(Value::as_f64);
        match (start, end) {
            (Some(start), Some(end)) if start <= end => {
                windows.insert(SkipKind::from(kind.as_str()), SkipWindow::new(start, end));
            }
            (Some(_), Some(_)) => warn!("Ignoring inverted skip window '{}'", kind),
            _ => {}
        }
    }
    windows
}
