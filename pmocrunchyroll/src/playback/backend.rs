use crate::api::CrunchyrollApi;
use crate::error::Result;
use crate::models::{CatalogObject, Episode, PlayheadInfo, Series};
use async_trait::async_trait;

/// Appels distants utilisés pendant la lecture
#[async_trait]
pub trait PlaybackBackend: Send + Sync {
    async fn fetch_playhead(&self, content_id: &str) -> Result<Option<PlayheadInfo>>;

    async fn update_playhead(&self, content_id: &str, playhead: f64) -> Result<()>;

    async fn up_next(&self, content_id: &str) -> Result<Option<Episode>>;

    /// Épisode et série en cours de lecture
    async fn load_metadata(
        &self,
        episode_id: &str,
        series_id: Option<&str>,
    ) -> Result<(Option<Episode>, Option<Series>)>;
}

#[async_trait]
impl PlaybackBackend for CrunchyrollApi {
    async fn fetch_playhead(&self, content_id: &str) -> Result<Option<PlayheadInfo>> {
        self.get_playhead(content_id).await
    }

    async fn update_playhead(&self, content_id: &str, playhead: f64) -> Result<()> {
        CrunchyrollApi::update_playhead(self, content_id, playhead).await
    }

    async fn up_next(&self, content_id: &str) -> Result<Option<Episode>> {
        self.get_up_next(content_id).await
    }

    async fn load_metadata(
        &self,
        episode_id: &str,
        series_id: Option<&str>,
    ) -> Result<(Option<Episode>, Option<Series>)> {
        let mut ids = vec![episode_id];
        ids.extend(series_id);

        let mut episode = None;
        let mut series = None;
        for object in self.get_objects(&ids).await? {
            match object {
                CatalogObject::Episode(e) if e.id == episode_id => episode = Some(e),
                CatalogObject::Series(s) if Some(s.id.as_str()) == series_id => series = Some(s),
                _ => {}
            }
        }
        Ok((episode, series))
    }
}
