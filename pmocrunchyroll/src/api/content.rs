//! Contenus : objets du catalogue, épisode suivant, flux

use super::CrunchyrollApi;
use crate::error::{CrunchyrollError, Result};
use crate::models::{CatalogObject, Episode, Series};
use serde_json::Value;
use tracing::{debug, warn};

fn data_items(value: &Value) -> &[Value] {
    value
        .get("data")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

impl CrunchyrollApi {
    /// Récupère des objets du catalogue par leurs ids
    ///
    /// Les éléments dont le type n'est pas reconnu sont ignorés (avec un log).
    pub async fn get_objects(&self, ids: &[&str]) -> Result<Vec<CatalogObject>> {
        let ids: Vec<&str> = ids.iter().copied().filter(|id| !id.is_empty()).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let value = self
            .get_json(&self.endpoints().objects(&ids), &[("ratings", "true")])
            .await?;

        let objects = data_items(&value)
            .iter()
            .filter_map(|item| match CatalogObject::decode(item) {
                Ok(object) => Some(object),
                Err(e) => {
                    warn!("Skipping catalog object: {}", e);
                    None
                }
            })
            .collect::<Vec<_>>();

        debug!("Fetched {} catalog objects", objects.len());
        Ok(objects)
    }

    /// Récupère un épisode
    pub async fn get_episode(&self, episode_id: &str) -> Result<Episode> {
        self.get_objects(&[episode_id])
            .await?
            .into_iter()
            .find(|o| o.id() == episode_id)
            .and_then(CatalogObject::into_episode)
            .ok_or_else(|| CrunchyrollError::decode(format!("{} is not an episode", episode_id)))
    }

    /// Récupère une série
    pub async fn get_series(&self, series_id: &str) -> Result<Series> {
        self.get_objects(&[series_id])
            .await?
            .into_iter()
            .find(|o| o.id() == series_id)
            .and_then(CatalogObject::into_series)
            .ok_or_else(|| CrunchyrollError::decode(format!("{} is not a series", series_id)))
    }

    /// Épisode suivant, s'il existe
    pub async fn get_up_next(&self, content_id: &str) -> Result<Option<Episode>> {
        let value = match self.get_json(&self.endpoints().up_next(content_id), &[]).await {
            Ok(value) => value,
            Err(CrunchyrollError::Api { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        match data_items(&value).first() {
            Some(item) => Ok(CatalogObject::decode(item)?.into_episode()),
            None => Ok(None),
        }
    }

    /// Description brute des flux d'une vidéo
    pub async fn get_streams(&self, stream_id: &str) -> Result<Value> {
        let bucket = self.auth().ensure_valid().await?.cms.bucket;
        self.get_json(&self.endpoints().streams(&bucket, stream_id), &[])
            .await
    }
}
