//! Positions de lecture (lecture et écriture)

use super::CrunchyrollApi;
use crate::error::Result;
use crate::models::{CatalogObject, HistoryEntry, HistoryPage, PlayheadInfo};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct PlayheadsResponse {
    #[serde(default)]
    data: Vec<PlayheadEntry>,
}

#[derive(Debug, Deserialize)]
struct PlayheadEntry {
    content_id: String,
    #[serde(default)]
    playhead: f64,
    #[serde(default)]
    fully_watched: bool,
}

impl CrunchyrollApi {
    /// Récupère les positions de lecture pour plusieurs contenus
    pub async fn get_playheads(&self, content_ids: &[&str]) -> Result<HashMap<String, PlayheadInfo>> {
        if content_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let account_id = self.auth().ensure_valid().await?.account_id;
        let ids = content_ids.join(",");
        let value = self
            .get_json(
                &self.endpoints().playheads(&account_id),
                &[("content_ids", ids.as_str())],
            )
            .await?;

        if value.is_null() {
            return Ok(HashMap::new());
        }

        let response: PlayheadsResponse = serde_json::from_value(value)?;
        debug!("Fetched {} playheads", response.data.len());

        Ok(response
            .data
            .into_iter()
            .map(|entry| {
                (
                    entry.content_id,
                    PlayheadInfo {
                        playhead: entry.playhead,
                        fully_watched: entry.fully_watched,
                    },
                )
            })
            .collect())
    }

    /// Position de lecture d'un seul contenu
    pub async fn get_playhead(&self, content_id: &str) -> Result<Option<PlayheadInfo>> {
        Ok(self.get_playheads(&[content_id]).await?.remove(content_id))
    }

    /// Historique de visionnage, page `page` (à partir de 1)
    ///
    /// Seuls les épisodes sont retenus ; les autres objets sont ignorés.
    pub async fn get_watch_history(&self, page: u32, page_size: u32) -> Result<HistoryPage> {
        let account_id = self.auth().ensure_valid().await?.account_id;
        let page = page.max(1).to_string();
        let page_size = page_size.to_string();
        let value = self
            .get_json(
                &self.endpoints().watch_history(&account_id),
                &[("page", page.as_str()), ("page_size", page_size.as_str())],
            )
            .await?;

        let entries: Vec<HistoryEntry> = value
            .get("data")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(|item| {
                let episode = match CatalogObject::decode(item) {
                    Ok(object) => object.into_episode()?,
                    Err(e) => {
                        warn!("Skipping history entry: {}", e);
                        return None;
                    }
                };
                Some(HistoryEntry {
                    episode,
                    playhead: PlayheadInfo {
                        playhead: item.get("playhead").and_then(Value::as_f64).unwrap_or(0.0),
                        fully_watched: item
                            .get("fully_watched")
                            .and_then(Value::as_bool)
                            .unwrap_or(false),
                    },
                })
            })
            .collect();

        Ok(HistoryPage {
            total: value.get("total").and_then(Value::as_u64).unwrap_or(0) as u32,
            entries,
        })
    }

    /// Envoie la position de lecture courante (en secondes entières)
    pub async fn update_playhead(&self, content_id: &str, playhead: f64) -> Result<()> {
        let account_id = self.auth().ensure_valid().await?.account_id;
        let body = json!({
            "playhead": playhead.trunc() as u64,
            "content_id": content_id,
        });
        self.post_json(&self.endpoints().playheads(&account_id), &body)
            .await?;
        debug!("Playhead {} sent for {}", playhead, content_id);
        Ok(())
    }
}
