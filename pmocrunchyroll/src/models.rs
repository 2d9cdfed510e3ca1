//! Structures de données échangées avec Crunchyroll et avec le lecteur hôte

use crate::error::{CrunchyrollError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Désérialiseur flexible pour les IDs qui peuvent être des strings ou des integers
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(Error::custom("ID must be a string or number")),
    }
}

/// Type d'une fenêtre de saut
///
/// L'ordre des variantes fixe l'ordre (stable) dans lequel plusieurs fenêtres
/// éligibles au même instant sont proposées.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SkipKind {
    Recap,
    Intro,
    Credits,
    Preview,
    Other(String),
}

impl SkipKind {
    pub fn as_str(&self) -> &str {
        match self {
            SkipKind::Recap => "recap",
            SkipKind::Intro => "intro",
            SkipKind::Credits => "credits",
            SkipKind::Preview => "preview",
            SkipKind::Other(s) => s,
        }
    }
}

impl From<&str> for SkipKind {
    fn from(s: &str) -> Self {
        match s {
            "recap" => SkipKind::Recap,
            "intro" => SkipKind::Intro,
            "credits" => SkipKind::Credits,
            "preview" => SkipKind::Preview,
            other => SkipKind::Other(other.to_string()),
        }
    }
}

impl From<String> for SkipKind {
    fn from(s: String) -> Self {
        SkipKind::from(s.as_str())
    }
}

impl From<SkipKind> for String {
    fn from(kind: SkipKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for SkipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intervalle `[start, end]` (secondes) éligible à une proposition de saut
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkipWindow {
    pub start: f64,
    pub end: f64,
}

impl SkipWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Vérifie si la position (tronquée à la seconde) est dans la fenêtre
    pub fn contains(&self, time: f64) -> bool {
        let t = time.trunc();
        self.start <= t && t <= self.end
    }

    pub fn length(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// Piste de sous-titres
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub locale: String,
    pub url: String,
    #[serde(default)]
    pub format: Option<String>,
}

/// Métadonnées de l'élément lu, transmises au lecteur hôte
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayableItem {
    pub content_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub series_title: Option<String>,
    #[serde(default)]
    pub episode_number: Option<u32>,
    /// Durée connue en secondes
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

/// Résultat de la résolution d'un flux, immuable pour une tentative de lecture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub stream_url: String,
    /// Le flux peut être confié au lecteur en mode adaptatif (HLS/DASH)
    #[serde(default)]
    pub adaptive: bool,
    #[serde(default)]
    pub subtitle_tracks: Vec<SubtitleTrack>,
    #[serde(default)]
    pub skip_windows: BTreeMap<SkipKind, SkipWindow>,
    #[serde(default)]
    pub metadata: PlayableItem,
}

/// Position de lecture connue côté serveur
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayheadInfo {
    pub playhead: f64,
    #[serde(default)]
    pub fully_watched: bool,
}

/// Entrée de l'historique de visionnage
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub episode: Episode,
    pub playhead: PlayheadInfo,
}

/// Page de l'historique de visionnage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryPage {
    /// Nombre total d'entrées côté serveur
    pub total: u32,
    pub entries: Vec<HistoryEntry>,
}

/// Point d'entrée d'une lecture
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackRequest {
    pub series_id: Option<String>,
    pub episode_id: String,
    pub stream_id: String,
    #[serde(default)]
    pub resume_requested: bool,
    /// Position déjà connue par l'appelant (données de liste, historique...)
    #[serde(default)]
    pub playhead: Option<f64>,
}

/// Série
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Saison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Season {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub series_id: Option<String>,
    #[serde(default)]
    pub season_number: Option<u32>,
}

/// Film
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Durée en secondes
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub stream_id: Option<String>,
}

/// Épisode
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub title: String,
    pub series_id: Option<String>,
    pub series_title: Option<String>,
    pub season_id: Option<String>,
    pub episode_number: Option<u32>,
    /// Durée en secondes
    pub duration: Option<f64>,
    pub stream_id: Option<String>,
    pub thumbnail: Option<String>,
}

impl Episode {
    /// Métadonnées à transmettre au lecteur
    pub fn to_playable(&self) -> PlayableItem {
        PlayableItem {
            content_id: self.id.clone(),
            title: self.title.clone(),
            series_title: self.series_title.clone(),
            episode_number: self.episode_number,
            duration: self.duration,
            thumbnail: self.thumbnail.clone(),
        }
    }
}

// Forme brute d'un épisode : les métadonnées sont imbriquées dans
// `episode_metadata` et l'id du flux n'apparaît que dans un lien.
#[derive(Debug, Deserialize)]
struct RawEpisode {
    #[serde(deserialize_with = "deserialize_id")]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    episode_metadata: Option<RawEpisodeMetadata>,
    #[serde(default)]
    streams_link: Option<String>,
    #[serde(default, rename = "__links__")]
    links: Option<Value>,
    #[serde(default)]
    images: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEpisodeMetadata {
    #[serde(default)]
    series_id: Option<String>,
    #[serde(default)]
    series_title: Option<String>,
    #[serde(default)]
    season_id: Option<String>,
    #[serde(default)]
    episode_number: Option<u32>,
    #[serde(default)]
    duration_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawMovie {
    #[serde(deserialize_with = "deserialize_id")]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    movie_metadata: Option<RawMovieMetadata>,
    #[serde(default)]
    streams_link: Option<String>,
    #[serde(default, rename = "__links__")]
    links: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMovieMetadata {
    #[serde(default)]
    duration_ms: Option<u64>,
}

/// Extrait l'id de flux d'un lien `.../videos/<id>/streams`
pub fn stream_id_from_link(link: &str) -> Option<String> {
    let (_, rest) = link.split_once("/videos/")?;
    let (id, tail) = rest.split_once('/')?;
    (tail.starts_with("streams") && !id.is_empty()).then(|| id.to_string())
}

fn stream_id_from(streams_link: Option<&str>, links: Option<&Value>) -> Option<String> {
    links
        .and_then(|l| l.pointer("/streams/href"))
        .and_then(Value::as_str)
        .and_then(stream_id_from_link)
        .or_else(|| streams_link.and_then(stream_id_from_link))
}

fn thumbnail_from(images: Option<&Value>) -> Option<String> {
    // images.thumbnail = [[{source, width, height}, ...]] ; on prend la plus grande
    images?
        .pointer("/thumbnail/0")?
        .as_array()?
        .last()?
        .get("source")?
        .as_str()
        .map(str::to_string)
}

impl From<RawEpisode> for Episode {
    fn from(raw: RawEpisode) -> Self {
        let meta = raw.episode_metadata.unwrap_or_default();
        Self {
            stream_id: stream_id_from(raw.streams_link.as_deref(), raw.links.as_ref()),
            thumbnail: thumbnail_from(raw.images.as_ref()),
            id: raw.id,
            title: raw.title,
            series_id: meta.series_id,
            series_title: meta.series_title,
            season_id: meta.season_id,
            episode_number: meta.episode_number,
            duration: meta.duration_ms.map(|ms| ms as f64 / 1000.0),
        }
    }
}

impl From<RawMovie> for Movie {
    fn from(raw: RawMovie) -> Self {
        Self {
            stream_id: stream_id_from(raw.streams_link.as_deref(), raw.links.as_ref()),
            id: raw.id,
            title: raw.title,
            duration: raw
                .movie_metadata
                .and_then(|m| m.duration_ms)
                .map(|ms| ms as f64 / 1000.0),
        }
    }
}

/// Objet du catalogue, décodé selon son étiquette de type
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogObject {
    Series(Series),
    Season(Season),
    Episode(Episode),
    Movie(Movie),
}

impl CatalogObject {
    /// Décode un objet brut
    ///
    /// Le type est lu, dans l'ordre, dans `panel.type`, `type` puis `__class__`.
    /// Quand il provient de `panel`, c'est le contenu de `panel` qui est décodé.
    /// Aucun champ reconnu, ou une étiquette inconnue, donne une erreur
    /// [`CrunchyrollError::Decode`].
    pub fn decode(item: &Value) -> Result<Self> {
        let panel = item.get("panel").filter(|p| p.is_object());
        let (kind, body) = match panel.and_then(|p| p.get("type")).and_then(Value::as_str) {
            Some(kind) => (kind, panel.unwrap_or(item)),
            None => {
                let kind = ["type", "__class__"]
                    .iter()
                    .find_map(|field| item.get(*field).and_then(Value::as_str))
                    .ok_or_else(|| {
                        CrunchyrollError::decode("no panel.type, type or __class__ field")
                    })?;
                (kind, item)
            }
        };

        let object = match kind {
            "series" => CatalogObject::Series(serde_json::from_value(body.clone())?),
            "season" => CatalogObject::Season(serde_json::from_value(body.clone())?),
            "episode" => {
                CatalogObject::Episode(serde_json::from_value::<RawEpisode>(body.clone())?.into())
            }
            "movie" => {
                CatalogObject::Movie(serde_json::from_value::<RawMovie>(body.clone())?.into())
            }
            other => {
                return Err(CrunchyrollError::decode(format!(
                    "unknown catalog object type '{}'",
                    other
                )));
            }
        };
        Ok(object)
    }

    pub fn id(&self) -> &str {
        match self {
            CatalogObject::Series(s) => &s.id,
            CatalogObject::Season(s) => &s.id,
            CatalogObject::Episode(e) => &e.id,
            CatalogObject::Movie(m) => &m.id,
        }
    }

    pub fn into_episode(self) -> Option<Episode> {
        match self {
            CatalogObject::Episode(e) => Some(e),
            _ => None,
        }
    }

    pub fn into_series(self) -> Option<Series> {
        match self {
            CatalogObject::Series(s) => Some(s),
            _ => None,
        }
    }
}
