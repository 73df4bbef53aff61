//! Track metadata from provider payloads
//!
//! Recognition payloads nest the same facts in provider-specific places
//! (top level, `deezer`, `apple_music`, `spotify`, a nested `result`).
//! [`ProviderPayload`] is a typed view of those places; every field is
//! optional and a field holding an unexpected JSON type reads as absent, so
//! one odd provider block never hides the others. Empty strings also read as
//! absent.

use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;

use crate::models::{ConsolidatedTrack, DetectionEntry};

/// Shortest string accepted as an ISRC
pub const ISRC_MIN_LEN: usize = 12;

/// Deserialize `T`, or `None` if the value has another shape
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Artist credit: a plain name or a list of names / `{name}` objects
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ArtistCredit {
    Name(String),
    List(Vec<Value>),
}

impl ArtistCredit {
    fn joined(&self) -> Option<String> {
        match self {
            ArtistCredit::Name(name) => non_empty(Some(name)),
            ArtistCredit::List(items) => {
                let names: Vec<&str> = items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s.as_str()),
                        Value::Object(_) => item.get("name").and_then(Value::as_str),
                        _ => None,
                    })
                    .filter(|s| !s.is_empty())
                    .collect();
                if names.is_empty() {
                    None
                } else {
                    Some(names.join(", "))
                }
            }
        }
    }
}

/// Year given as text or as a number
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Year {
    Number(i64),
    Text(String),
}

impl Year {
    fn as_text(&self) -> Option<String> {
        match self {
            Year::Number(n) => Some(n.to_string()),
            Year::Text(s) => non_empty(Some(s)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalIds {
    #[serde(default, deserialize_with = "lenient")]
    pub isrc: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpotifyInfo {
    #[serde(default, deserialize_with = "lenient")]
    pub isrc: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub external_ids: Option<ExternalIds>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeezerInfo {
    #[serde(default, deserialize_with = "lenient")]
    pub isrc: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub link: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub release_date: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub data: Option<Vec<ExternalIds>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppleMusicInfo {
    #[serde(default, deserialize_with = "lenient")]
    pub isrc: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient", rename = "releaseDate")]
    pub release_date: Option<String>,
}

/// Typed, lenient view of one provider payload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderPayload {
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub song: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub track: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    pub artist: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub artists: Option<ArtistCredit>,
    #[serde(default, deserialize_with = "lenient")]
    pub performer: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    pub album: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub genre: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    pub isrc: Option<String>,
    #[serde(default, deserialize_with = "lenient", rename = "ISRC")]
    pub isrc_upper: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub external_ids: Option<ExternalIds>,

    #[serde(default, deserialize_with = "lenient")]
    pub release_date: Option<String>,
    #[serde(default, deserialize_with = "lenient", rename = "releaseDate")]
    pub release_date_camel: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub year: Option<Year>,

    #[serde(default, deserialize_with = "lenient")]
    pub song_link: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub link: Option<String>,

    #[serde(default, deserialize_with = "lenient")]
    pub spotify: Option<SpotifyInfo>,
    #[serde(default, deserialize_with = "lenient")]
    pub deezer: Option<DeezerInfo>,
    #[serde(default, deserialize_with = "lenient")]
    pub apple_music: Option<AppleMusicInfo>,

    /// Nested result block some payloads carry
    #[serde(default, deserialize_with = "lenient")]
    pub result: Option<Box<ProviderPayload>>,
}

impl ProviderPayload {
    /// View over `value`; anything but an object gives an empty view
    pub fn from_value(value: &Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    fn nested(&self) -> Option<&ProviderPayload> {
        self.result.as_deref()
    }

    /// `title`, `name`, `song`, `result.title`, `track`
    pub fn title(&self) -> Option<String> {
        first_of([
            self.title.as_ref(),
            self.name.as_ref(),
            self.song.as_ref(),
            self.nested().and_then(|r| r.title.as_ref()),
            self.track.as_ref(),
        ])
    }

    /// `artist`, `artists` (joined), `performer`, `result.artist`
    pub fn artist(&self) -> Option<String> {
        non_empty(self.artist.as_ref())
            .or_else(|| self.artists.as_ref().and_then(ArtistCredit::joined))
            .or_else(|| non_empty(self.performer.as_ref()))
            .or_else(|| non_empty(self.nested().and_then(|r| r.artist.as_ref())))
    }

    /// First present ISRC candidate, if it is long enough
    ///
    /// A short first candidate is rejected outright; later candidates are
    /// not consulted.
    pub fn isrc(&self) -> Option<String> {
        let spotify = self.spotify.as_ref();
        let deezer = self.deezer.as_ref();
        let candidate = first_of([
            self.isrc.as_ref(),
            self.isrc_upper.as_ref(),
            self.external_ids.as_ref().and_then(|e| e.isrc.as_ref()),
            spotify.and_then(|s| s.isrc.as_ref()),
            spotify
                .and_then(|s| s.external_ids.as_ref())
                .and_then(|e| e.isrc.as_ref()),
            deezer.and_then(|d| d.isrc.as_ref()),
            deezer
                .and_then(|d| d.data.as_ref())
                .and_then(|data| data.first())
                .and_then(|entry| entry.isrc.as_ref()),
            self.apple_music.as_ref().and_then(|a| a.isrc.as_ref()),
            self.nested().and_then(|r| r.isrc.as_ref()),
        ])?;

        if candidate.chars().count() >= ISRC_MIN_LEN {
            Some(candidate)
        } else {
            tracing::debug!(isrc = %candidate, "Rejecting short ISRC");
            None
        }
    }

    /// `release_date`, `releaseDate`, `deezer.release_date`,
    /// `apple_music.releaseDate`, `result.release_date`, then `year`
    pub fn release_date(&self) -> Option<String> {
        first_of([
            self.release_date.as_ref(),
            self.release_date_camel.as_ref(),
            self.deezer.as_ref().and_then(|d| d.release_date.as_ref()),
            self.apple_music.as_ref().and_then(|a| a.release_date.as_ref()),
            self.nested().and_then(|r| r.release_date.as_ref()),
        ])
        .or_else(|| self.year.as_ref().and_then(Year::as_text))
    }

    /// `song_link`, `deezer.link`, `apple_music.url`, `result.song_link`,
    /// `url`, `link`
    pub fn link(&self) -> Option<String> {
        first_of([
            self.song_link.as_ref(),
            self.deezer.as_ref().and_then(|d| d.link.as_ref()),
            self.apple_music.as_ref().and_then(|a| a.url.as_ref()),
            self.nested().and_then(|r| r.song_link.as_ref()),
            self.url.as_ref(),
            self.link.as_ref(),
        ])
    }

    pub fn album(&self) -> Option<String> {
        first_of([self.album.as_ref(), self.nested().and_then(|r| r.album.as_ref())])
    }

    pub fn label(&self) -> Option<String> {
        first_of([self.label.as_ref(), self.nested().and_then(|r| r.label.as_ref())])
    }

    pub fn genre(&self) -> Option<String> {
        first_of([self.genre.as_ref(), self.nested().and_then(|r| r.genre.as_ref())])
    }
}

/// Build a track candidate from one detection
pub fn enrich(entry: &DetectionEntry) -> ConsolidatedTrack {
    let payload = ProviderPayload::from_value(&entry.metadata);
    ConsolidatedTrack {
        start_seconds: entry.start_seconds,
        end_seconds: entry.end_seconds,
        title: payload.title(),
        artist: payload.artist(),
        isrc: payload.isrc(),
        release_date: payload.release_date(),
        source_metadata: Some(entry.metadata.clone()),
        first_segment: entry.segment_index,
    }
}

/// Track candidates for every detection, in input order
pub fn enrich_all(entries: &[DetectionEntry]) -> Vec<ConsolidatedTrack> {
    entries.iter().map(enrich).collect()
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|s| !s.is_empty()).cloned()
}

fn first_of<const N: usize>(candidates: [Option<&String>; N]) -> Option<String> {
    candidates.into_iter().find_map(non_empty)
}
