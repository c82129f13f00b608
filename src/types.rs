use std::{
    collections::HashSet,
    hash::{Hash, Hasher},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// Short-lived bearer credential, held in memory only. The refresh
/// credential never leaves the credential store as anything but a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub value: String,
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn access(value: impl Into<String>, expiry: Option<DateTime<Utc>>) -> Self {
        Self {
            value: value.into(),
            expiry,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expiry.is_some_and(|at| Utc::now() >= at)
    }
}

/// A playlist entry. Two tracks are the same track iff their ids match;
/// the duration is payload and takes no part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub duration_ms: u64,
}

impl Track {
    pub fn new(id: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            id: id.into(),
            duration_ms,
        }
    }

    pub fn uri(&self) -> String {
        format!("spotify:track:{}", self.id)
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}

impl Hash for Track {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Tracks uniqued by id, kept in first-seen order so inserts follow the
/// order of the source playlist.
#[derive(Debug, Clone, Default)]
pub struct TrackSet {
    tracks: Vec<Track>,
    ids: HashSet<String>,
}

impl TrackSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a track unless one with the same id is already present.
    /// Returns whether the track was added.
    pub fn insert(&mut self, track: Track) -> bool {
        if self.ids.insert(track.id.clone()) {
            self.tracks.push(track);
            true
        } else {
            false
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn ids(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.id.clone()).collect()
    }

    /// Tracks of `self` whose id does not occur in `other`.
    pub fn difference(&self, other: &TrackSet) -> TrackSet {
        self.tracks
            .iter()
            .filter(|t| !other.contains(&t.id))
            .cloned()
            .collect()
    }

    pub fn union(&self, other: &TrackSet) -> TrackSet {
        let mut merged = self.clone();
        merged.extend(other.tracks.iter().cloned());
        merged
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.tracks.iter().map(|t| t.duration_ms).sum()
    }
}

impl FromIterator<Track> for TrackSet {
    fn from_iter<I: IntoIterator<Item = Track>>(iter: I) -> Self {
        let mut set = TrackSet::new();
        set.extend(iter);
        set
    }
}

impl Extend<Track> for TrackSet {
    fn extend<I: IntoIterator<Item = Track>>(&mut self, iter: I) {
        for track in iter {
            self.insert(track);
        }
    }
}

impl IntoIterator for TrackSet {
    type Item = Track;
    type IntoIter = std::vec::IntoIter<Track>;

    fn into_iter(self) -> Self::IntoIter {
        self.tracks.into_iter()
    }
}

/// Outcome of one comparison-and-merge cycle.
#[derive(Debug, Clone, Default)]
pub struct SyncResult {
    /// Source minus destination, by id.
    pub new_tracks: TrackSet,
    /// Ids the provider accepted.
    pub inserted: Vec<String>,
    /// Ids whose chunk failed permanently.
    pub failed: Vec<String>,
    /// Aggregate over destination ∪ new tracks.
    pub total_duration_ms: u64,
    pub playlist_name: Option<String>,
    pub renamed: bool,
}

impl SyncResult {
    pub fn hours(&self) -> f64 {
        crate::utils::duration_hours(self.total_duration_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistTracksPage {
    pub items: Vec<PlaylistItem>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub track: Option<TrackObject>,
}

/// Local files and unavailable entries come back with a null id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackObject {
    pub id: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddTrackToPlaylistRequest {
    pub uris: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenamePlaylistRequest {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Tabled)]
pub struct PendingTrackRow {
    pub id: String,
    pub duration: String,
}
