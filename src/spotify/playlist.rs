use crate::{
    error::ApiError,
    spotify::client::{ApiClient, ApiRequest, Paged},
    types::{
        AddTrackToPlaylistRequest, PlaylistItem, PlaylistTracksPage, RenamePlaylistRequest, Track,
        TrackSet,
    },
    warning,
};

const PAGE_LIMIT: u32 = 100;

impl Paged for PlaylistTracksPage {
    type Item = PlaylistItem;

    fn into_parts(self) -> (Vec<PlaylistItem>, Option<String>) {
        (self.items, self.next)
    }
}

/// Result of a chunked bulk insert. Chunks are independent: a failed chunk
/// leaves earlier (and later) successful chunks in place.
#[derive(Debug, Default)]
pub struct InsertReport {
    pub inserted: Vec<String>,
    pub failed: Vec<String>,
    pub errors: Vec<ApiError>,
    pub requests: usize,
}

impl InsertReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Every track of a playlist, following all pages.
///
/// Entries without a track id (local files, removed tracks) are skipped.
pub async fn get_tracks(api: &ApiClient, playlist_id: &str) -> Result<TrackSet, ApiError> {
    let first = ApiRequest::get(format!(
        "/playlists/{playlist_id}/tracks?fields=next,items(track(id,duration_ms))&limit={PAGE_LIMIT}"
    ));

    let items = api.fetch_all::<PlaylistTracksPage>(first).await?;
    Ok(items
        .into_iter()
        .filter_map(|item| item.track)
        .filter_map(|track| track.id.map(|id| Track::new(id, track.duration_ms)))
        .collect())
}

/// Appends `tracks` to a playlist in requests of at most `chunk_size` uris.
pub async fn add_tracks(
    api: &ApiClient,
    playlist_id: &str,
    tracks: &[Track],
    chunk_size: usize,
) -> InsertReport {
    let path = format!("/playlists/{playlist_id}/tracks");
    let chunk_count = tracks.len().div_ceil(chunk_size.max(1));
    let mut report = InsertReport::default();

    for (index, chunk) in tracks.chunks(chunk_size.max(1)).enumerate() {
        let body = AddTrackToPlaylistRequest {
            uris: chunk.iter().map(Track::uri).collect(),
        };

        report.requests += 1;
        let outcome = match ApiRequest::post(&path, &body) {
            Ok(request) => api.call(&request).await.map(|_| ()),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => report.inserted.extend(chunk.iter().map(|t| t.id.clone())),
            Err(e) => {
                warning!(
                    "Chunk {}/{} ({} tracks) could not be added: {}",
                    index + 1,
                    chunk_count,
                    chunk.len(),
                    e
                );
                report.failed.extend(chunk.iter().map(|t| t.id.clone()));
                report.errors.push(e);
            }
        }
    }

    report
}

/// Sets the playlist's display name.
pub async fn rename(api: &ApiClient, playlist_id: &str, name: &str) -> Result<(), ApiError> {
    let request = ApiRequest::put(
        format!("/playlists/{playlist_id}"),
        &RenamePlaylistRequest {
            name: name.to_string(),
        },
    )?;
    api.call(&request).await?;
    Ok(())
}
