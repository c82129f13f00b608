//! One comparison-and-merge cycle.
//!
//! A cycle reads both playlists, appends whatever the source has that the
//! destination lacks, and renames the destination after its total runtime.
//! Track sets are rebuilt from the provider on every cycle.

use crate::{
    config::Config,
    error::{ApiError, AuthError, SyncError},
    failure, info,
    spotify::{client::ApiClient, playlist},
    success,
    types::{SyncResult, Track, TrackSet},
    utils::{self, NameTemplate},
};

/// Aggregate length of the destination once `new_tracks` are added.
pub fn projected_duration_ms(destination: &TrackSet, new_tracks: &TrackSet) -> u64 {
    destination.union(new_tracks).total_duration_ms()
}

#[derive(Clone)]
pub struct SyncEngine {
    api: ApiClient,
    source: String,
    destination: String,
    template: NameTemplate,
    chunk_size: usize,
}

impl SyncEngine {
    pub fn new(api: ApiClient, config: &Config) -> Self {
        Self {
            api,
            source: config.source_playlist.clone(),
            destination: config.destination_playlist.clone(),
            template: config.name_template.clone(),
            chunk_size: config.chunk_size,
        }
    }

    pub fn template(&self) -> &NameTemplate {
        &self.template
    }

    /// Reads source and destination concurrently. Either failure aborts.
    pub async fn fetch(&self) -> Result<(TrackSet, TrackSet), SyncError> {
        let source = async {
            playlist::get_tracks(&self.api, &self.source)
                .await
                .map_err(|e| fetch_error(&self.source, e))
        };
        let destination = async {
            playlist::get_tracks(&self.api, &self.destination)
                .await
                .map_err(|e| fetch_error(&self.destination, e))
        };

        tokio::try_join!(source, destination)
    }

    /// Runs one cycle.
    ///
    /// Insert and rename failures are logged and reflected in the result;
    /// only a failed read aborts the cycle. The new name is computed over
    /// destination ∪ new tracks even when some inserts failed.
    pub async fn run_cycle(&self) -> Result<SyncResult, SyncError> {
        info!("Checking playlist for new content...");
        let (source, destination) = self.fetch().await?;

        let new_tracks = source.difference(&destination);
        if new_tracks.is_empty() {
            info!("No new tracks in source playlist");
            return Ok(SyncResult {
                total_duration_ms: destination.total_duration_ms(),
                ..SyncResult::default()
            });
        }

        info!(
            "Found {} new tracks! Adding them to your playlist...",
            new_tracks.len()
        );
        let pending: Vec<Track> = new_tracks.iter().cloned().collect();
        let report =
            playlist::add_tracks(&self.api, &self.destination, &pending, self.chunk_size).await;

        if report.is_complete() {
            success!("Added {} tracks", report.inserted.len());
        } else {
            failure!(
                "Added {} of {} tracks, {} failed",
                report.inserted.len(),
                new_tracks.len(),
                report.failed.len()
            );
        }

        let total_duration_ms = projected_duration_ms(&destination, &new_tracks);
        let name = self
            .template
            .render(utils::duration_hours(total_duration_ms));

        let renamed = match playlist::rename(&self.api, &self.destination, &name).await {
            Ok(()) => {
                success!("Playlist renamed to '{}'", name);
                true
            }
            Err(e) => {
                failure!("Failed to rename playlist: {}", e);
                false
            }
        };

        Ok(SyncResult {
            new_tracks,
            inserted: report.inserted,
            failed: report.failed,
            total_duration_ms,
            playlist_name: Some(name),
            renamed,
        })
    }
}

fn fetch_error(playlist: &str, err: ApiError) -> SyncError {
    match err {
        ApiError::Auth(auth) => SyncError::Auth(auth),
        other => SyncError::Fetch {
            playlist: playlist.to_string(),
            source: other,
        },
    }
}

impl SyncError {
    /// True when the cycle cannot proceed until the user authorizes again.
    pub fn needs_authorization(&self) -> bool {
        matches!(self, SyncError::Auth(AuthError::NoRefreshCredential))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projected_duration_counts_each_id_once() {
        let destination: TrackSet = vec![Track::new("a", 1_000), Track::new("b", 2_000)]
            .into_iter()
            .collect();
        let new_tracks: TrackSet = vec![Track::new("b", 2_000), Track::new("c", 4_000)]
            .into_iter()
            .collect();

        assert_eq!(projected_duration_ms(&destination, &new_tracks), 7_000);
    }
}
