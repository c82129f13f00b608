use tabled::Table;

use crate::{
    cli::{App, spinner},
    config::Config,
    error, info, scheduler, success,
    sync::projected_duration_ms,
    types::PendingTrackRow,
    utils,
};

pub async fn diff(config: Config) {
    let app = App::from_config(&config);

    if let Err(e) = scheduler::acquire_token(&app.tokens, &config.retry).await {
        error!(
            "Failed to obtain an access token. Please run lofisync auth\n Error: {}",
            e
        );
    }

    let pb = spinner("Fetching playlists...");
    let fetched = app.engine.fetch().await;
    pb.finish_and_clear();

    let (source, destination) = match fetched {
        Ok(sets) => sets,
        Err(e) => error!("{}", e),
    };

    let pending = source.difference(&destination);
    if pending.is_empty() {
        success!(
            "Destination playlist is up to date ({} tracks)",
            destination.len()
        );
        return;
    }

    let rows: Vec<PendingTrackRow> = pending
        .iter()
        .map(|t| PendingTrackRow {
            id: t.id.clone(),
            duration: utils::format_track_duration(t.duration_ms),
        })
        .collect();
    println!("{}", Table::new(rows));

    let hours = utils::duration_hours(projected_duration_ms(&destination, &pending));
    info!(
        "{} tracks pending, playlist would be renamed to '{}'",
        pending.len(),
        app.engine.template().render(hours)
    );
}
