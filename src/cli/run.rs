use crate::{cli::App, config::Config, info, scheduler::Scheduler, success};

pub async fn run(config: Config) {
    let app = App::from_config(&config);
    info!(
        "Mirroring {} into {} every {} seconds",
        config.source_playlist,
        config.destination_playlist,
        config.interval.as_secs()
    );
    Scheduler::new(app.engine, app.tokens, &config).run().await;
}

pub async fn sync_once(config: Config) {
    let app = App::from_config(&config);
    let mut scheduler = Scheduler::new(app.engine, app.tokens, &config);

    if let Some(result) = scheduler.run_cycle().await {
        if result.new_tracks.is_empty() {
            success!("Destination playlist is up to date");
        } else {
            success!(
                "{} new tracks, {} added, playlist is now {:.2} hours",
                result.new_tracks.len(),
                result.inserted.len(),
                result.hours()
            );
        }
    }
}
