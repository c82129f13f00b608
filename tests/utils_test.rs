use lofisync::types::{Track, TrackSet};
use lofisync::utils::*;

// Helper function to create a test track set
fn create_track_set(tracks: &[(&str, u64)]) -> TrackSet {
    tracks
        .iter()
        .map(|(id, duration)| Track::new(*id, *duration))
        .collect()
}

#[test]
fn test_generate_state() {
    let state = generate_state();

    // 16 random bytes encode to 22 characters without padding
    assert_eq!(state.len(), 22);

    // Should be URL-safe base64
    assert!(
        state
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    );

    // Two generated states should be different
    let state2 = generate_state();
    assert_ne!(state, state2);
}

#[test]
fn test_duration_hours() {
    // 90 minutes
    assert_eq!(duration_hours(5_400_000), 1.5);
    assert_eq!(duration_hours(0), 0.0);
    assert_eq!(duration_hours(7_200_000), 2.0);
}

#[test]
fn test_name_template_default_rendering() {
    let template = NameTemplate::parse("Lofi Mix ({hours} hours)").unwrap();

    assert_eq!(template.render(1.5), "Lofi Mix (1.5 hours)");
    // Whole numbers drop the trailing .0
    assert_eq!(template.render(2.0), "Lofi Mix (2 hours)");
    // Rounded to one decimal
    assert_eq!(template.render(1.26), "Lofi Mix (1.3 hours)");
}

#[test]
fn test_name_template_precision() {
    let template = NameTemplate::parse("{hours:.2}h of lofi").unwrap();

    assert_eq!(template.render(1.5), "1.50h of lofi");
    assert_eq!(template.to_string(), "{hours:.2}h of lofi");
}

#[test]
fn test_name_template_rejects_invalid() {
    // No placeholder
    assert!(NameTemplate::parse("Lofi Mix").is_err());

    // Two placeholders
    assert!(NameTemplate::parse("{hours} and {hours}").is_err());

    // Unterminated
    assert!(NameTemplate::parse("Mix {hours").is_err());

    // Unsupported format spec
    assert!(NameTemplate::parse("Mix {hours:x}").is_err());
    assert!(NameTemplate::parse("Mix {hours:.99}").is_err());
}

#[test]
fn test_format_track_duration() {
    assert_eq!(format_track_duration(0), "0:00");
    assert_eq!(format_track_duration(65_000), "1:05");
    assert_eq!(format_track_duration(185_999), "3:05");
}

#[test]
fn test_track_set_union_and_difference() {
    let source = create_track_set(&[("a", 1_000), ("b", 2_000), ("c", 3_000)]);
    let destination = create_track_set(&[("b", 2_000), ("d", 4_000)]);

    let new_tracks = source.difference(&destination);
    assert_eq!(new_tracks.ids(), vec!["a", "c"]);

    let merged = destination.union(&new_tracks);
    assert_eq!(merged.len(), 4);
    assert_eq!(merged.total_duration_ms(), 10_000);

    // Nothing left to add once merged
    assert!(source.difference(&merged).is_empty());
}
