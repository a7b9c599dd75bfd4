//! Video metadata tests.

use frame2img::VideoMetadata;

#[test]
fn unknown_metadata() {
    let metadata = VideoMetadata::unknown();
    assert!(metadata.is_unknown());
    assert_eq!(metadata.known_frame_rate(), None);
    assert_eq!(metadata.known_duration(), None);
    assert_eq!(metadata.summary(), "metadata unavailable");
}

#[test]
fn degenerate_values_are_treated_as_unknown() {
    let metadata = VideoMetadata {
        duration_seconds: Some(0.0),
        frame_rate: Some(f64::NAN),
        ..VideoMetadata::default()
    };
    assert_eq!(metadata.known_frame_rate(), None);
    assert_eq!(metadata.known_duration(), None);
}

#[test]
fn summary_lists_known_fields() {
    let metadata = VideoMetadata {
        duration_seconds: Some(95.0),
        frame_rate: Some(25.0),
        frame_count: 2375,
        frame_count_exact: true,
        width: Some(1280),
        height: Some(720),
        codec_name: Some("vp9".to_string()),
    };

    let summary = metadata.summary();
    assert!(summary.contains("1280x720"), "{summary}");
    assert!(summary.contains("25.000 fps"), "{summary}");
    assert!(summary.contains("vp9"), "{summary}");
    assert!(summary.contains("1:35"), "{summary}");
    assert!(summary.contains("2375 frames"), "{summary}");
    assert!(!summary.contains("approx."), "{summary}");
}

#[test]
fn replacing_the_frame_count() {
    let estimated = VideoMetadata::unknown().with_frame_count(120, false);
    assert_eq!(estimated.frame_count, 120);
    assert!(!estimated.frame_count_exact);
    assert!(estimated.summary().contains("120 frames (approx.)"));

    let exact = estimated.with_frame_count(121, true);
    assert!(exact.frame_count_exact);

    let cleared = exact.with_frame_count(0, true);
    assert!(!cleared.frame_count_exact);
}
