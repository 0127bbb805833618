// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use camera_session::VideoQuality;
use camera_session::backends::SessionPreset;
use camera_session::constants::MAX_ZOOM_CAP;

#[test]
fn test_video_quality_values() {
    assert_eq!(VideoQuality::ALL.len(), 4);
    assert_eq!(VideoQuality::default(), VideoQuality::High);
}

#[test]
fn test_preset_ladders_are_best_first() {
    for quality in VideoQuality::ALL {
        let ladder = quality.preset_ladder();
        assert!(!ladder.is_empty(), "{:?} has no presets", quality);
        assert!(
            ladder.windows(2).all(|pair| pair[0] < pair[1]),
            "{:?} ladder is not ordered",
            quality
        );
        assert!(!ladder.contains(&SessionPreset::Photo));
    }
}

#[test]
fn test_higher_quality_starts_higher() {
    let top = |q: VideoQuality| q.preset_ladder()[0];
    assert!(top(VideoQuality::Max) < top(VideoQuality::High));
    assert!(top(VideoQuality::High) < top(VideoQuality::Medium));
    assert!(top(VideoQuality::Medium) < top(VideoQuality::Low));
}

#[test]
fn test_video_quality_parsing() {
    assert_eq!("HIGH".parse::<VideoQuality>(), Ok(VideoQuality::High));
    assert_eq!("highest".parse::<VideoQuality>(), Ok(VideoQuality::Max));
    assert!("ultra".parse::<VideoQuality>().is_err());
    for quality in VideoQuality::ALL {
        assert!(!quality.display_name().is_empty());
    }
}

#[test]
fn test_zoom_cap_is_sane() {
    assert!(MAX_ZOOM_CAP > 1.0);
}
