//! Tests for the spot detector on synthetic Gaussian blobs.

use glam::DVec2;

use super::*;

// ============================================================================
// Helpers
// ============================================================================

fn blob_frame(width: usize, height: usize, blobs: &[(f64, f64, f32)]) -> Buffer2<f32> {
    let sigma = 2.0f64;
    Buffer2::from_fn(width, height, |x, y| {
        blobs
            .iter()
            .map(|&(cx, cy, amp)| {
                let dx = x as f64 - cx;
                let dy = y as f64 - cy;
                amp * (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp() as f32
            })
            .sum::<f32>()
            + 5.0
    })
}

fn detector() -> SpotDetector {
    SpotDetector::new(DetectorConfig::default(), Calibration::default())
}

// ============================================================================
// Single-frame detection
// ============================================================================

#[test]
fn test_detects_single_blob_with_subpixel_position() {
    let frame = blob_frame(40, 40, &[(20.3, 15.0, 100.0)]);
    let detections = detector().detect_frame(&frame).unwrap();

    assert_eq!(detections.len(), 1);
    let d = detections[0];
    assert!((d.position.x - 20.3).abs() < 0.15, "{}", d.position);
    assert!((d.position.y - 15.0).abs() < 0.05, "{}", d.position);
    assert!(d.quality > 30.0 && d.quality < 60.0, "quality {}", d.quality);
    assert!(d.intensity.mean > 5.0);
    assert!(d.intensity.max > d.intensity.min);
    assert!(d.intensity.contrast > 0.0);
    assert!(d.intensity.snr > 0.0);
}

#[test]
fn test_without_subpixel_positions_are_integral() {
    let config = DetectorConfig {
        subpixel_localization: false,
        ..Default::default()
    };
    let detector = SpotDetector::new(config, Calibration::default());
    let frame = blob_frame(40, 40, &[(20.3, 15.0, 100.0)]);
    let detections = detector.detect_frame(&frame).unwrap();
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].position, DVec2::new(20.0, 15.0));
}

#[test]
fn test_flat_frame_has_no_spots() {
    let frame = Buffer2::new_filled(32, 32, 120.0f32);
    assert!(detector().detect_frame(&frame).unwrap().is_empty());
}

#[test]
fn test_threshold_above_peak_rejects_blob() {
    let config = DetectorConfig {
        threshold: 500.0,
        ..Default::default()
    };
    let detector = SpotDetector::new(config, Calibration::default());
    let frame = blob_frame(40, 40, &[(20.0, 20.0, 100.0)]);
    assert!(detector.detect_frame(&frame).unwrap().is_empty());
}

#[test]
fn test_median_filter_suppresses_hot_pixel() {
    let mut frame = Buffer2::new_filled(32, 32, 10.0f32);
    frame[(16, 16)] = 5000.0;
    assert_eq!(detector().detect_frame(&frame).unwrap().len(), 1);

    let config = DetectorConfig {
        median_filtering: true,
        ..Default::default()
    };
    let detector = SpotDetector::new(config, Calibration::default());
    assert!(detector.detect_frame(&frame).unwrap().is_empty());
}

#[test]
fn test_sigma_follows_radius_and_calibration() {
    let calibration = Calibration {
        pixel_width: 0.5,
        ..Default::default()
    };
    let config = DetectorConfig {
        radius: 1.0,
        ..Default::default()
    };
    let detector = SpotDetector::new(config, calibration);
    assert!((detector.radius_px() - 2.0).abs() < 1e-12);
    assert!((detector.sigma_px() - std::f32::consts::SQRT_2).abs() < 1e-6);
}

// ============================================================================
// Multi-frame detection
// ============================================================================

#[test]
fn test_ids_follow_frame_then_raster_order() {
    let frames = vec![
        blob_frame(48, 48, &[(30.0, 10.0, 100.0), (10.0, 30.0, 100.0)]),
        blob_frame(48, 48, &[]),
        blob_frame(48, 48, &[(24.0, 24.0, 100.0)]),
    ];
    let spots = detector().detect(&frames).unwrap();

    assert_eq!(spots.len(), 3);
    assert_eq!(spots.n_frames(), 3);
    let summary: Vec<_> = spots
        .iter()
        .map(|s| (s.id.0, s.frame, s.position.x.round(), s.position.y.round()))
        .collect();
    assert_eq!(
        summary,
        vec![(0, 0, 30.0, 10.0), (1, 0, 10.0, 30.0), (2, 2, 24.0, 24.0)]
    );
    assert!(spots.frame(1).is_empty());
    assert!(spots.iter().all(|s| s.radius == 3.5 && s.is_visible()));
}

#[test]
fn test_calibration_scales_positions_and_time() {
    let calibration = Calibration {
        pixel_width: 0.1,
        pixel_height: 0.1,
        frame_interval: 0.05,
        ..Default::default()
    };
    let config = DetectorConfig {
        radius: 0.35,
        subpixel_localization: false,
        ..Default::default()
    };
    let detector = SpotDetector::new(config, calibration);
    let frames = vec![blob_frame(40, 40, &[]), blob_frame(40, 40, &[(20.0, 12.0, 100.0)])];
    let spots = detector.detect(&frames).unwrap();

    assert_eq!(spots.len(), 1);
    let spot = &spots[SpotId(0)];
    assert!((spot.position.x - 2.0).abs() < 1e-9);
    assert!((spot.position.y - 1.2).abs() < 1e-9);
    assert_eq!(spot.position.z, 0.0);
    assert_eq!(spot.frame, 1);
    assert!((spot.time - 0.05).abs() < 1e-12);
    assert_eq!(spot.radius, 0.35);
}

#[test]
fn test_frames_are_independent() {
    let a = blob_frame(40, 40, &[(12.0, 12.0, 80.0)]);
    let b = blob_frame(40, 40, &[(25.5, 20.0, 100.0)]);
    let together = detector().detect(&[a, b.clone()]).unwrap();
    let alone = detector().detect(&[b]).unwrap();

    let p1: Vec<_> = together.frame(1).iter().map(|s| (s.position, s.quality)).collect();
    let p2: Vec<_> = alone.frame(0).iter().map(|s| (s.position, s.quality)).collect();
    assert_eq!(p1, p2);
}

// ============================================================================
// Input validation
// ============================================================================

#[test]
fn test_no_frames_is_an_error() {
    assert_eq!(detector().detect(&[]).unwrap_err(), ValidationError::NoFrames);
}

#[test]
fn test_mismatched_frame_sizes_are_an_error() {
    let frames = vec![Buffer2::new_filled(10, 10, 0.0f32), Buffer2::new_filled(10, 12, 0.0f32)];
    assert_eq!(
        detector().detect(&frames).unwrap_err(),
        ValidationError::FrameSizeMismatch {
            frame: 1,
            width: 10,
            height: 12,
            expected_width: 10,
            expected_height: 10,
        }
    );
}

#[test]
fn test_empty_frame_is_an_error() {
    let frames = vec![Buffer2::new(0, 0, Vec::<f32>::new())];
    assert_eq!(
        detector().detect(&frames).unwrap_err(),
        ValidationError::EmptyFrame { frame: 0 }
    );
}

#[test]
fn test_radius_outside_pixel_range_is_an_error() {
    let frames = vec![blob_frame(20, 20, &[(10.0, 10.0, 100.0)])];
    for radius in [1e-50, 0.2, 1e6] {
        let config = DetectorConfig {
            radius,
            ..Default::default()
        };
        let detector = SpotDetector::new(config, Calibration::default());
        assert!(matches!(
            detector.detect(&frames),
            Err(ValidationError::RadiusOutOfRange { .. })
        ));
        assert!(matches!(
            detector.detect_frame(&frames[0]),
            Err(ValidationError::RadiusOutOfRange { .. })
        ));
    }
}

#[test]
fn test_radius_bound_follows_pixel_width() {
    let frames = vec![blob_frame(20, 20, &[(10.0, 10.0, 100.0)])];
    let config = DetectorConfig {
        radius: 0.35,
        ..Default::default()
    };
    let calibration = Calibration {
        pixel_width: 0.1,
        ..Default::default()
    };
    let detector = SpotDetector::new(config, calibration);
    assert_eq!(detector.detect(&frames).unwrap().n_frames(), 1);
}
