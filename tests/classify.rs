//! Integration tests for the default classification cascade.
//!
//! Every fixture is a synthetic series shaped so that exactly one stage of the
//! cascade claims it.

use std::collections::HashMap;
use std::f64::consts::PI;

use yacpc::prelude::*;

/// Simple test bar structure
#[derive(Debug, Clone, Copy)]
struct TestBar {
    h: f64,
    l: f64,
    c: f64,
}

impl TestBar {
    fn new(h: f64, l: f64, c: f64) -> Self {
        Self { h, l, c }
    }
}

impl OHLCV for TestBar {
    fn open(&self) -> f64 {
        self.c
    }

    fn high(&self) -> f64 {
        self.h
    }

    fn low(&self) -> f64 {
        self.l
    }

    fn close(&self) -> f64 {
        self.c
    }

    fn volume(&self) -> f64 {
        1000.0
    }
}

/// Bars whose high/low sit `spread` above/below the close
fn from_closes(closes: &[f64], spread: f64) -> Vec<TestBar> {
    closes
        .iter()
        .map(|&c| TestBar::new(c + spread, c - spread, c))
        .collect()
}

/// Bars that alternate between touching the upper and the lower boundary
fn alternating(highs: &[f64], lows: &[f64], start_high: bool) -> Vec<TestBar> {
    highs
        .iter()
        .zip(lows)
        .enumerate()
        .map(|(i, (&h, &l))| {
            let at_high = (i % 2 == 0) == start_high;
            TestBar::new(h, l, if at_high { h - 0.2 } else { l + 0.2 })
        })
        .collect()
}

/// Piecewise-linear closes through `(from, to, steps)` legs
fn legs(segments: &[(f64, f64, usize)]) -> Vec<f64> {
    segments
        .iter()
        .flat_map(|&(from, to, steps)| {
            (0..steps).map(move |i| from + (to - from) * i as f64 / steps as f64)
        })
        .collect()
}

fn geometric(n: usize, step: f64) -> Vec<TestBar> {
    let closes: Vec<f64> = (0..n).map(|i| 100.0 * step.powi(i as i32)).collect();
    from_closes(&closes, 1.0)
}

// ============================================================
// TOTALITY
// ============================================================

#[test]
fn test_empty_series_is_other() {
    let bars: Vec<TestBar> = vec![];
    assert_eq!(classify(&bars), PatternType::Other);
}

#[test]
fn test_short_series_is_other() {
    for n in [1, 5, 10, 19] {
        assert_eq!(classify(&geometric(n, 1.05)), PatternType::Other, "n = {n}");
    }
}

#[test]
fn test_flat_series_is_other() {
    let bars = from_closes(&[100.0; 60], 1.0);
    assert_eq!(classify(&bars), PatternType::Other);
}

// ============================================================
// SINGLE TREND
// ============================================================

#[test]
fn test_steady_rally_is_single_up() {
    assert_eq!(classify(&geometric(60, 1.015)), PatternType::SingleUp);
}

#[test]
fn test_steady_decline_is_single_down() {
    assert_eq!(classify(&geometric(60, 0.98)), PatternType::SingleDown);
}

#[test]
fn test_gentle_rally_falls_through_to_rectangle() {
    // +1% a bar over 60 bars has a normalized slope just under 0.01, which no
    // trend rule accepts; the rectangle stage claims it instead
    assert_eq!(classify(&geometric(60, 1.01)), PatternType::Rectangle);
}

#[test]
fn test_trend_takes_precedence_over_wedge() {
    let n = 30;
    let highs: Vec<f64> = (0..n).map(|i| 100.0 * (1.0 + 0.015 * i as f64)).collect();
    let lows: Vec<f64> = (0..n).map(|i| 80.0 * (1.0 + 0.03 * i as f64)).collect();
    let bars: Vec<TestBar> = highs
        .iter()
        .zip(&lows)
        .map(|(&h, &l)| TestBar::new(h, l, (h + l) / 2.0))
        .collect();

    assert_eq!(classify(&bars), PatternType::SingleUp);

    // the wedge stage alone still sees the shape
    let wedge_only = ClassifierBuilder::new()
        .add(BuiltinDetector::Wedge(WedgeDetector::default()))
        .build()
        .unwrap();
    assert_eq!(wedge_only.classify(&bars), PatternType::AscWedge);
}

// ============================================================
// CONSOLIDATION SHAPES
// ============================================================

#[test]
fn test_oscillation_is_rectangle() {
    let closes: Vec<f64> = (0..60)
        .map(|i| 100.0 + 10.0 * (2.0 * PI * i as f64 / 10.0).sin())
        .collect();
    let c = Classifier::with_defaults().classify_with_features(&from_closes(&closes, 1.0));
    assert_eq!(c.pattern, PatternType::Rectangle);
    assert_eq!(c.detector, Some("RECTANGLE"));
    let features = c.features.unwrap();
    assert!(features.volatility > 0.05 && features.volatility < 0.25);
}

#[test]
fn test_falling_wedge() {
    let n = 30;
    let highs: Vec<f64> = (0..n).map(|i| 130.0 - 2.0 * i as f64).collect();
    let lows: Vec<f64> = (0..n).map(|i| 100.0 - i as f64).collect();
    // about half the days are up, so no down-trend rule applies
    assert_eq!(classify(&alternating(&highs, &lows, true)), PatternType::DescWedge);
}

#[test]
fn test_ascending_triangle() {
    let n = 24;
    let highs = vec![100.0; n];
    let lows: Vec<f64> = (0..n).map(|i| 55.0 + 1.9 * i as f64).collect();
    assert_eq!(classify(&alternating(&highs, &lows, true)), PatternType::AscTriangle);
}

#[test]
fn test_descending_triangle() {
    let n = 24;
    let highs: Vec<f64> = (0..n).map(|i| 170.0 - 2.9 * i as f64).collect();
    let lows = vec![100.0; n];
    assert_eq!(classify(&alternating(&highs, &lows, false)), PatternType::DescTriangle);
}

#[test]
fn test_symmetric_triangle() {
    let n = 40;
    let bars: Vec<TestBar> = (0..n)
        .map(|i| {
            let amplitude = 8.0 * (1.0 - 0.85 * i as f64 / 39.0);
            let c = 100.0 + amplitude * (PI * i as f64 / 3.0).sin();
            let half_band = 0.5 + 0.5 * amplitude;
            TestBar::new(c + half_band, c - half_band, c)
        })
        .collect();
    assert_eq!(classify(&bars), PatternType::SymTriangle);
}

#[test]
fn test_cup_with_handle() {
    let mut closes = vec![100.0; 4];
    closes.extend(legs(&[(100.0, 84.0, 6), (84.0, 101.0, 15)]));
    closes.push(101.0);
    closes.extend(legs(&[(100.0, 99.0, 9), (99.0, 95.0, 3), (95.0, 98.0, 3)]));
    closes.extend([98.0; 9]);
    assert_eq!(closes.len(), 50);

    assert_eq!(classify(&from_closes(&closes, 0.5)), PatternType::CupHandle);
}

#[test]
fn test_head_and_shoulders_top() {
    let closes = legs(&[
        (90.0, 100.0, 5),
        (100.0, 92.0, 5),
        (92.0, 104.0, 5),
        (104.0, 93.0, 5),
        (93.0, 108.0, 5),
        (108.0, 95.0, 5),
        (95.0, 95.0, 10),
    ]);
    assert_eq!(classify(&from_closes(&closes, 0.5)), PatternType::HeadShoulderTop);
}

#[test]
fn test_head_and_shoulders_top_with_equal_shoulders() {
    let closes = legs(&[
        (90.0, 100.0, 5),
        (100.0, 92.0, 5),
        (92.0, 100.0, 5),
        (100.0, 93.0, 5),
        (93.0, 108.0, 5),
        (108.0, 95.0, 5),
        (95.0, 95.0, 10),
    ]);
    let c = Classifier::with_defaults().classify_with_features(&from_closes(&closes, 0.5));
    assert_eq!(c.pattern, PatternType::HeadShoulderTop);
    assert_eq!(c.detector, Some("HEAD_SHOULDERS"));
}

#[test]
fn test_head_and_shoulders_bottom() {
    let closes = legs(&[
        (110.0, 100.0, 5),
        (100.0, 108.0, 5),
        (108.0, 96.0, 5),
        (96.0, 106.0, 5),
        (106.0, 92.0, 5),
        (92.0, 104.0, 5),
        (104.0, 98.0, 5),
        (98.0, 98.0, 5),
    ]);
    assert_eq!(classify(&from_closes(&closes, 0.5)), PatternType::HeadShoulderBottom);
}

#[test]
fn test_rounding_top_and_bottom() {
    let arch: Vec<f64> = (0..40)
        .map(|i| 100.0 + 15.0 * (PI * i as f64 / 39.0).sin())
        .collect();
    assert_eq!(classify(&from_closes(&arch, 1.0)), PatternType::RoundTop);

    let bowl: Vec<f64> = (0..40)
        .map(|i| 115.0 - 15.0 * (PI * i as f64 / 39.0).sin())
        .collect();
    assert_eq!(classify(&from_closes(&bowl, 1.0)), PatternType::RoundBottom);
}

// ============================================================
// ENGINE
// ============================================================

#[test]
fn test_rising_series_never_a_triangle() {
    for step in [1.005, 1.01, 1.02, 1.03] {
        let pattern = classify(&geometric(60, step));
        assert!(
            !matches!(
                pattern,
                PatternType::AscTriangle | PatternType::DescTriangle | PatternType::SymTriangle
            ),
            "step {step} gave {pattern}"
        );
    }
}

#[test]
fn test_tuned_rectangle_changes_outcome() {
    let closes: Vec<f64> = (0..60)
        .map(|i| 100.0 + 2.0 * (2.0 * PI * i as f64 / 10.0).sin())
        .collect();
    let bars = from_closes(&closes, 1.0);
    assert_ne!(classify(&bars), PatternType::Rectangle);

    let mut params = HashMap::new();
    params.insert("min_volatility", 0.01);
    let rectangle = RectangleDetector::with_params(&params).unwrap();
    let classifier = ClassifierBuilder::new()
        .add(BuiltinDetector::Rectangle(rectangle))
        .build()
        .unwrap();
    assert_eq!(classifier.classify(&bars), PatternType::Rectangle);
}

#[test]
fn test_invalid_detector_config_rejected() {
    let detector = RectangleDetector {
        min_volatility: Ratio::new(0.3).unwrap(),
        ..RectangleDetector::default()
    };
    assert!(ClassifierBuilder::new()
        .add(BuiltinDetector::Rectangle(detector.clone()))
        .build()
        .is_err());
    assert!(ClassifierBuilder::new()
        .add_checked(BuiltinDetector::Rectangle(detector))
        .is_err());
}

#[test]
fn test_classifier_config_from_json() {
    let config: ClassifierConfig =
        serde_json::from_str(r#"{ "mode": "ai", "min_bars": 30 }"#).unwrap();
    assert_eq!(config.mode, ClassifyMode::Ai);
    assert_eq!(config.min_bars, 30);
    assert!(config.validate_data);

    let classifier = ClassifierBuilder::new()
        .with_default_cascade()
        .config(config)
        .build()
        .unwrap();
    // 25 bars is now below the minimum
    assert_eq!(classifier.classify(&geometric(25, 1.03)), PatternType::Other);
    assert_eq!(classifier.classify(&geometric(60, 1.015)), PatternType::SingleUp);
}

#[test]
fn test_detector_round_trips_through_json() {
    let detector = BuiltinDetector::Triangle(TriangleDetector {
        min_convergence: 0.3,
        ..TriangleDetector::default()
    });
    let json = serde_json::to_string(&detector).unwrap();
    let back: BuiltinDetector = serde_json::from_str(&json).unwrap();
    assert_eq!(back.id(), "TRIANGLE");
    match back {
        BuiltinDetector::Triangle(t) => assert_eq!(t.min_convergence, 0.3),
        other => panic!("unexpected detector {}", other.id()),
    }
}

#[test]
fn test_pattern_serializes_as_code() {
    assert_eq!(serde_json::to_string(&PatternType::CupHandle).unwrap(), "6");
    let back: PatternType = serde_json::from_str("14").unwrap();
    assert_eq!(back, PatternType::Rectangle);
    assert!(serde_json::from_str::<PatternType>("0").is_err());
}

#[test]
fn test_batch_and_parallel_agree() {
    let up = geometric(60, 1.015);
    let down = geometric(60, 0.98);
    let flat = from_closes(&[100.0; 60], 1.0);
    let short = geometric(10, 1.01);

    let mut map = HashMap::new();
    map.insert("UP".to_string(), up.clone());
    map.insert("DOWN".to_string(), down.clone());
    map.insert("FLAT".to_string(), flat.clone());
    map.insert("SHORT".to_string(), short.clone());
    let batch = batch_classify(&map);

    let classifier = Classifier::with_defaults();
    let pairs: Vec<(&str, &[TestBar])> = vec![
        ("UP", up.as_slice()),
        ("DOWN", down.as_slice()),
        ("FLAT", flat.as_slice()),
        ("SHORT", short.as_slice()),
    ];
    let parallel = classify_parallel(&classifier, pairs);

    assert_eq!(batch.len(), 4);
    for (id, (pattern, features)) in &batch {
        assert_eq!(parallel[id].pattern, *pattern, "{id}");
        assert_eq!(parallel[id].features, *features, "{id}");
    }
    assert_eq!(batch["DOWN"].0, PatternType::SingleDown);
    // ten bars is enough for features but not for the cascade
    assert_eq!(batch["SHORT"].0, PatternType::Other);
    assert!(batch["SHORT"].1.is_some());
}
