//! Regression tests for the cycle pipeline: detection, normalization,
//! stacking and repeatability selection on synthetic force signals.

use ndarray::Array1;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use stride_cycles::{
    CycleDetector, PhaseBounds, RepeatabilityConfig, detect_cycles, most_repeatable_cycles, stack,
    time_normalize, unstack,
};
use stride_series::{ResampleOptions, SliceOptions, TimeSeries};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `50 + 50 * sin(pi * t)` sampled at 100 Hz from 0 to 10 s.
fn plain_sine_force() -> TimeSeries {
    let time = Array1::from_iter((0..=1000).map(|i| f64::from(i) * 0.01));
    let force = time.mapv(|t| 50.0 + 50.0 * (std::f64::consts::PI * t).sin());
    let mut ts = TimeSeries::new(time).unwrap();
    ts.add_data("F", force.into_dyn()).unwrap();
    ts
}

/// `50 + amplitude * sin(pi * (t - 0.005))` sampled at 100 Hz up to `end`.
///
/// The 0.005 s phase lag keeps every sample off the 50 N threshold, so
/// every cycle has the same number of samples.
fn sine_force(end: f64, amplitude: impl Fn(f64) -> f64) -> TimeSeries {
    let n = (end * 100.0).round() as usize + 1;
    let time = Array1::from_iter((0..n).map(|i| i as f64 * 0.01));
    let force = time.mapv(|t| {
        let s = (std::f64::consts::PI * (t - 0.005)).sin();
        50.0 + amplitude(t) * s
    });
    let mut ts = TimeSeries::new(time).unwrap();
    ts.add_data("F", force.into_dyn()).unwrap();
    ts.add_data_info("F", "Unit", "N");
    ts
}

fn event_times(ts: &TimeSeries, name: &str) -> Vec<f64> {
    (0..ts.event_count(name))
        .map(|k| ts.get_event_time(name, k).unwrap())
        .collect()
}

// ---------------------------------------------------------------------------
// a) clean sine yields five cycles two seconds apart
// ---------------------------------------------------------------------------

/// The record starts on the threshold and ends before the sixth push: the
/// first cycle opens at sample 0 and the fifth closes at the last sample.
#[test]
fn plain_sine_yields_five_push_recovery_pairs() {
    let ts = plain_sine_force();
    let detector = CycleDetector::new("F", 50.0, 50.0)
        .with_event_names("push", "recovery")
        .with_cycle_bounds(1.5, 2.5);
    let out = detect_cycles(&ts, &detector).unwrap();

    let pushes = event_times(&out, "push");
    let recoveries = event_times(&out, "recovery");
    assert_eq!(pushes.len(), 5, "pushes {pushes:?}");
    assert_eq!(recoveries.len(), 5, "recoveries {recoveries:?}");
    assert_eq!(pushes[0], 0.0);
    for (k, t) in pushes.iter().enumerate() {
        let expected = 2.0 * k as f64;
        assert!((t - expected).abs() <= 0.01 + 1e-9, "push {k} at {t}");
    }
    for (k, t) in recoveries.iter().enumerate() {
        let expected = 1.0 + 2.0 * k as f64;
        assert!((t - expected).abs() <= 0.01 + 1e-9, "recovery {k} at {t}");
    }
    for pair in pushes.windows(2) {
        assert!((pair[1] - pair[0] - 2.0).abs() <= 0.02, "spacing {pair:?}");
    }
    assert!((event_times(&out, "_")[4] - 10.0).abs() < 1e-9);
}

#[test]
fn clean_sine_yields_five_cycles() {
    let ts = sine_force(10.01, |_| 50.0);
    let detector = CycleDetector::new("F", 50.0, 50.0)
        .with_event_names("push", "recovery")
        .with_cycle_bounds(1.5, 2.5);
    let out = detect_cycles(&ts, &detector).unwrap();

    let pushes = event_times(&out, "push");
    assert_eq!(pushes.len(), 5);
    for (k, t) in pushes.iter().enumerate() {
        let expected = 0.01 + 2.0 * k as f64;
        assert!((t - expected).abs() <= 0.01 + 1e-9, "push {k} at {t}, expected {expected}");
    }
    for pair in pushes.windows(2) {
        assert!((pair[1] - pair[0] - 2.0).abs() < 1e-9);
    }
    assert_eq!(event_times(&out, "recovery").len(), 5);
    assert_eq!(event_times(&out, "_").len(), 5);
    assert!((event_times(&out, "_")[4] - 10.01).abs() < 1e-9);
}

/// A single phase of this sine lasts one second, so a 1.5-2.5 s bracket
/// on phase 1 rejects every cycle.
#[test]
fn phase_duration_bounds_apply_to_one_phase() {
    let ts = sine_force(10.01, |_| 50.0);
    let detector = CycleDetector::new("F", 50.0, 50.0)
        .with_phase1(PhaseBounds::new().with_duration(1.5, 2.5));
    assert!(detector.find_cycles(&ts).unwrap().is_empty());
}

#[test]
fn record_ending_in_phase2_closes_the_last_cycle_at_its_end() {
    let ts = sine_force(10.0, |_| 50.0);
    let cycles = CycleDetector::new("F", 50.0, 50.0).find_cycles(&ts).unwrap();
    assert_eq!(cycles.len(), 5);
    assert!(cycles[..4].iter().all(|c| !c.truncated));
    let last = cycles[4];
    assert!(last.truncated);
    assert_eq!(last.end_index, ts.len() - 1);
    assert!((last.duration() - 1.99).abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// b) hysteresis on a noisy sine
// ---------------------------------------------------------------------------

#[test]
fn noisy_sine_with_hysteresis() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut ts = sine_force(10.2, |_| 50.0);
    ts.map_channel("F", |f| f.mapv(|v| v + rng.gen_range(-2.0..2.0)))
        .unwrap();

    let cycles = CycleDetector::new("F", 60.0, 40.0).find_cycles(&ts).unwrap();
    assert_eq!(cycles.len(), 5);
    for pair in cycles.windows(2) {
        let period = pair[1].start - pair[0].start;
        assert!((period - 2.0).abs() < 0.06, "period {period}");
    }

    // a single threshold is exposed to noise; the cycle bounds keep only plausible cycles
    let chattering = CycleDetector::new("F", 50.0, 50.0).find_cycles(&ts).unwrap();
    let filtered = CycleDetector::new("F", 50.0, 50.0)
        .with_cycle_bounds(1.5, 2.5)
        .find_cycles(&ts)
        .unwrap();
    assert!(filtered.len() <= chattering.len());
    assert!(filtered.iter().all(|c| c.duration() >= 1.5));
}

// ---------------------------------------------------------------------------
// c) normalize, stack, unstack
// ---------------------------------------------------------------------------

#[test]
fn normalized_cycles_stack_and_unstack() {
    let ts = sine_force(10.01, |_| 50.0);
    let detected = CycleDetector::new("F", 50.0, 50.0)
        .with_event_names("push", "recovery")
        .detect(&ts)
        .unwrap();

    let normalized = time_normalize(&detected, "push", "push", 50).unwrap();
    assert_eq!(normalized.len(), 4 * 50);

    let ensemble = stack(&normalized, Some(50)).unwrap();
    assert_eq!(ensemble.n_cycles(), 4);
    assert_eq!(ensemble.channel("F").unwrap().shape(), &[4, 50]);
    assert_eq!(unstack(&ensemble).unwrap(), normalized);

    // every push-to-push cycle of a pure sine normalizes to the same curve
    let force = ensemble.channel("F").unwrap();
    for p in 0..50 {
        for c in 1..4 {
            assert!((force[[c, p]] - force[[0, p]]).abs() < 1e-6);
        }
    }
}

// ---------------------------------------------------------------------------
// d) repeatability
// ---------------------------------------------------------------------------

#[test]
fn disturbed_cycle_is_not_repeatable() {
    // the third push-to-push cycle has a larger push phase
    let ts = sine_force(10.01, |t| if (4.01..6.01).contains(&t) { 80.0 } else { 50.0 });
    let detected = CycleDetector::new("F", 50.0, 50.0)
        .with_event_names("push", "recovery")
        .detect(&ts)
        .unwrap();
    let normalized = time_normalize(&detected, "push", "push", 50).unwrap();
    let ensemble = stack(&normalized, Some(50)).unwrap();

    let result = most_repeatable_cycles(ensemble.channel("F").unwrap()).unwrap();
    assert_eq!(result.selected, vec![0, 1, 3]);
    assert_eq!(result.rejected, vec![2]);

    let kept = ensemble.select_cycles(&result.selected);
    assert_eq!(kept.n_cycles(), 3);
}

#[test]
fn ten_identical_cycles_and_one_outlier() {
    let cycle: Vec<f64> = (0..100).map(|i| (f64::from(i) * 0.063).sin()).collect();
    let mut rows = Vec::new();
    for k in 0..11 {
        let offset = if k == 4 { 1000.0 } else { 0.0 };
        rows.extend(cycle.iter().map(|v| v + offset));
    }
    let data = ndarray::Array2::from_shape_vec((11, 100), rows).unwrap().into_dyn();

    let result = RepeatabilityConfig::new().select(&data).unwrap();
    assert_eq!(result.selected.len(), 10);
    assert!(!result.selected.contains(&4));
    assert_eq!(result.rejected, vec![4]);
}

// ---------------------------------------------------------------------------
// e) container properties the pipeline relies on
// ---------------------------------------------------------------------------

#[test]
fn clone_is_independent() {
    let ts = sine_force(1.0, |_| 50.0);
    let mut copy = ts.clone();
    assert_eq!(copy, ts);
    copy.map_channel("F", |f| f.mapv(|v| v * 0.0)).unwrap();
    copy.add_event(0.5, "touch");
    assert_ne!(copy, ts);
    assert!(ts.events().is_empty());
}

#[test]
fn resample_on_own_time_is_identity() {
    let ts = sine_force(2.0, |_| 50.0);
    let out = ts.resample(ts.time(), ResampleOptions::default()).unwrap();
    assert_eq!(out, ts);
}

#[test]
fn between_events_selects_closed_range() {
    let mut ts = sine_force(10.0, |_| 50.0);
    ts.add_event(1.0, "push");
    ts.add_event(3.0, "push");
    ts.add_event(6.0, "push");
    let out = ts
        .get_ts_between_events("push", 0, "push", 1, SliceOptions::default())
        .unwrap();
    assert!(out.time().iter().all(|&t| (1.0..=3.0).contains(&t)));
    let expected = ts.time().iter().filter(|&&t| (1.0..=3.0).contains(&t)).count();
    assert_eq!(out.len(), expected);
}
