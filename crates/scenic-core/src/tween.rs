//! # Tween evaluator
//!
//! Pure interpolation of a [`TweenDef`] at a point in time, plus the helper
//! that writes the interpolated value back through the tween's dot-path.
//!
//! Timeline model: `elapsed = now - started_at - delay`. Negative elapsed is
//! still in the delay window and holds `from`. A non-positive duration snaps
//! to `to`. Otherwise the tween plays `repeat + 1` iterations (`repeat = -1`
//! plays forever); with `yoyo`, odd iterations run reversed.

use crate::document;
use scenic_schema::{Node, TweenDef};

/// Evaluates a tween at `now_ms` (epoch milliseconds).
///
/// Returns `None` only when the tween has not been armed (`started_at`
/// unset).
///
/// Completion edge, documented on purpose: a finished yoyo tween with an
/// even `repeat` count settles on `from`, since an even number of direction
/// reversals ends on the reversed leg.
pub fn interpolate(tween: &TweenDef, now_ms: f64) -> Option<f64> {
    let started_at = tween.started_at?;
    let elapsed = now_ms - started_at - tween.delay_ms;
    if elapsed < 0.0 {
        return Some(tween.from);
    }
    if tween.duration_ms <= 0.0 {
        return Some(tween.to);
    }

    let iteration = (elapsed / tween.duration_ms).floor() as i64;
    let mut progress = (elapsed % tween.duration_ms) / tween.duration_ms;

    if tween.repeat >= 0 && iteration > i64::from(tween.repeat) {
        if tween.yoyo && tween.repeat % 2 == 0 {
            return Some(tween.from);
        }
        return Some(tween.to);
    }

    if tween.yoyo && iteration % 2 == 1 {
        progress = 1.0 - progress;
    }

    let eased = tween.easing.eval(progress.clamp(0.0, 1.0));
    Some(tween.from + (tween.to - tween.from) * eased)
}

/// Evaluates the node's armed tween, if any, and writes the value through
/// its dot-path. Returns whether the node's value actually changed.
pub fn apply_to_node(node: &mut Node, now_ms: f64) -> bool {
    let Some(tween) = node.tween.clone() else {
        return false;
    };
    let Some(value) = interpolate(&tween, now_ms) else {
        return false;
    };
    let before = document::get_number_path(node, &tween.property);
    if !document::set_number_path(node, &tween.property, value) {
        return false;
    }
    document::get_number_path(node, &tween.property) != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenic_schema::{Easing, NodeKind};

    fn tween(duration_ms: f64) -> TweenDef {
        TweenDef {
            property: "transform.x".to_string(),
            from: 0.0,
            to: 100.0,
            duration_ms,
            easing: Easing::Linear,
            delay_ms: 0.0,
            repeat: 0,
            yoyo: false,
            started_at: Some(10_000.0),
        }
    }

    #[test]
    fn unarmed_tween_is_inert() {
        let mut t = tween(1000.0);
        t.started_at = None;
        assert_eq!(interpolate(&t, 10_500.0), None);
    }

    #[test]
    fn endpoints_and_monotonicity() {
        let t = tween(1000.0);
        assert_eq!(interpolate(&t, 10_000.0), Some(0.0));
        assert_eq!(interpolate(&t, 11_000.0), Some(100.0));
        assert_eq!(interpolate(&t, 12_345.0), Some(100.0));

        let mut last = f64::MIN;
        for step in 0..=100 {
            let v = interpolate(&t, 10_000.0 + 10.0 * step as f64).unwrap();
            assert!(v >= last, "not monotonic at step {step}");
            last = v;
        }
    }

    #[test]
    fn delay_holds_from() {
        let mut t = tween(1000.0);
        t.delay_ms = 500.0;
        assert_eq!(interpolate(&t, 10_250.0), Some(0.0));
        assert_eq!(interpolate(&t, 10_500.0), Some(0.0));
        assert!((interpolate(&t, 11_000.0).unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn zero_duration_snaps_to_target() {
        let t = tween(0.0);
        assert_eq!(interpolate(&t, 10_000.0), Some(100.0));
    }

    #[test]
    fn yoyo_symmetry_around_the_turn() {
        let mut t = tween(1000.0);
        t.yoyo = true;
        t.repeat = 1;
        let forward = interpolate(&t, 10_500.0).unwrap();
        let reflected = interpolate(&t, 11_500.0).unwrap();
        assert!((forward - reflected).abs() < 1e-9);
        // End of the reversed iteration heads back to `from`.
        assert!((interpolate(&t, 11_900.0).unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn completed_even_yoyo_settles_on_from() {
        let mut t = tween(1000.0);
        t.yoyo = true;
        t.repeat = 0;
        assert_eq!(interpolate(&t, 20_000.0), Some(0.0));

        t.repeat = 1;
        assert_eq!(interpolate(&t, 20_000.0), Some(100.0));
    }

    #[test]
    fn infinite_repeat_never_completes() {
        let mut t = tween(1000.0);
        t.repeat = -1;
        let v = interpolate(&t, 10_000.0 + 1000.0 * 9999.0 + 250.0).unwrap();
        assert!((v - 25.0).abs() < 1e-9);
    }

    #[test]
    fn apply_writes_through_dot_path() {
        let mut node = Node::new("n", NodeKind::Circle { radius: 1.0 });
        node.tween = Some(tween(1000.0));
        assert!(apply_to_node(&mut node, 10_500.0));
        assert!((node.transform.x - 50.0).abs() < 1e-4);
        // Settled: a second application at the same instant is a no-op.
        assert!(!apply_to_node(&mut node, 10_500.0));
    }
}
