//! # Rule engine
//!
//! Evaluates a declarative rule set against the document once per tick.
//!
//! ## Responsibilities
//! - **Matching**: selector → state map → proximity → cooldown → probability,
//!   short-circuiting in that order.
//! - **Field effects**: transform/style/data/counter/tween build an immutable
//!   replacement node substituted into the working tree by identity.
//! - **Structural effects**: spawn/remove are never applied mid-tick; they
//!   are queued as [`PendingOp`]s for a batched out-of-band commit.
//! - **Rule management**: [`RuleBook`] upsert/remove and the world-metadata
//!   setter.
//!
//! Evaluation is strictly sequential: rules in the supplied order, nodes in
//! document (pre-order) traversal order. Probability draws come from the
//! caller's [`rand::Rng`], so seeded replay is possible even though live
//! documents use an unseeded source.

use crate::{document, selector};
use rand::Rng;
use scenic_schema::{Effect, EffectKind, Node, Rule, RuleTrigger, SceneDocument};
use std::collections::HashMap;
use tracing::debug;

pub const MIN_TICK_SPEED_MS: u64 = 16;
pub const MAX_TICK_SPEED_MS: u64 = 5_000;

/// A structural edit produced by a rule, deferred for batched commit so the
/// document is not thrashed at tick rate.
#[derive(Debug, Clone)]
pub enum PendingOp {
    /// Spawn `template` at the matched node's parent world position.
    Spawn { template: Node, x: f32, y: f32 },
    /// Remove the matched node's subtree. Carries the node's last world
    /// position so hosts can anchor removal effects after the commit.
    Remove { node_id: String, x: f32, y: f32 },
}

/// What one tick did to the working copy.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Whether any field effect or tween arm changed the tree.
    pub mutated: bool,
    /// Number of (rule, node) firings.
    pub fired: usize,
    pub pending: Vec<PendingOp>,
}

/// The ordered rule set. Upsert-by-id replaces in place so evaluation order
/// is stable across redefinitions.
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    rules: Vec<Rule>,
}

impl RuleBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create-or-update semantics: an id collision replaces the existing
    /// rule entirely, keeping its position.
    pub fn upsert(&mut self, rule: Rule) {
        if let Some(slot) = self.rules.iter_mut().find(|r| r.id == rule.id) {
            *slot = rule;
        } else {
            self.rules.push(rule);
        }
    }

    /// Removes a rule by id. A no-op if absent.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.id != id);
        self.rules.len() != before
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn has_enabled_tick_rules(&self) -> bool {
        self.rules
            .iter()
            .any(|r| r.enabled && r.trigger == RuleTrigger::Tick)
    }
}

/// Sets the process-wide simulation control fields, clamping `tick_speed_ms`
/// to a sane range.
pub fn set_world_meta(doc: &mut SceneDocument, paused: Option<bool>, tick_speed_ms: Option<u64>) {
    if let Some(paused) = paused {
        doc.world.paused = paused;
    }
    if let Some(speed) = tick_speed_ms {
        doc.world.tick_speed_ms = speed.clamp(MIN_TICK_SPEED_MS, MAX_TICK_SPEED_MS);
    }
}

/// Per-document rule evaluation state. The cooldown map is transient: it is
/// keyed by `(rule_id, node_id)` and lives outside the document.
#[derive(Debug, Default)]
pub struct RuleEngine {
    cooldowns: HashMap<(String, String), f64>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every enabled tick rule against the working copy.
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        doc: &mut SceneDocument,
        rules: &[Rule],
        now_ms: f64,
        rng: &mut R,
    ) -> TickReport {
        let mut report = TickReport::default();
        for rule in rules {
            if !rule.enabled || rule.trigger != RuleTrigger::Tick {
                continue;
            }
            // Snapshot the visit order up front; field effects replace nodes
            // in place and never add or remove ids mid-rule.
            for id in document::collect_ids(&doc.root) {
                let passes = match document::find_node(&doc.root, &id) {
                    Some(node) => self.condition_met(doc, node, rule, now_ms, rng),
                    None => false,
                };
                if !passes {
                    continue;
                }
                if apply_effect(doc, &id, &rule.effect, now_ms, rng, &mut report) {
                    report.fired += 1;
                    if rule.condition.cooldown_ms.is_some() {
                        self.cooldowns.insert((rule.id.clone(), id.clone()), now_ms);
                    }
                }
            }
        }
        if report.fired > 0 {
            debug!(
                fired = report.fired,
                pending = report.pending.len(),
                "rule tick"
            );
        }
        report
    }

    fn condition_met<R: Rng + ?Sized>(
        &self,
        doc: &SceneDocument,
        node: &Node,
        rule: &Rule,
        now_ms: f64,
        rng: &mut R,
    ) -> bool {
        let cond = &rule.condition;
        if !selector::matches(node, &cond.selector) {
            return false;
        }

        if let Some(state) = &cond.state {
            let all_match = state
                .iter()
                .all(|(key, expected)| node.data.get(key) == Some(expected));
            if !all_match {
                return false;
            }
        }

        if let Some(proximity) = &cond.proximity {
            if !self.within_proximity(doc, node, &proximity.selector, proximity.radius) {
                return false;
            }
        }

        if let Some(cooldown_ms) = cond.cooldown_ms {
            let key = (rule.id.clone(), node.id.clone());
            if let Some(&last) = self.cooldowns.get(&key) {
                if now_ms - last < cooldown_ms as f64 {
                    return false;
                }
            }
        }

        if let Some(p) = cond.probability {
            if rng.gen::<f64>() >= p {
                return false;
            }
        }

        true
    }

    /// True when any *other* node matching `sel` sits within `radius` of the
    /// candidate, measured on transform-derived world positions.
    fn within_proximity(&self, doc: &SceneDocument, node: &Node, sel: &str, radius: f32) -> bool {
        let Some((x, y)) = document::world_position(&doc.root, &node.id) else {
            return false;
        };
        let mut hit = false;
        document::visit(&doc.root, &mut |other| {
            if hit || other.id == node.id || !selector::matches(other, sel) {
                return;
            }
            if let Some((ox, oy)) = document::world_position(&doc.root, &other.id) {
                let (dx, dy) = (ox - x, oy - y);
                if dx * dx + dy * dy <= radius * radius {
                    hit = true;
                }
            }
        });
        hit
    }
}

/// Applies one effect to the matched node. Returns whether the effect fired
/// (was applied or queued); gates that fail do not count as fired and do
/// not arm cooldowns.
fn apply_effect<R: Rng + ?Sized>(
    doc: &mut SceneDocument,
    node_id: &str,
    effect: &Effect,
    now_ms: f64,
    rng: &mut R,
    report: &mut TickReport,
) -> bool {
    if let Some(p) = effect.probability {
        if rng.gen::<f64>() >= p {
            return false;
        }
    }

    match &effect.kind {
        EffectKind::Transform {
            dx,
            dy,
            drotation,
            dscale,
        } => {
            let Some(node) = document::find_node(&doc.root, node_id) else {
                return false;
            };
            let mut next = node.clone();
            next.transform.x += jitter(*dx, effect.variance, rng) as f32;
            next.transform.y += jitter(*dy, effect.variance, rng) as f32;
            next.transform.rotation += jitter(*drotation, effect.variance, rng) as f32;
            let ds = jitter(*dscale, effect.variance, rng) as f32;
            next.transform.scale_x += ds;
            next.transform.scale_y += ds;
            report.mutated |= document::replace_node(&mut doc.root, next);
            true
        }
        EffectKind::Style {
            fill,
            stroke,
            stroke_width,
            opacity,
        } => {
            let Some(node) = document::find_node(&doc.root, node_id) else {
                return false;
            };
            let mut next = node.clone();
            if fill.is_some() {
                next.style.fill = fill.clone();
            }
            if stroke.is_some() {
                next.style.stroke = stroke.clone();
            }
            if let Some(w) = stroke_width {
                next.style.stroke_width = Some(*w);
            }
            if let Some(o) = opacity {
                next.style.opacity = Some(*o);
            }
            report.mutated |= document::replace_node(&mut doc.root, next);
            true
        }
        EffectKind::Data { set } => {
            let Some(node) = document::find_node(&doc.root, node_id) else {
                return false;
            };
            let mut next = node.clone();
            for (key, value) in set {
                next.data.insert(key.clone(), value.clone());
            }
            report.mutated |= document::replace_node(&mut doc.root, next);
            true
        }
        EffectKind::Counter { key, delta } => {
            let Some(node) = document::find_node(&doc.root, node_id) else {
                return false;
            };
            let mut next = node.clone();
            let current = next
                .data
                .get(key)
                .and_then(serde_json::Value::as_f64)
                .unwrap_or(0.0);
            let updated = current + jitter(*delta, effect.variance, rng);
            if let Some(n) = serde_json::Number::from_f64(updated) {
                next.data.insert(key.clone(), serde_json::Value::Number(n));
            }
            report.mutated |= document::replace_node(&mut doc.root, next);
            true
        }
        EffectKind::Spawn { template } => {
            let parent_id = document::parent_of(&doc.root, node_id)
                .map(|p| p.id.clone())
                .unwrap_or_else(|| doc.root.id.clone());
            let (x, y) = document::world_position(&doc.root, &parent_id).unwrap_or((0.0, 0.0));
            report.pending.push(PendingOp::Spawn {
                template: (**template).clone(),
                x,
                y,
            });
            true
        }
        EffectKind::Remove => {
            let (x, y) = document::world_position(&doc.root, node_id).unwrap_or((0.0, 0.0));
            report.pending.push(PendingOp::Remove {
                node_id: node_id.to_string(),
                x,
                y,
            });
            true
        }
        EffectKind::Tween { tween } => {
            let Some(node) = document::find_node(&doc.root, node_id) else {
                return false;
            };
            let mut next = node.clone();
            let mut armed = tween.clone();
            armed.started_at = Some(now_ms);
            // Overwrites any previous tween on the node.
            next.tween = Some(armed);
            report.mutated |= document::replace_node(&mut doc.root, next);
            true
        }
        // Unrecognized effect tags parse to this and do nothing.
        EffectKind::Noop => false,
    }
}

/// Applies a ± fractional jitter to a numeric delta.
fn jitter<R: Rng + ?Sized>(value: f64, variance: Option<f64>, rng: &mut R) -> f64 {
    match variance {
        Some(v) if v != 0.0 => value * (1.0 + (rng.gen::<f64>() * 2.0 - 1.0) * v),
        _ => value,
    }
}
