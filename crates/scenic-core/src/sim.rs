//! # Simulation driver
//!
//! One cooperatively-scheduled timeline per document: the rule tick, tween
//! application and particle stepping all run against a single working copy,
//! never concurrently with each other. Structural effects produced by rules
//! are not applied inside the tick that produced them; they accumulate in a
//! queue and are flushed as one batched mutation after a debounce window, so
//! the rate of structural commits is bounded independently of tick rate.
//!
//! [`World`] is the synchronous core (also the unit-test surface);
//! [`Simulation`] wraps it in a thread-backed frame driver. A paused world,
//! or one with no enabled tick rules, blocks on its command channel alone:
//! no timer is armed, so an idle document consumes no scheduling resources.

use crate::ops::{self, OpResult};
use crate::particles::{self, Particle};
use crate::rules::{self, PendingOp, RuleBook, RuleEngine};
use crate::{document, tween};
use crossbeam_channel::{never, select, unbounded, Receiver, Sender};
use rand::Rng;
use scenic_schema::{EmitterDef, NodeKind, Rule, SceneDocument, SceneOp};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Current wall-clock time in epoch milliseconds, the unit tweens and
/// cooldowns are expressed in.
pub fn epoch_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64() * 1000.0)
        .unwrap_or(0.0)
}

/// The single-writer working state for one document's timeline.
pub struct World {
    pub doc: SceneDocument,
    pub rules: RuleBook,
    engine: RuleEngine,
    /// Ephemeral particle state, keyed by particles-holder node id. Never
    /// serialized; regenerable from emitter descriptors plus elapsed time.
    particle_state: HashMap<String, Vec<Particle>>,
    pending: Vec<PendingOp>,
}

impl World {
    pub fn new(doc: SceneDocument) -> Self {
        Self {
            doc,
            rules: RuleBook::new(),
            engine: RuleEngine::new(),
            particle_state: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// Whether the tick loop should be scheduled at all.
    pub fn runnable(&self) -> bool {
        !self.doc.world.paused && self.rules.has_enabled_tick_rules()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Live particles for one holder node, if any have been simulated.
    pub fn particles(&self, holder_id: &str) -> Option<&[Particle]> {
        self.particle_state.get(holder_id).map(Vec::as_slice)
    }

    /// One simulation step: tween application, particle stepping, then the
    /// rule tick. Returns whether the document changed.
    pub fn tick<R: Rng + ?Sized>(&mut self, now_ms: f64, dt_ms: f64, rng: &mut R) -> bool {
        let mut changed = false;

        document::visit_mut(&mut self.doc.root, &mut |node| {
            if tween::apply_to_node(node, now_ms) {
                changed = true;
            }
        });

        let mut holders: Vec<(String, Vec<EmitterDef>)> = Vec::new();
        document::visit(&self.doc.root, &mut |node| {
            if let NodeKind::Particles { emitters } = &node.kind {
                holders.push((node.id.clone(), emitters.clone()));
            }
        });
        for (id, emitters) in &holders {
            let set = self.particle_state.entry(id.clone()).or_default();
            particles::step(set, emitters, dt_ms, rng);
        }
        // Holders removed from the document take their particles with them.
        self.particle_state
            .retain(|id, _| holders.iter().any(|(hid, _)| hid == id));

        let report = self.engine.tick(&mut self.doc, self.rules.rules(), now_ms, rng);
        changed |= report.mutated;
        self.pending.extend(report.pending);
        changed
    }

    /// Commits the queued structural effects as one batched mutation. Spawned
    /// templates land under the root at the recorded world position, with
    /// fresh ids throughout so repeated spawns never collide.
    pub fn flush_pending(&mut self, now_ms: f64) -> Vec<OpResult> {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return Vec::new();
        }
        let ops_list: Vec<SceneOp> = pending
            .into_iter()
            .map(|op| match op {
                PendingOp::Spawn {
                    mut template,
                    x,
                    y,
                } => {
                    document::visit_mut(&mut template, &mut |n| n.id = String::new());
                    template.transform.x += x;
                    template.transform.y += y;
                    SceneOp::Add {
                        node: template,
                        parent_id: None,
                    }
                }
                PendingOp::Remove { node_id, .. } => SceneOp::Remove {
                    node_ids: vec![node_id],
                    clear: false,
                },
            })
            .collect();
        let count = ops_list.len();
        let results = ops::apply(&mut self.doc, &SceneOp::Batch { ops: ops_list }, now_ms);
        debug!(count, "flushed structural effects");
        results
    }
}

/// Control messages for a running [`Simulation`].
#[derive(Debug)]
pub enum Command {
    /// Applies a mutation operation against the working copy.
    Apply(SceneOp),
    UpsertRule(Rule),
    RemoveRule(String),
    SetWorld {
        paused: Option<bool>,
        tick_speed_ms: Option<u64>,
    },
    Shutdown,
}

/// What a [`Simulation`] reports back to its host.
#[derive(Debug)]
pub enum Event {
    /// A new document version. Hosts hand this to their reconciler.
    Published(Arc<SceneDocument>),
    /// Per-operation outcome of an [`Command::Apply`].
    Applied(Vec<OpResult>),
    /// Per-operation outcome of a debounced structural flush.
    Flushed(Vec<OpResult>),
}

#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    /// How long queued spawn/remove effects wait before the batched commit.
    pub debounce_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { debounce_ms: 250 }
    }
}

/// A thread-backed frame driver over one [`World`]. Independent documents
/// run independent simulations; there is no shared mutable state.
pub struct Simulation {
    commands: Sender<Command>,
    events: Receiver<Event>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Simulation {
    pub fn spawn(doc: SceneDocument, rules: RuleBook, config: SimulationConfig) -> Self {
        let (cmd_tx, cmd_rx) = unbounded();
        let (evt_tx, evt_rx) = unbounded();
        let mut world = World::new(doc);
        world.rules = rules;
        let thread = thread::spawn(move || run_loop(world, cmd_rx, evt_tx, config));
        Self {
            commands: cmd_tx,
            events: evt_rx,
            thread: Some(thread),
        }
    }

    /// Sends a control message. Returns whether the driver is still alive.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn events(&self) -> &Receiver<Event> {
        &self.events
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        // Cooperative teardown: stop the driver and drop any pending flush
        // so nothing mutates the document after the owning session ends.
        let _ = self.commands.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run_loop(
    mut world: World,
    commands: Receiver<Command>,
    events: Sender<Event>,
    config: SimulationConfig,
) {
    let mut rng = rand::thread_rng();
    let mut flush_deadline: Option<Instant> = None;

    loop {
        // Arm timers only when there is work: a paused or rule-less world
        // parks on the command channel.
        let tick_timer = if world.runnable() {
            crossbeam_channel::after(Duration::from_millis(world.doc.world.tick_speed_ms))
        } else {
            never()
        };
        let flush_timer = match flush_deadline {
            Some(deadline) => {
                crossbeam_channel::after(deadline.saturating_duration_since(Instant::now()))
            }
            None => never(),
        };

        select! {
            recv(commands) -> msg => {
                let Ok(command) = msg else { break };
                match command {
                    Command::Shutdown => break,
                    Command::Apply(op) => {
                        let results = ops::apply(&mut world.doc, &op, epoch_ms());
                        if results.iter().any(|r| r.is_err()) {
                            warn!("operation partially failed");
                        }
                        let _ = events.send(Event::Applied(results));
                        let _ = events.send(Event::Published(Arc::new(world.doc.clone())));
                    }
                    Command::UpsertRule(rule) => world.rules.upsert(rule),
                    Command::RemoveRule(id) => {
                        world.rules.remove(&id);
                    }
                    Command::SetWorld { paused, tick_speed_ms } => {
                        rules::set_world_meta(&mut world.doc, paused, tick_speed_ms);
                        let _ = events.send(Event::Published(Arc::new(world.doc.clone())));
                    }
                }
            },
            recv(tick_timer) -> _ => {
                let now = epoch_ms();
                let dt = world.doc.world.tick_speed_ms as f64;
                let changed = world.tick(now, dt, &mut rng);
                if world.has_pending() && flush_deadline.is_none() {
                    flush_deadline = Some(Instant::now() + Duration::from_millis(config.debounce_ms));
                }
                if changed {
                    let _ = events.send(Event::Published(Arc::new(world.doc.clone())));
                }
            },
            recv(flush_timer) -> _ => {
                flush_deadline = None;
                let results = world.flush_pending(epoch_ms());
                let _ = events.send(Event::Flushed(results));
                let _ = events.send(Event::Published(Arc::new(world.doc.clone())));
            },
        }
    }
}
