//! Simulation Tests
//!
//! The synchronous world step (tweens, particles, rules, deferred flush)
//! and a smoke test of the thread-backed driver.

use rand::rngs::StdRng;
use rand::SeedableRng;
use scenic_core::document;
use scenic_core::sim::{Command, Event, Simulation, SimulationConfig, World};
use scenic_core::RuleBook;
use scenic_schema::{
    Condition, Easing, Effect, EffectKind, EmitterDef, Node, NodeKind, Rule, RuleTrigger,
    SceneDocument, SceneOp, TweenDef,
};
use serde_json::Value;
use std::time::Duration;

fn fish_doc() -> SceneDocument {
    let mut doc = SceneDocument::new(800.0, 600.0);
    let mut fish = Node::new("f1", NodeKind::Circle { radius: 4.0 });
    fish.data
        .insert("entityType".to_string(), Value::from("fish"));
    doc.root.children_mut().unwrap().push(fish);
    doc
}

fn swim_rule() -> Rule {
    Rule {
        id: "swim".to_string(),
        enabled: true,
        trigger: RuleTrigger::Tick,
        condition: Condition {
            selector: "entityType:fish".to_string(),
            state: None,
            proximity: None,
            cooldown_ms: None,
            probability: None,
        },
        effect: Effect::from(EffectKind::Transform {
            dx: 2.0,
            dy: 0.0,
            drotation: 0.0,
            dscale: 0.0,
        }),
    }
}

#[test]
fn tick_runs_tweens_particles_and_rules_together() {
    let mut doc = fish_doc();
    document::find_node_mut(&mut doc.root, "f1").unwrap().tween = Some(TweenDef {
        property: "transform.y".to_string(),
        from: 0.0,
        to: 100.0,
        duration_ms: 1000.0,
        easing: Easing::Linear,
        delay_ms: 0.0,
        repeat: 0,
        yoyo: false,
        started_at: Some(0.0),
    });
    let emitter = Node::new(
        "bubbles",
        NodeKind::Particles {
            emitters: vec![EmitterDef {
                rate: 10.0,
                ..Default::default()
            }],
        },
    );
    doc.root.children_mut().unwrap().push(emitter);

    let mut world = World::new(doc);
    world.rules.upsert(swim_rule());
    let mut rng = StdRng::seed_from_u64(3);

    let changed = world.tick(500.0, 500.0, &mut rng);
    assert!(changed);

    let fish = document::find_node(&world.doc.root, "f1").unwrap();
    // Tween applied before the rule tick.
    assert!((fish.transform.y - 50.0).abs() < 1e-3);
    assert!((fish.transform.x - 2.0).abs() < 1e-6);
    // floor(10 * 500 / 1000) spawns.
    assert_eq!(world.particles("bubbles").unwrap().len(), 5);
}

#[test]
fn particles_for_removed_holders_are_dropped() {
    let mut doc = SceneDocument::new(100.0, 100.0);
    doc.root.children_mut().unwrap().push(Node::new(
        "bubbles",
        NodeKind::Particles {
            emitters: vec![EmitterDef {
                rate: 10.0,
                ..Default::default()
            }],
        },
    ));
    let mut world = World::new(doc);
    let mut rng = StdRng::seed_from_u64(3);
    world.tick(500.0, 500.0, &mut rng);
    assert!(world.particles("bubbles").is_some());

    world.doc.root.children_mut().unwrap().clear();
    world.tick(1000.0, 500.0, &mut rng);
    assert!(world.particles("bubbles").is_none());
}

#[test]
fn structural_effects_wait_for_the_flush() {
    let mut doc = fish_doc();
    doc.root.children_mut().unwrap()[0].transform.x = 30.0;
    let mut world = World::new(doc);
    world.rules.upsert(Rule {
        id: "lay".to_string(),
        enabled: true,
        trigger: RuleTrigger::Tick,
        condition: Condition {
            selector: "entityType:fish".to_string(),
            state: None,
            proximity: None,
            cooldown_ms: None,
            probability: None,
        },
        effect: Effect::from(EffectKind::Spawn {
            template: Box::new(Node::new("", NodeKind::Circle { radius: 1.0 })),
        }),
    });
    world.rules.upsert(Rule {
        id: "die".to_string(),
        enabled: true,
        trigger: RuleTrigger::Tick,
        condition: Condition {
            selector: "entityType:fish".to_string(),
            state: None,
            proximity: None,
            cooldown_ms: None,
            probability: None,
        },
        effect: Effect::from(EffectKind::Remove),
    });

    let mut rng = StdRng::seed_from_u64(3);
    world.tick(0.0, 50.0, &mut rng);
    assert!(world.has_pending());
    assert_eq!(world.doc.root.children().unwrap().len(), 1);

    let results = world.flush_pending(0.0);
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(Result::is_ok));
    assert!(!world.has_pending());

    // The fish is gone, the spawn landed under the root with a fresh id.
    assert!(!document::contains_id(&world.doc.root, "f1"));
    let children = world.doc.root.children().unwrap();
    assert_eq!(children.len(), 1);
    assert!(children[0].id.starts_with("circle-"));
    assert_eq!(children[0].transform.x, 0.0);
}

#[test]
fn runnable_requires_rules_and_an_unpaused_world() {
    let mut world = World::new(fish_doc());
    assert!(!world.runnable());

    world.rules.upsert(swim_rule());
    assert!(world.runnable());

    world.doc.world.paused = true;
    assert!(!world.runnable());

    world.doc.world.paused = false;
    let mut disabled = swim_rule();
    disabled.enabled = false;
    world.rules.upsert(disabled);
    assert!(!world.runnable());
}

#[test]
fn driver_publishes_ticks_applies_ops_and_shuts_down() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let mut rules = RuleBook::new();
    rules.upsert(swim_rule());
    let mut doc = fish_doc();
    doc.world.tick_speed_ms = 16;

    let sim = Simulation::spawn(doc, rules, SimulationConfig { debounce_ms: 50 });

    // The rule moves the fish every tick, so a publish arrives promptly.
    let event = sim
        .events()
        .recv_timeout(Duration::from_secs(2))
        .expect("no publish from tick loop");
    match event {
        Event::Published(doc) => {
            let fish = document::find_node(&doc.root, "f1").unwrap();
            assert!(fish.transform.x > 0.0);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    assert!(sim.send(Command::Apply(SceneOp::Set {
        background: Some("#123".to_string()),
        camera: None,
        gradient: None,
        width: None,
        height: None,
    })));

    // Drain until the apply result comes through.
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    let mut applied = false;
    while std::time::Instant::now() < deadline {
        match sim.events().recv_timeout(Duration::from_millis(200)) {
            Ok(Event::Applied(results)) => {
                assert!(results.iter().all(Result::is_ok));
                applied = true;
                break;
            }
            Ok(_) => continue,
            Err(_) => break,
        }
    }
    assert!(applied, "apply result never arrived");

    drop(sim); // joins the driver thread
}

#[test]
fn paused_driver_stays_quiet() {
    let mut rules = RuleBook::new();
    rules.upsert(swim_rule());
    let mut doc = fish_doc();
    doc.world.paused = true;
    doc.world.tick_speed_ms = 16;

    let sim = Simulation::spawn(doc, rules, SimulationConfig::default());
    assert!(sim
        .events()
        .recv_timeout(Duration::from_millis(200))
        .is_err());
}
