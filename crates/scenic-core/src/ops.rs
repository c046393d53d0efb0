//! # Operation application
//!
//! Applies the [`SceneOp`] vocabulary against one working copy of the
//! document. Reference errors (missing update target, missing parent) are
//! surfaced to the caller; inside a `batch` each sub-operation's failure is
//! captured individually and the batch always runs to completion.

use crate::document;
use crate::errors::EngineError;
use rand::Rng;
use scenic_schema::{NodePatch, SceneDocument, SceneOp};
use tracing::{debug, instrument};

pub type OpResult = Result<(), EngineError>;

/// Applies one operation. A primitive op yields exactly one result; a
/// `batch` yields one per sub-operation, in order, without aborting early.
#[instrument(level = "debug", skip_all, fields(op = op_name(op)))]
pub fn apply(doc: &mut SceneDocument, op: &SceneOp, now_ms: f64) -> Vec<OpResult> {
    match op {
        SceneOp::Batch { ops } => {
            let mut results = Vec::with_capacity(ops.len());
            for sub in ops {
                results.extend(apply(doc, sub, now_ms));
            }
            results
        }
        _ => vec![apply_primitive(doc, op, now_ms)],
    }
}

fn op_name(op: &SceneOp) -> &'static str {
    match op {
        SceneOp::Add { .. } => "add",
        SceneOp::Update { .. } => "update",
        SceneOp::Remove { .. } => "remove",
        SceneOp::Set { .. } => "set",
        SceneOp::Batch { .. } => "batch",
    }
}

fn apply_primitive(doc: &mut SceneDocument, op: &SceneOp, now_ms: f64) -> OpResult {
    match op {
        SceneOp::Add { node, parent_id } => {
            let mut node = node.clone();
            // Assign missing ids and enforce document-wide uniqueness for
            // the whole incoming subtree before touching the tree.
            let mut seen = Vec::new();
            let mut duplicate = None;
            document::visit_mut(&mut node, &mut |n| {
                if n.id.is_empty() {
                    n.id = generate_id(n.kind.type_name(), &doc.root, &seen);
                }
                if document::contains_id(&doc.root, &n.id) || seen.contains(&n.id) {
                    duplicate.get_or_insert_with(|| n.id.clone());
                }
                seen.push(n.id.clone());
            });
            if let Some(id) = duplicate {
                return Err(EngineError::DuplicateId(id));
            }

            let parent_id = parent_id.as_deref().unwrap_or(&doc.root.id).to_string();
            let parent = document::find_node_mut(&mut doc.root, &parent_id)
                .ok_or_else(|| EngineError::ParentNotFound(parent_id.clone()))?;
            let children = parent
                .children_mut()
                .ok_or(EngineError::ParentNotGroup(parent_id))?;
            debug!(id = %node.id, "node added");
            children.push(node);
            Ok(())
        }
        SceneOp::Update { node_id, patch } => {
            let node = document::find_node_mut(&mut doc.root, node_id)
                .ok_or_else(|| EngineError::NodeNotFound(node_id.clone()))?;
            apply_patch(node, patch, now_ms);
            Ok(())
        }
        SceneOp::Remove { node_ids, clear } => {
            if *clear {
                if let Some(children) = doc.root.children_mut() {
                    children.clear();
                }
                return Ok(());
            }
            for id in node_ids {
                if *id == doc.root.id {
                    return Err(EngineError::RootRemoval);
                }
                // Missing targets are fine: remove is idempotent.
                document::remove_subtree(&mut doc.root, id);
            }
            Ok(())
        }
        SceneOp::Set {
            background,
            camera,
            gradient,
            width,
            height,
        } => {
            if let Some(bg) = background {
                doc.background = Some(bg.clone());
            }
            if let Some(patch) = camera {
                let cam = &mut doc.camera;
                if let Some(x) = patch.x {
                    cam.x = x;
                }
                if let Some(y) = patch.y {
                    cam.y = y;
                }
                if let Some(zoom) = patch.zoom {
                    cam.zoom = zoom.max(0.01);
                }
                if let Some(rotation) = patch.rotation {
                    cam.rotation = rotation;
                }
                if let Some(bounds) = patch.bounds {
                    cam.bounds = Some(bounds);
                }
            }
            if let Some(def) = gradient {
                match doc.gradients.iter_mut().find(|g| g.id == def.id) {
                    Some(slot) => *slot = def.clone(),
                    None => doc.gradients.push(def.clone()),
                }
            }
            if let Some(w) = width {
                doc.width = *w;
            }
            if let Some(h) = height {
                doc.height = *h;
            }
            Ok(())
        }
        // Handled by `apply`.
        SceneOp::Batch { .. } => Ok(()),
    }
}

fn apply_patch(node: &mut scenic_schema::Node, patch: &NodePatch, now_ms: f64) {
    if let Some(name) = &patch.name {
        node.name = Some(name.clone());
    }
    if let Some(interactive) = patch.interactive {
        node.interactive = interactive;
    }
    if let Some(t) = &patch.transform {
        let dst = &mut node.transform;
        if let Some(v) = t.x {
            dst.x = v;
        }
        if let Some(v) = t.y {
            dst.y = v;
        }
        if let Some(v) = t.rotation {
            dst.rotation = v;
        }
        if let Some(v) = t.scale_x {
            dst.scale_x = v;
        }
        if let Some(v) = t.scale_y {
            dst.scale_y = v;
        }
        if let Some(v) = t.origin_x {
            dst.origin_x = v;
        }
        if let Some(v) = t.origin_y {
            dst.origin_y = v;
        }
    }
    if let Some(s) = &patch.style {
        let dst = &mut node.style;
        if s.fill.is_some() {
            dst.fill = s.fill.clone();
        }
        if s.stroke.is_some() {
            dst.stroke = s.stroke.clone();
        }
        if let Some(v) = s.stroke_width {
            dst.stroke_width = Some(v);
        }
        if let Some(v) = s.opacity {
            dst.opacity = Some(v);
        }
        if let Some(v) = s.visible {
            dst.visible = v;
        }
    }
    if let Some(data) = &patch.data {
        // Shallow merge: incoming keys win, the rest stay.
        for (key, value) in data {
            node.data.insert(key.clone(), value.clone());
        }
    }
    if let Some(tween) = &patch.tween {
        let mut armed = tween.clone();
        armed.started_at = Some(now_ms);
        node.tween = Some(armed);
    }
}

/// Generates an id like `circle-3fa2c1`, retrying on the (unlikely)
/// collision with the document or the incoming subtree.
fn generate_id(type_name: &str, root: &scenic_schema::Node, taken: &[String]) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let candidate = format!("{}-{:06x}", type_name, rng.gen::<u32>() & 0x00ff_ffff);
        if !document::contains_id(root, &candidate) && !taken.contains(&candidate) {
            return candidate;
        }
    }
}
