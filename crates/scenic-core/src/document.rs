//! # Document helpers
//!
//! Traversal, addressing and geometry over the serializable scene tree.
//!
//! ## Responsibilities
//! - **Search**: pre-order lookup of nodes and parents by id.
//! - **Structure**: detaching subtrees, replacing nodes by identity.
//! - **Geometry**: world positions via composed affine transforms, camera
//!   view transform.
//! - **Dot-paths**: numeric get/set used by tweens (`transform.x`,
//!   `style.opacity`, `data.<key>`).

use scenic_schema::{Camera, Node};
use serde_json::Value;

/// Row-major 2D affine matrix `[a, b, c, d, tx, ty]`:
/// `x' = a*x + c*y + tx`, `y' = b*x + d*y + ty`.
pub type Affine = [f32; 6];

pub const IDENTITY: Affine = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Composes `parent * local`.
pub fn compose(p: Affine, l: Affine) -> Affine {
    [
        p[0] * l[0] + p[2] * l[1],
        p[1] * l[0] + p[3] * l[1],
        p[0] * l[2] + p[2] * l[3],
        p[1] * l[2] + p[3] * l[3],
        p[0] * l[4] + p[2] * l[5] + p[4],
        p[1] * l[4] + p[3] * l[5] + p[5],
    ]
}

/// The node's local matrix: translate, then rotate, then scale.
pub fn local_matrix(node: &Node) -> Affine {
    let t = &node.transform;
    let (sin, cos) = t.rotation.to_radians().sin_cos();
    [
        cos * t.scale_x,
        sin * t.scale_x,
        -sin * t.scale_y,
        cos * t.scale_y,
        t.x,
        t.y,
    ]
}

/// Pre-order search for a node by id.
pub fn find_node<'a>(root: &'a Node, id: &str) -> Option<&'a Node> {
    if root.id == id {
        return Some(root);
    }
    root.children()?
        .iter()
        .find_map(|child| find_node(child, id))
}

pub fn find_node_mut<'a>(root: &'a mut Node, id: &str) -> Option<&'a mut Node> {
    if root.id == id {
        return Some(root);
    }
    root.children_mut()?
        .iter_mut()
        .find_map(|child| find_node_mut(child, id))
}

/// Returns the group that directly contains `id`.
pub fn parent_of<'a>(root: &'a Node, id: &str) -> Option<&'a Node> {
    let children = root.children()?;
    if children.iter().any(|c| c.id == id) {
        return Some(root);
    }
    children.iter().find_map(|child| parent_of(child, id))
}

/// Visits every node in document (pre-order) traversal order.
pub fn visit<'a>(root: &'a Node, f: &mut impl FnMut(&'a Node)) {
    f(root);
    if let Some(children) = root.children() {
        for child in children {
            visit(child, f);
        }
    }
}

/// Mutable pre-order visit.
pub fn visit_mut(root: &mut Node, f: &mut impl FnMut(&mut Node)) {
    f(root);
    if let Some(children) = root.children_mut() {
        for child in children {
            visit_mut(child, f);
        }
    }
}

/// Pre-order list of every node id in the tree.
pub fn collect_ids(root: &Node) -> Vec<String> {
    let mut ids = Vec::new();
    visit(root, &mut |node| ids.push(node.id.clone()));
    ids
}

pub fn contains_id(root: &Node, id: &str) -> bool {
    find_node(root, id).is_some()
}

/// Detaches the subtree rooted at `id` and returns it. The document root
/// itself cannot be detached.
pub fn remove_subtree(root: &mut Node, id: &str) -> Option<Node> {
    let children = root.children_mut()?;
    if let Some(pos) = children.iter().position(|c| c.id == id) {
        return Some(children.remove(pos));
    }
    children
        .iter_mut()
        .find_map(|child| remove_subtree(child, id))
}

/// Substitutes `replacement` for the node sharing its id. Returns whether a
/// node was replaced.
pub fn replace_node(root: &mut Node, replacement: Node) -> bool {
    match find_node_mut(root, &replacement.id.clone()) {
        Some(slot) => {
            *slot = replacement;
            true
        }
        None => false,
    }
}

/// World position of a node: the translation component of its composed
/// ancestor chain. The normalized origin is ignored (shapes have no
/// layout-resolved size at this level).
pub fn world_position(root: &Node, id: &str) -> Option<(f32, f32)> {
    world_matrix(root, id, IDENTITY).map(|m| (m[4], m[5]))
}

fn world_matrix(node: &Node, id: &str, parent: Affine) -> Option<Affine> {
    let m = compose(parent, local_matrix(node));
    if node.id == id {
        return Some(m);
    }
    node.children()?
        .iter()
        .find_map(|child| world_matrix(child, id, m))
}

/// Computes the camera's view transform for a viewport: center the camera
/// target, then zoom and rotate about the viewport center. Camera bounds, if
/// present, clamp the target point.
pub fn view_transform(camera: &Camera, viewport_w: f32, viewport_h: f32) -> Affine {
    let (mut cx, mut cy) = (camera.x, camera.y);
    if let Some(b) = &camera.bounds {
        cx = cx.clamp(b.min_x, b.max_x);
        cy = cy.clamp(b.min_y, b.max_y);
    }
    let zoom = camera.zoom.max(f32::EPSILON);
    let center = [1.0, 0.0, 0.0, 1.0, viewport_w / 2.0, viewport_h / 2.0];
    let (sin, cos) = camera.rotation.to_radians().sin_cos();
    let rotate_scale = [cos * zoom, sin * zoom, -sin * zoom, cos * zoom, 0.0, 0.0];
    let uncenter = [1.0, 0.0, 0.0, 1.0, -cx, -cy];
    compose(compose(center, rotate_scale), uncenter)
}

/// Reads a numeric value at a dot-path into the node's own fields.
pub fn get_number_path(node: &Node, path: &str) -> Option<f64> {
    match path {
        "transform.x" => Some(node.transform.x as f64),
        "transform.y" => Some(node.transform.y as f64),
        "transform.rotation" => Some(node.transform.rotation as f64),
        "transform.scale_x" => Some(node.transform.scale_x as f64),
        "transform.scale_y" => Some(node.transform.scale_y as f64),
        "transform.origin_x" => Some(node.transform.origin_x as f64),
        "transform.origin_y" => Some(node.transform.origin_y as f64),
        "style.opacity" => node.style.opacity.map(|v| v as f64),
        "style.stroke_width" => node.style.stroke_width.map(|v| v as f64),
        _ => {
            let key = path.strip_prefix("data.")?;
            node.data.get(key).and_then(Value::as_f64)
        }
    }
}

/// Writes a numeric value through a dot-path. Unknown paths are a no-op
/// (malformed authoring input degrades, it never errors). Returns whether
/// the node changed.
pub fn set_number_path(node: &mut Node, path: &str, value: f64) -> bool {
    let v = value as f32;
    match path {
        "transform.x" => node.transform.x = v,
        "transform.y" => node.transform.y = v,
        "transform.rotation" => node.transform.rotation = v,
        "transform.scale_x" => node.transform.scale_x = v,
        "transform.scale_y" => node.transform.scale_y = v,
        "transform.origin_x" => node.transform.origin_x = v,
        "transform.origin_y" => node.transform.origin_y = v,
        "style.opacity" => node.style.opacity = Some(v),
        "style.stroke_width" => node.style.stroke_width = Some(v),
        _ => {
            let Some(key) = path.strip_prefix("data.") else {
                return false;
            };
            match serde_json::Number::from_f64(value) {
                Some(n) => {
                    node.data.insert(key.to_string(), Value::Number(n));
                }
                None => return false,
            }
        }
    }
    true
}
