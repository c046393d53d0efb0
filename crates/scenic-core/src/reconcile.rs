//! # Reconciler
//!
//! Retained-mode diffing: keeps a persistent tree of backend render objects
//! in sync with repeated snapshots of the scene document, without full
//! teardown/rebuild.
//!
//! ## Algorithm
//! - Every tracked node stores a structural snapshot of its own fields
//!   (children excluded). An unchanged non-group node is skipped entirely.
//! - An unchanged-snapshot group still recurses: children are diffed
//!   independently of the parent's own fields.
//! - A variant-tag change or an own-field change destroys and recreates the
//!   subtree's render object. Backend objects are treated as immutable once
//!   built; no partial field patching is attempted.
//! - Group children: ids gone from the whole document are torn down (their
//!   tracked children first); ids merely moved to another group keep their
//!   objects. The new child list is reconciled in order, then sibling order
//!   is re-asserted index by index.
//! - Interaction flags and selection overlays are re-asserted on every pass;
//!   they are not part of the diffed identity set.
//!
//! A node whose backend object fails to build (say, an unresolvable texture)
//! degrades to a placeholder. Reconciliation never fails a whole pass for
//! one bad node.

use crate::document;
use scenic_schema::{Node, SceneDocument};
use std::collections::HashMap;
use tracing::{debug, warn};

/// The injected drawing backend. The reconciler never reaches into global
/// state; hosts hand it a backend per call.
pub trait RenderBackend {
    /// An opaque, owned reference to one live render object.
    type Handle;

    /// Builds the render object for a node. Errors are isolated by the
    /// reconciler via [`RenderBackend::create_placeholder`].
    fn create(&mut self, node: &Node, doc: &SceneDocument) -> anyhow::Result<Self::Handle>;

    /// Builds a neutral placeholder standing in for a node that failed to
    /// build. Must not fail.
    fn create_placeholder(&mut self, node: &Node) -> Self::Handle;

    fn destroy(&mut self, handle: Self::Handle);

    /// Re-asserts a node's position among its siblings.
    fn set_child_index(&mut self, handle: &Self::Handle, index: usize);

    /// Attaches or detaches interaction handlers.
    fn set_interactive(&mut self, handle: &Self::Handle, interactive: bool);

    /// Selection/debug overlays, fully recomputed each pass.
    fn draw_overlays(&mut self, doc: &SceneDocument, selection: &[String]);
}

/// Counters for one reconciliation pass. Reconciling the same document twice
/// in a row yields `created == destroyed == 0` on the second pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    pub created: usize,
    pub destroyed: usize,
    /// Nodes whose render object failed to build and got a placeholder.
    pub degraded: usize,
    /// Nodes left untouched because their snapshot was unchanged.
    pub unchanged: usize,
}

struct Entry<H> {
    handle: H,
    type_name: &'static str,
    snapshot: String,
    child_ids: Vec<String>,
}

/// The persistent object map for one document instance.
pub struct Reconciler<B: RenderBackend> {
    entries: HashMap<String, Entry<B::Handle>>,
}

impl<B: RenderBackend> Default for Reconciler<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: RenderBackend> Reconciler<B> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Number of live tracked render objects.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Brings the persistent tree in line with `doc`. Idempotent: re-running
    /// against an unchanged document touches nothing.
    pub fn reconcile(
        &mut self,
        doc: &SceneDocument,
        selection: &[String],
        backend: &mut B,
    ) -> ReconcileStats {
        let mut stats = ReconcileStats::default();
        self.reconcile_node(&doc.root, doc, backend, &mut stats);
        backend.draw_overlays(doc, selection);
        if stats.created > 0 || stats.destroyed > 0 {
            debug!(
                created = stats.created,
                destroyed = stats.destroyed,
                degraded = stats.degraded,
                "reconciled"
            );
        }
        stats
    }

    /// Tears down every tracked object (session end).
    pub fn clear(&mut self, backend: &mut B) {
        let ids: Vec<String> = self.entries.keys().cloned().collect();
        let mut stats = ReconcileStats::default();
        for id in ids {
            self.destroy_subtree(&id, backend, &mut stats);
        }
    }

    fn reconcile_node(
        &mut self,
        node: &Node,
        doc: &SceneDocument,
        backend: &mut B,
        stats: &mut ReconcileStats,
    ) {
        let type_name = node.kind.type_name();
        let snapshot = snapshot_of(node);

        let keep = match self.entries.get(&node.id) {
            Some(entry) => entry.type_name == type_name && entry.snapshot == snapshot,
            None => false,
        };

        if keep {
            stats.unchanged += 1;
        } else {
            // Identity broken: tag or own-field change rebuilds the subtree.
            self.destroy_subtree(&node.id, backend, stats);
            let handle = match backend.create(node, doc) {
                Ok(handle) => handle,
                Err(err) => {
                    warn!(id = %node.id, kind = type_name, error = %err, "render object failed, using placeholder");
                    stats.degraded += 1;
                    backend.create_placeholder(node)
                }
            };
            stats.created += 1;
            self.entries.insert(
                node.id.clone(),
                Entry {
                    handle,
                    type_name,
                    snapshot,
                    child_ids: Vec::new(),
                },
            );
        }

        if let Some(entry) = self.entries.get(&node.id) {
            backend.set_interactive(&entry.handle, node.interactive);
        }

        let Some(children) = node.children() else {
            return;
        };

        let new_ids: Vec<String> = children.iter().map(|c| c.id.clone()).collect();
        let old_ids = self
            .entries
            .get(&node.id)
            .map(|e| e.child_ids.clone())
            .unwrap_or_default();

        // Children first: tear down anything no longer present. A child that
        // left this group but still lives elsewhere in the document was
        // reparented; its entry stays with its render object.
        for old in &old_ids {
            if !new_ids.contains(old) && !document::contains_id(&doc.root, old) {
                self.destroy_subtree(old, backend, stats);
            }
        }

        for child in children {
            self.reconcile_node(child, doc, backend, stats);
        }

        // Re-assert sibling order to match document order.
        for (index, id) in new_ids.iter().enumerate() {
            if let Some(entry) = self.entries.get(id) {
                backend.set_child_index(&entry.handle, index);
            }
        }

        if let Some(entry) = self.entries.get_mut(&node.id) {
            entry.child_ids = new_ids;
        }
    }

    fn destroy_subtree(&mut self, id: &str, backend: &mut B, stats: &mut ReconcileStats) {
        let Some(entry) = self.entries.remove(id) else {
            return;
        };
        for child in &entry.child_ids {
            self.destroy_subtree(child, backend, stats);
        }
        backend.destroy(entry.handle);
        stats.destroyed += 1;
    }
}

/// Structural snapshot of a node's own fields, children excluded.
fn snapshot_of(node: &Node) -> String {
    match serde_json::to_value(node) {
        Ok(mut value) => {
            if let Some(map) = value.as_object_mut() {
                map.remove("children");
            }
            value.to_string()
        }
        // Documents are plain data; serialization cannot fail in practice.
        Err(_) => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Headless backend
// ---------------------------------------------------------------------------

/// What a [`HeadlessBackend`] was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOp {
    Created { id: String, kind: &'static str },
    Destroyed(u64),
    ChildIndex { handle: u64, index: usize },
    Interactive { handle: u64, on: bool },
    Overlays { selection: Vec<String> },
}

/// A backend producing opaque numeric handles and an op log. Serves tests
/// and hosts that simulate without drawing.
///
/// With a [`crate::TextureSource`] attached, image-bearing nodes resolve
/// their `src` through it; resolution failures exercise the reconciler's
/// placeholder path.
#[derive(Default)]
pub struct HeadlessBackend {
    next_handle: u64,
    pub textures: Option<std::sync::Arc<dyn crate::TextureSource>>,
    pub log: Vec<BackendOp>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_textures(textures: std::sync::Arc<dyn crate::TextureSource>) -> Self {
        Self {
            textures: Some(textures),
            ..Self::default()
        }
    }

    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl RenderBackend for HeadlessBackend {
    type Handle = u64;

    fn create(&mut self, node: &Node, _doc: &SceneDocument) -> anyhow::Result<Self::Handle> {
        if let Some(textures) = self.textures.clone() {
            let src = match &node.kind {
                scenic_schema::NodeKind::Image { src, .. } => Some(src),
                scenic_schema::NodeKind::Sprite { src, .. } => Some(src),
                scenic_schema::NodeKind::Tilemap { tileset, .. } => Some(tileset),
                _ => None,
            };
            if let Some(src) = src {
                textures.load_bytes(src)?;
            }
        }
        let handle = self.next();
        self.log.push(BackendOp::Created {
            id: node.id.clone(),
            kind: node.kind.type_name(),
        });
        Ok(handle)
    }

    fn create_placeholder(&mut self, node: &Node) -> Self::Handle {
        let handle = self.next();
        self.log.push(BackendOp::Created {
            id: node.id.clone(),
            kind: "placeholder",
        });
        handle
    }

    fn destroy(&mut self, handle: Self::Handle) {
        self.log.push(BackendOp::Destroyed(handle));
    }

    fn set_child_index(&mut self, handle: &Self::Handle, index: usize) {
        self.log.push(BackendOp::ChildIndex {
            handle: *handle,
            index,
        });
    }

    fn set_interactive(&mut self, handle: &Self::Handle, interactive: bool) {
        self.log.push(BackendOp::Interactive {
            handle: *handle,
            on: interactive,
        });
    }

    fn draw_overlays(&mut self, _doc: &SceneDocument, selection: &[String]) {
        self.log.push(BackendOp::Overlays {
            selection: selection.to_vec(),
        });
    }
}
