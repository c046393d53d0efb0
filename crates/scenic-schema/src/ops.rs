//! The mutation-operation vocabulary.
//!
//! Structural edits enter the engine exclusively through these named,
//! schema-validated operations: the hard serialization contract with the
//! transport layers that deliver them as discrete tool calls.

use crate::{CameraBounds, GradientDef, Node, TweenDef};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One structural operation against a scene document.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SceneOp {
    /// Appends `node` to a parent's children (the root group if omitted).
    /// An empty id is auto-assigned.
    Add {
        node: Node,
        #[serde(default)]
        parent_id: Option<String>,
    },
    /// Partially updates one node: transform/style deep-merge, `data`
    /// shallow-merges, a provided tween is armed, everything else replaces.
    Update {
        node_id: String,
        #[serde(flatten)]
        patch: NodePatch,
    },
    /// Removes the listed subtrees (idempotent for missing ids), or empties
    /// the root's children entirely when `clear` is set.
    Remove {
        #[serde(default)]
        node_ids: Vec<String>,
        #[serde(default)]
        clear: bool,
    },
    /// Scene-level fields. The gradient is upserted into the palette keyed
    /// by its own id.
    Set {
        #[serde(default)]
        background: Option<String>,
        #[serde(default)]
        camera: Option<CameraPatch>,
        #[serde(default)]
        gradient: Option<GradientDef>,
        #[serde(default)]
        width: Option<f32>,
        #[serde(default)]
        height: Option<f32>,
    },
    /// Applies the contained operations in order against one working copy.
    /// Per-operation failures are reported individually; the batch always
    /// runs to completion.
    Batch { ops: Vec<SceneOp> },
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct NodePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub transform: Option<TransformPatch>,
    #[serde(default)]
    pub style: Option<StylePatch>,
    #[serde(default)]
    pub interactive: Option<bool>,
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
    #[serde(default)]
    pub tween: Option<TweenDef>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default)]
pub struct TransformPatch {
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
    #[serde(default)]
    pub rotation: Option<f32>,
    #[serde(default)]
    pub scale_x: Option<f32>,
    #[serde(default)]
    pub scale_y: Option<f32>,
    #[serde(default)]
    pub origin_x: Option<f32>,
    #[serde(default)]
    pub origin_y: Option<f32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct StylePatch {
    #[serde(default)]
    pub fill: Option<String>,
    #[serde(default)]
    pub stroke: Option<String>,
    #[serde(default)]
    pub stroke_width: Option<f32>,
    #[serde(default)]
    pub opacity: Option<f32>,
    #[serde(default)]
    pub visible: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default)]
pub struct CameraPatch {
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
    #[serde(default)]
    pub zoom: Option<f32>,
    #[serde(default)]
    pub rotation: Option<f32>,
    #[serde(default)]
    pub bounds: Option<CameraBounds>,
}
