//! # Scenic Schema
//!
//! The serializable data model shared by every layer of the scenic engine:
//! the scene document (node tree, camera, palette), tween definitions, the
//! easing table, and declarative rules.
//!
//! Everything here is plain data (no functions, no reference cycles), so a
//! document round-trips losslessly through JSON. Behavior (rule evaluation,
//! tween interpolation, reconciliation) lives in `scenic-core`.

use keyframe::EasingFunction;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod ops;
pub use ops::{CameraPatch, NodePatch, SceneOp, StylePatch, TransformPatch};

/// The full serializable state of one scene.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SceneDocument {
    pub width: f32,
    pub height: f32,
    /// Background paint (CSS-style color string). `None` leaves it to the host.
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub camera: Camera,
    /// Flat, id-keyed gradient palette referenced by paint strings.
    #[serde(default)]
    pub gradients: Vec<GradientDef>,
    /// Flat, id-keyed filter palette.
    #[serde(default)]
    pub filters: Vec<FilterDef>,
    /// Process-wide simulation control. Not part of any node.
    #[serde(default)]
    pub world: WorldMeta,
    pub root: Node,
}

impl SceneDocument {
    /// Creates an empty document with a root group named `root`.
    pub fn new(width: f32, height: f32) -> Self {
        let mut root = Node::new("root", NodeKind::Group { children: vec![] });
        root.name = Some("root".to_string());
        Self {
            width,
            height,
            background: None,
            camera: Camera::default(),
            gradients: Vec::new(),
            filters: Vec::new(),
            world: WorldMeta::default(),
            root,
        }
    }
}

/// One addressable entity in the scene tree.
///
/// Identity (`id`) is the sole key used for diffing and mutation addressing:
/// renaming an id is equivalent to destroying and recreating the node.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Node {
    /// Unique within the whole document, not per subtree.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub style: Style,
    #[serde(default)]
    pub interactive: bool,
    /// Freeform author/agent metadata (`entityType`, `tags`, counters...).
    #[serde(default)]
    pub data: Map<String, Value>,
    /// At most one live tween per node, keyed by a dot-path into the node.
    #[serde(default)]
    pub tween: Option<TweenDef>,

    // The specific variant (Rect, Circle, Group, ...).
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            name: None,
            transform: Transform::default(),
            style: Style::default(),
            interactive: false,
            data: Map::new(),
            tween: None,
            kind,
        }
    }

    /// Children of a group node; `None` for every other variant.
    pub fn children(&self) -> Option<&Vec<Node>> {
        match &self.kind {
            NodeKind::Group { children } => Some(children),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match &mut self.kind {
            NodeKind::Group { children } => Some(children),
            _ => None,
        }
    }
}

/// The closed set of node variants. Adding a variant is a compile-time
/// checked change everywhere the engine matches on it.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// Axis-aligned rectangle with optional rounded corners.
    Rect {
        width: f32,
        height: f32,
        #[serde(default)]
        corner_radius: f32,
    },
    Circle {
        radius: f32,
    },
    Ellipse {
        rx: f32,
        ry: f32,
    },
    /// Line from the node origin to (x2, y2) in local space.
    Line {
        x2: f32,
        y2: f32,
    },
    Polyline {
        points: Vec<[f32; 2]>,
    },
    Polygon {
        points: Vec<[f32; 2]>,
    },
    /// SVG-style path data.
    Path {
        d: String,
    },
    Text {
        content: String,
        #[serde(default = "default_font_size")]
        font_size: f32,
    },
    Image {
        src: String,
        #[serde(default)]
        width: Option<f32>,
        #[serde(default)]
        height: Option<f32>,
    },
    /// Ordered list of child nodes. The only variant with children.
    Group {
        #[serde(default)]
        children: Vec<Node>,
    },
    /// Frame-indexed sheet image.
    Sprite {
        src: String,
        frame_width: f32,
        frame_height: f32,
        #[serde(default)]
        frame: u32,
    },
    Tilemap {
        tileset: String,
        tile_width: f32,
        tile_height: f32,
        columns: u32,
        #[serde(default)]
        tiles: Vec<u32>,
    },
    /// Holder for bounded particle emission. Particle state itself is
    /// ephemeral and never serialized.
    Particles {
        #[serde(default)]
        emitters: Vec<EmitterDef>,
    },
}

fn default_font_size() -> f32 {
    16.0
}

impl NodeKind {
    /// Stable variant tag, matching the serialized `type` field.
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Rect { .. } => "rect",
            NodeKind::Circle { .. } => "circle",
            NodeKind::Ellipse { .. } => "ellipse",
            NodeKind::Line { .. } => "line",
            NodeKind::Polyline { .. } => "polyline",
            NodeKind::Polygon { .. } => "polygon",
            NodeKind::Path { .. } => "path",
            NodeKind::Text { .. } => "text",
            NodeKind::Image { .. } => "image",
            NodeKind::Group { .. } => "group",
            NodeKind::Sprite { .. } => "sprite",
            NodeKind::Tilemap { .. } => "tilemap",
            NodeKind::Particles { .. } => "particles",
        }
    }
}

/// Local 2D transform: translation, rotation (degrees), non-uniform scale,
/// normalized origin.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Transform {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub rotation: f32,
    #[serde(default = "default_scale")]
    pub scale_x: f32,
    #[serde(default = "default_scale")]
    pub scale_y: f32,
    #[serde(default = "default_origin")]
    pub origin_x: f32,
    #[serde(default = "default_origin")]
    pub origin_y: f32,
}

fn default_scale() -> f32 {
    1.0
}

fn default_origin() -> f32 {
    0.5
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            origin_x: 0.5,
            origin_y: 0.5,
        }
    }
}

/// Paint and visibility attributes.
///
/// `fill`/`stroke` are color strings; `"grad:<id>"` references the document
/// gradient palette. A dangling reference degrades to a fallback color in the
/// backend, never an error.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Style {
    #[serde(default)]
    pub fill: Option<String>,
    #[serde(default)]
    pub stroke: Option<String>,
    #[serde(default)]
    pub stroke_width: Option<f32>,
    #[serde(default)]
    pub opacity: Option<f32>,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill: None,
            stroke: None,
            stroke_width: None,
            opacity: None,
            visible: true,
        }
    }
}

/// View parameters. Only ever used to compute a view transform; never
/// mutates node data.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Camera {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default = "default_scale")]
    pub zoom: f32,
    #[serde(default)]
    pub rotation: f32,
    #[serde(default)]
    pub bounds: Option<CameraBounds>,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
            rotation: 0.0,
            bounds: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CameraBounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

/// A gradient palette entry, referenced from paint strings by id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GradientDef {
    pub id: String,
    #[serde(flatten)]
    pub kind: GradientKind,
    pub stops: Vec<GradientStop>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GradientKind {
    Linear {
        #[serde(default)]
        from: [f32; 2],
        #[serde(default = "default_gradient_to")]
        to: [f32; 2],
    },
    Radial {
        #[serde(default = "default_gradient_center")]
        center: [f32; 2],
        #[serde(default = "default_gradient_radius")]
        radius: f32,
    },
}

fn default_gradient_to() -> [f32; 2] {
    [0.0, 1.0]
}

fn default_gradient_center() -> [f32; 2] {
    [0.5, 0.5]
}

fn default_gradient_radius() -> f32 {
    0.5
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GradientStop {
    /// Position along the gradient, 0.0 to 1.0.
    pub offset: f32,
    pub color: String,
}

/// A filter palette entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FilterDef {
    pub id: String,
    #[serde(flatten)]
    pub kind: FilterKind,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterKind {
    Blur {
        #[serde(default = "default_blur")]
        sigma: f32,
    },
    DropShadow {
        #[serde(default = "default_blur")]
        blur: f32,
        #[serde(default)]
        offset_x: f32,
        #[serde(default)]
        offset_y: f32,
        #[serde(default)]
        color: Option<String>,
    },
    Grayscale,
}

fn default_blur() -> f32 {
    10.0
}

/// Process-wide simulation control.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct WorldMeta {
    #[serde(default)]
    pub paused: bool,
    /// Milliseconds between rule ticks.
    #[serde(default = "default_tick_speed")]
    pub tick_speed_ms: u64,
}

fn default_tick_speed() -> u64 {
    50
}

impl Default for WorldMeta {
    fn default() -> Self {
        Self {
            paused: false,
            tick_speed_ms: default_tick_speed(),
        }
    }
}

/// A time-based interpolation over one numeric node property.
///
/// A `TweenDef` without `started_at` is inert data; arming it (stamping the
/// current time) makes it eligible for interpolation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TweenDef {
    /// Dot-path into the owning node, e.g. `transform.x` or `style.opacity`.
    pub property: String,
    pub from: f64,
    pub to: f64,
    pub duration_ms: f64,
    #[serde(default)]
    pub easing: Easing,
    #[serde(default)]
    pub delay_ms: f64,
    /// -1 = infinite, 0 = play once, N = play N+1 times.
    #[serde(default)]
    pub repeat: i32,
    #[serde(default)]
    pub yoyo: bool,
    /// Epoch milliseconds, set when armed.
    #[serde(default)]
    pub started_at: Option<f64>,
}

/// Supported easing curves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    EaseIn,
    EaseOut,
    #[default]
    EaseInOut,
    EaseInCubic,
    EaseOutCubic,
    EaseInOutCubic,
    ElasticOut,
    BounceOut,
}

impl EasingFunction for Easing {
    fn y(&self, x: f64) -> f64 {
        match self {
            Easing::Linear => keyframe::functions::Linear.y(x),
            Easing::EaseIn => keyframe::functions::EaseInQuad.y(x),
            Easing::EaseOut => keyframe::functions::EaseOutQuad.y(x),
            Easing::EaseInOut => keyframe::functions::EaseInOutQuad.y(x),
            Easing::EaseInCubic => keyframe::functions::EaseInCubic.y(x),
            Easing::EaseOutCubic => keyframe::functions::EaseOutCubic.y(x),
            Easing::EaseInOutCubic => keyframe::functions::EaseInOutCubic.y(x),
            // keyframe 1.1 has no elastic/bounce curves; closed forms here.
            Easing::ElasticOut => {
                if x <= 0.0 {
                    0.0
                } else if x >= 1.0 {
                    1.0
                } else {
                    let c4 = (2.0 * std::f64::consts::PI) / 3.0;
                    (2.0f64).powf(-10.0 * x) * ((x * 10.0 - 0.75) * c4).sin() + 1.0
                }
            }
            Easing::BounceOut => {
                let n1 = 7.5625;
                let d1 = 2.75;
                let x = x.clamp(0.0, 1.0);
                if x < 1.0 / d1 {
                    n1 * x * x
                } else if x < 2.0 / d1 {
                    let x = x - 1.5 / d1;
                    n1 * x * x + 0.75
                } else if x < 2.5 / d1 {
                    let x = x - 2.25 / d1;
                    n1 * x * x + 0.9375
                } else {
                    let x = x - 2.625 / d1;
                    n1 * x * x + 0.984375
                }
            }
        }
    }
}

impl Easing {
    /// Evaluates the curve at `x` (0.0 to 1.0).
    pub fn eval(&self, x: f64) -> f64 {
        self.y(x)
    }
}

// Unknown names from external authors degrade to the default curve instead
// of failing the whole tween/document parse.
impl<'de> Deserialize<'de> for Easing {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(parse_easing(&name))
    }
}

/// Parses an easing name. Unknown names fall back to ease-in-out.
pub fn parse_easing(e: &str) -> Easing {
    match e {
        "linear" => Easing::Linear,
        "ease_in" => Easing::EaseIn,
        "ease_out" => Easing::EaseOut,
        "ease_in_out" => Easing::EaseInOut,
        "ease_in_cubic" => Easing::EaseInCubic,
        "ease_out_cubic" => Easing::EaseOutCubic,
        "ease_in_out_cubic" => Easing::EaseInOutCubic,
        "elastic_out" => Easing::ElasticOut,
        "bounce_out" => Easing::BounceOut,
        _ => Easing::EaseInOut,
    }
}

/// Descriptor for one particle emitter inside a `Particles` node.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EmitterDef {
    /// Emission origin in the holder node's local space.
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    /// Particles per second.
    pub rate: f64,
    /// Lifetime range in milliseconds.
    #[serde(default = "default_lifetime")]
    pub lifetime_ms: Range,
    /// Speed range in units per second.
    #[serde(default = "default_speed_range")]
    pub speed: Range,
    /// Direction range in degrees (0 = +x, counter-clockwise).
    #[serde(default = "default_direction")]
    pub direction: Range,
    /// Size range in units.
    #[serde(default = "default_size_range")]
    pub size: Range,
    /// Scalar vertical acceleration, units per second squared.
    #[serde(default)]
    pub gravity: f64,
    #[serde(default)]
    pub color: Option<String>,
    /// Overall particle cap for the holder. Default 200.
    #[serde(default)]
    pub max_particles: Option<usize>,
}

impl Default for EmitterDef {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            rate: 0.0,
            lifetime_ms: default_lifetime(),
            speed: default_speed_range(),
            direction: default_direction(),
            size: default_size_range(),
            gravity: 0.0,
            color: None,
            max_particles: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

fn default_lifetime() -> Range {
    Range::new(500.0, 1500.0)
}

fn default_speed_range() -> Range {
    Range::new(20.0, 60.0)
}

fn default_direction() -> Range {
    Range::new(0.0, 360.0)
}

fn default_size_range() -> Range {
    Range::new(2.0, 4.0)
}

/// A declarative rule evaluated against the document once per tick.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Rule {
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub trigger: RuleTrigger,
    pub condition: Condition,
    pub effect: Effect,
}

fn default_enabled() -> bool {
    true
}

/// When a rule fires. Only `tick` is executed by the engine; other triggers
/// are carried for external hosts to dispatch.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RuleTrigger {
    #[default]
    Tick,
    Click,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Condition {
    /// Selector string; see the selector grammar in `scenic-core`.
    pub selector: String,
    /// Exact-match sub-map against the node's `data`.
    #[serde(default)]
    pub state: Option<Map<String, Value>>,
    #[serde(default)]
    pub proximity: Option<Proximity>,
    /// Per-rule-per-node cooldown, tracked outside the document.
    #[serde(default)]
    pub cooldown_ms: Option<u64>,
    /// Bernoulli gate, 0.0 to 1.0, drawn per evaluation.
    #[serde(default)]
    pub probability: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Proximity {
    pub selector: String,
    pub radius: f32,
}

/// A rule effect plus gates applied independently of the condition.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Effect {
    #[serde(flatten)]
    pub kind: EffectKind,
    /// ± fractional jitter applied to numeric deltas.
    #[serde(default)]
    pub variance: Option<f64>,
    #[serde(default)]
    pub probability: Option<f64>,
}

impl From<EffectKind> for Effect {
    fn from(kind: EffectKind) -> Self {
        Self {
            kind,
            variance: None,
            probability: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectKind {
    /// Nudges the matched node's transform.
    Transform {
        #[serde(default)]
        dx: f64,
        #[serde(default)]
        dy: f64,
        #[serde(default)]
        drotation: f64,
        #[serde(default)]
        dscale: f64,
    },
    /// Overwrites the provided style fields.
    Style {
        #[serde(default)]
        fill: Option<String>,
        #[serde(default)]
        stroke: Option<String>,
        #[serde(default)]
        stroke_width: Option<f32>,
        #[serde(default)]
        opacity: Option<f32>,
    },
    /// Shallow-merges a map into the node's `data`.
    Data { set: Map<String, Value> },
    /// Increments a numeric `data` entry.
    Counter {
        key: String,
        #[serde(default = "default_counter_delta")]
        delta: f64,
    },
    /// Queues a structural spawn at the matched node's parent position.
    Spawn { template: Box<Node> },
    /// Queues structural removal of the matched node.
    Remove,
    /// Arms a tween on the matched node, replacing any previous tween.
    Tween { tween: TweenDef },
    /// Catch-all for unrecognized effect tags; evaluating it does nothing.
    #[serde(other)]
    Noop,
}

fn default_counter_delta() -> f64 {
    1.0
}
