//! # Scenic Core
//!
//! `scenic-core` is the simulation and reconciliation engine behind
//! collaboratively authored 2D scenes: humans and autonomous agents evolve
//! one JSON-serializable [scene document](scenic_schema::SceneDocument), and
//! this crate keeps it alive: it runs declarative rules at a tick rate,
//! interpolates tweens, simulates bounded particles, and diffs document
//! snapshots into a persistent render-object tree.
//!
//! ## Core features
//!
//! *   **Rule engine**: selector-matched conditions and effects evaluated
//!     against the document once per tick, with deferred structural commits.
//! *   **Tweens**: delay/repeat/yoyo interpolation over dot-path properties.
//! *   **Particles**: capped spawn/age/cull simulation per emitter holder.
//! *   **Reconciler**: identity-keyed, type-aware diffing that preserves
//!     live render objects (and their interaction state) across snapshots.
//! *   **Mutation ops**: the `add`/`update`/`remove`/`set`/`batch`
//!     vocabulary external collaborators speak.
//!
//! ## Usage
//!
//! ```rust
//! use scenic_core::sim::World;
//! use scenic_schema::SceneDocument;
//!
//! let mut world = World::new(SceneDocument::new(800.0, 600.0));
//! let mut rng = rand::thread_rng();
//! world.tick(0.0, 50.0, &mut rng);
//! ```

/// Tree traversal, addressing and geometry over the document.
pub mod document;

/// String selector matching for rules.
pub mod selector;

/// Tween interpolation and dot-path application.
pub mod tween;

/// Bounded particle simulation.
pub mod particles;

/// The per-tick rule engine and rule management surface.
pub mod rules;

/// Application of the structural mutation-operation vocabulary.
pub mod ops;

/// Retained-mode diffing of documents into backend render objects.
pub mod reconcile;

/// The single-writer tick world and the threaded frame driver.
pub mod sim;

pub mod errors;

pub use errors::EngineError;
pub use reconcile::{HeadlessBackend, ReconcileStats, Reconciler, RenderBackend};
pub use rules::{RuleBook, RuleEngine};
pub use sim::{Simulation, World};

use anyhow::Result;
use tracing::instrument;

/// Abstracts texture/image byte loading for render backends.
///
/// Lets the engine run where direct file system access is restricted or
/// virtualized (network assets, archives, test fixtures). A failed load is
/// never fatal: the reconciler substitutes a placeholder for the one node.
pub trait TextureSource: Send + Sync {
    /// Loads the raw bytes of a texture from the given path or identifier.
    fn load_bytes(&self, path: &str) -> Result<Vec<u8>>;
}

/// The default `TextureSource` over the local filesystem, with an `assets/`
/// fallback directory.
pub struct FsTextureSource;

impl TextureSource for FsTextureSource {
    #[instrument(level = "debug", skip(self), fields(path = path))]
    fn load_bytes(&self, path: &str) -> Result<Vec<u8>> {
        if let Ok(bytes) = std::fs::read(path) {
            return Ok(bytes);
        }
        let alt = format!("assets/{}", path);
        std::fs::read(&alt).map_err(|e| {
            anyhow::anyhow!(
                "texture not found: {} (checked '{}' and '{}'): {}",
                path,
                path,
                alt,
                e
            )
        })
    }
}
