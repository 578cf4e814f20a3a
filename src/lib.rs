//! # aml-kernel
//!
//! Atomization kernel for Algebraic Machine Learning.
//!
//! A model is a set of *atoms* over a universe of *constants*. Each atom is
//! a bitmap of constants (its upper constant segment). A term `L` is lower
//! or equal to a term `R` when every atom meeting `L` also meets `R`.
//! Training enforces batches of positive (`L ≤ R`) and negative (`L ≰ R`)
//! *duples* by *crossing*: growing the atomization until the batch holds.
//!
//! ## Architecture
//!
//! ```text
//! Duples → FullCrossingEngine ─────────────┐
//!        → SparseCrossingEngine → Tracer   ├→ Model (registry + atomization)
//!                ↓                         │        ↓
//!            UnionModel                    │   reduction, selector
//!                ↓                         │        ↓
//!            evaluation ←──────────────────┘   ModelSnapshot
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Full crossing is deterministic: same model + same batch → same atoms
//! - Sparse crossing and selection take a caller-provided RNG; same seed +
//!   same inputs → identical atomization
//! - Snapshots carry a fingerprint over registry and atoms in order

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod model;
pub mod query;
pub mod reduction;
pub mod tracer;
pub mod crossing;
pub mod selector;
pub mod union_model;
pub mod evaluation;
pub mod snapshot;
pub mod canonical;
pub mod policy;
pub mod error;
pub mod logging;

// Re-exports
pub use types::{Atom, AtomId, Atomization, Constant, ConstantRegistry, Duple, RegistryError, Segment};
pub use model::Model;
pub use query::{lower_or_equal, separate_discriminant, Discriminant};
pub use reduction::{remove_redundant, remove_redundant_segregating_generation, remove_repeated};
pub use tracer::{TermSpace, Tracer};
pub use crossing::{
    CrossingReport, FullCrossingEngine, SparseCrossingEngine, SparseReport, SparseVars,
};
pub use selector::{select_atoms, select_atoms_with_context, Selection};
pub use union_model::{UnionModel, UnionUpdate};
pub use evaluation::{test_accuracy, Accuracy};
pub use snapshot::{AtomRecord, ModelSnapshot};
pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes};
pub use policy::{FullCrossingParams, SparseCrossingParams, Strictness, Verbosity};
pub use error::{EngineError, Result};
pub use logging::{init_logging, LogFormat};

/// Version tag stamped into default parameter sets.
pub const DEFAULT_PARAMS_VERSION: &str = "aml_params_v1";

/// Schema version of [`ModelSnapshot`].
pub const SNAPSHOT_SCHEMA_VERSION: &str = "1.0.0";
