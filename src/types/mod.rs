//! Core value types of the kernel.

pub mod segment;
pub mod constant;
pub mod atom;
pub mod duple;

pub use segment::{Constant, Segment};
pub use constant::{ConstantRegistry, RegistryError};
pub use atom::{atomization_copy, Atom, AtomId, AtomTrace, Atomization};
pub use duple::Duple;
