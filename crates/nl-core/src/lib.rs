//! nl-core: stable foundation for nodelink.
//!
//! Contains:
//! - numeric (Real + tolerances + guarded float helpers)
//! - ids (compact IDs for links registered with a network)
//! - roots (polynomial root improvement for curve-based links)
//! - error (shared error types)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod roots;

// Re-exports: nice ergonomics for downstream crates
pub use error::{NlError, NlResult};
pub use ids::*;
pub use numeric::*;
pub use roots::{RootSolver, evaluate_derivative, evaluate_polynomial};
