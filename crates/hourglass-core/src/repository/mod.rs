//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (hourglass-infra) implements. The core crate never depends on any
//! specific storage technology.

pub mod memory;
pub mod session;

pub use memory::InMemorySessionRepository;
pub use session::{NewSession, SessionRepository, TurnAssignment, TurnResolution};
