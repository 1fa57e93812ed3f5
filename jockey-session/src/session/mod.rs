//! Session engine
//!
//! The owner task, its command protocol, snapshot publishing and binding
//! leases. Consumers only see [`SessionHandle`], [`Binding`] and
//! [`Snapshot`].

pub mod binding;
pub mod broadcaster;
mod command;
pub mod engine;
pub mod handle;
pub mod snapshot;

pub use binding::{Binding, BindingId, LeaseState};
pub use engine::{SessionEngine, SessionEngineBuilder, DEFAULT_TEARDOWN_GRACE};
pub use handle::SessionHandle;
pub use snapshot::Snapshot;
