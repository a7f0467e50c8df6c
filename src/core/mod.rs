//! Session core: configuration, wiring and cancellation helpers.
//!
//! Internal modules:
//! - [`config`]: settings shared by the registry, the gate and schedulers;
//! - [`builder`]: assembles a session around one event bus;
//! - [`session`]: owns the gate, the registry and the subscriber listener;
//! - [`abort`]: races futures against a cancellation token.

mod abort;
mod builder;
mod config;
mod session;

pub use abort::abortable;
pub use builder::SessionBuilder;
pub use config::Config;
pub use session::Session;
