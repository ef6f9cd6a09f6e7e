//! Session and message state coordination for the confab chat client.

mod coordinator;

pub use coordinator::{SessionCoordinator, SessionPhase};
