//! Session timer
//!
//! Listens for the embed widget's `show`/`hide` lifecycle signals and
//! records each streaming session as exactly one create and one update
//! against the record store.
//!
//! # Modules
//!
//! - [`clock`]: Time source abstraction
//! - [`state`]: Explicit closed/open session state
//! - [`session_timer`]: The signal handlers
//! - [`mount`]: Page/bus attachment and teardown

pub mod clock;
pub mod mount;
pub mod session_timer;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use mount::{MountedTimer, TeardownReport};
pub use session_timer::{
    Claim, HandleOutcome, PendingCall, SessionTimer, TimerSnapshot, TimerStats,
};
pub use state::SessionState;
