//! Streaming embed integration
//!
//! Everything the timer needs to know about the third-party widget: the
//! messages it posts, which of them to trust, the loader script that
//! mounts it, and the page/channel seams the timer attaches to.
//!
//! # Modules
//!
//! - [`message`]: Lifecycle message types
//! - [`filter`]: Trusted-origin gating
//! - [`script`]: Loader script generation
//! - [`page`]: Host page abstraction for script injection
//! - [`channel`]: Cross-context message fan-out

pub mod channel;
pub mod filter;
pub mod message;
pub mod page;
pub mod script;

pub use channel::{ListenerId, MessageBus};
pub use filter::{OriginFilter, OriginMatch};
pub use message::{EmbedAction, EmbedMessage, InboundMessage, EMBED_MESSAGE_TYPE};
pub use page::{HostPage, ScriptHandle, ScriptRegistry};
pub use script::EmbedScript;
