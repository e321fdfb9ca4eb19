//! # NavKit Engine
//!
//! Decides, for every navigation in a browsing surface, whether it stays in
//! the surface, is replaced by a fallback page, is handed to another
//! installed application, or waits for the user.
//!
//! ## Components
//!
//! 1. **Redirect tracking**: [`RedirectTracker`] classifies how a navigation
//!    sequence started and follows it through redirects
//! 2. **Policy**: [`NavigationPolicy`] runs the ordered guards and returns a
//!    [`Verdict`]
//! 3. **Gateway**: [`InterceptGateway`] is the per-surface entry point that
//!    carries decisions out through a [`NavigationDelegate`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use navkit_engine::{InterceptGateway, NavigationParams};
//!
//! let mut gateway = InterceptGateway::new(embedder, config);
//! let verdict = gateway.handle_navigation(&NavigationParams::new(url).with_gesture());
//! if verdict.is_intercepted() {
//!     // cancel the navigation
//! }
//! gateway.run_deferred();
//! ```

pub mod decision;
pub mod deferred;
pub mod delegate;
pub mod error;
pub mod event;
mod fallback;
pub mod gateway;
pub mod policy;
pub mod redirect;

pub use decision::{Decision, DecisionReason, PendingAction, PromptResponse, Verdict};
pub use deferred::{DeferredAction, DeferredQueue};
pub use delegate::{DispatchOutcome, NavigationDelegate, PromptId};
pub use error::DispatchError;
pub use event::{NavigationEvent, NavigationParams};
pub use gateway::InterceptGateway;
pub use policy::NavigationPolicy;
pub use redirect::{NavigationProvenance, RedirectTracker, TransitionUpdate};
