//! Field-level watchers over a shared form state.
//!
//! A [`Watch`] observes one path, several paths or the whole form held by a
//! [`FormState`] container and republishes a private copy of the value every
//! time a tracked field changes.

pub mod context;
pub mod macros;
pub mod path;

mod control;
mod error;
mod id;
mod initial;
mod name;
mod registry;
mod watch;

pub use control::Control;
pub use error::{Result, WatchError};
pub use id::SubscriberId;
pub use initial::initial_value;
pub use name::NameSpec;
pub use registry::{Callback, Subscriptions};
pub use serde_json::Value;
pub use watch::{Subscription, Watch, WatchOptions, WeakWatch};

/// The form-state container a watcher reads from.
pub trait FormState: 'static {
	/// Returns the current value for `name` and, when `id` is given,
	/// records the names read into that subscriber's tracked set.
	///
	/// Must be safe to call repeatedly with the same `id`.
	fn resolve(&self, name: &NameSpec, fallback: Option<&Value>, id: Option<SubscriberId>) -> Option<Value>;

	/// Registry of active watchers for this container.
	fn subscriptions(&self) -> &Subscriptions;

	/// Snapshot of the default values.
	fn default_values(&self) -> Value;
}
