use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::registry::Subscriptions;
use crate::{path, FormState, NameSpec, SubscriberId};

/// In-memory form state with change notification.
pub struct Control {
	body: Rc<ControlBody>,
}

impl Clone for Control {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

pub struct ControlBody {
	values: RefCell<Value>,
	defaults: RefCell<Value>,
	subscriptions: Subscriptions,
}

impl Default for Control {
	fn default() -> Self {
		Control::new(Value::Object(Map::new()))
	}
}

impl Control {
	/// Starts with no field values; reads fall back to `defaults`.
	pub fn new(defaults: Value) -> Self {
		Control {
			body: Rc::new(ControlBody {
				values: RefCell::new(Value::Object(Map::new())),
				defaults: RefCell::new(defaults),
				subscriptions: Subscriptions::new(),
			}),
		}
	}

	pub fn values(&self) -> Value {
		self.body.values.borrow().clone()
	}

	/// Current value at `path`, without default fallback.
	pub fn get_value(&self, path: &str) -> Option<Value> {
		path::get(&self.body.values.borrow(), path).cloned()
	}

	/// Writes `value` at `path` and synchronously notifies the watchers of it.
	///
	/// Returns `false` and notifies nobody when the value did not change or
	/// the path cannot be written, such as an array index past the end.
	pub fn set_value(&self, path: &str, value: Value) -> bool {
		self.body.set_value(path, value)
	}

	/// Replaces values and defaults, then notifies every watcher.
	pub fn reset(&self, values: Value) {
		self.body.reset(values)
	}

	pub fn subscriptions(&self) -> &Subscriptions {
		&self.body.subscriptions
	}

	/// Mutable access to the raw value tree, without notification.
	///
	/// Lets callers mutate container storage behind the watchers' backs.
	pub fn with_values_mut<R>(&self, func: impl FnOnce(&mut Value) -> R) -> R {
		func(&mut self.body.values.borrow_mut())
	}
}

impl ControlBody {
	fn set_value(&self, path: &str, value: Value) -> bool {
		{
			let mut values = self.values.borrow_mut();
			if path::get(&values, path) == Some(&value) {
				return false;
			}
			if !path::set(&mut values, path, value) {
				tracing::warn!(path, "refused write outside of the value tree");
				return false;
			}
		}

		self.subscriptions.notify(path);
		true
	}

	fn reset(&self, values: Value) {
		*self.values.borrow_mut() = values.clone();
		*self.defaults.borrow_mut() = values;
		self.subscriptions.notify_all();
	}
}

fn is_empty(value: &Value) -> bool {
	match value {
		Value::Null => true,
		Value::Object(map) => map.is_empty(),
		_ => false,
	}
}

impl FormState for ControlBody {
	fn resolve(&self, name: &NameSpec, fallback: Option<&Value>, id: Option<SubscriberId>) -> Option<Value> {
		if let Some(id) = id {
			match name {
				NameSpec::All => self.subscriptions.track_all(id),
				_ => self.subscriptions.track(id, name.paths()),
			}
		}

		tracing::trace!(%name, "resolve");

		let values = self.values.borrow();
		let defaults = self.defaults.borrow();

		match name {
			NameSpec::All => {
				if !is_empty(&values) {
					Some(values.clone())
				} else {
					Some(fallback.unwrap_or(&*defaults).clone())
				}
			}
			NameSpec::Single(name) => path::get(&values, name)
				.or(fallback)
				.or_else(|| path::get(&defaults, name))
				.cloned(),
			NameSpec::Many(names) => {
				let map = names
					.iter()
					.map(|name| {
						let value = path::get(&values, name)
							.or_else(|| fallback.and_then(|f| f.get(name.as_str()).or_else(|| path::get(f, name))))
							.or_else(|| path::get(&defaults, name))
							.cloned()
							.unwrap_or(Value::Null);
						(name.clone(), value)
					})
					.collect::<Map<_, _>>();
				Some(Value::Object(map))
			}
		}
	}

	fn subscriptions(&self) -> &Subscriptions {
		&self.subscriptions
	}

	fn default_values(&self) -> Value {
		self.defaults.borrow().clone()
	}
}

impl FormState for Control {
	fn resolve(&self, name: &NameSpec, fallback: Option<&Value>, id: Option<SubscriberId>) -> Option<Value> {
		self.body.resolve(name, fallback, id)
	}

	fn subscriptions(&self) -> &Subscriptions {
		&self.body.subscriptions
	}

	fn default_values(&self) -> Value {
		self.body.default_values()
	}
}

impl From<Control> for Rc<dyn FormState> {
	fn from(control: Control) -> Self {
		control.body
	}
}

impl std::fmt::Debug for Control {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Control")
			.field("values", &*self.body.values.borrow())
			.field("subscriptions", &self.body.subscriptions)
			.finish()
	}
}
