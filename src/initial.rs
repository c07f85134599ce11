use serde_json::{Map, Value};

use crate::{path, NameSpec};

/// Value a watcher renders before it has subscribed.
///
/// An explicit `default` always wins. Otherwise the answer comes from the
/// `defaults` snapshot: all of it, the value at one path, or a fresh object
/// keyed by each requested path. Missing paths are `None` for a single name
/// and `null` inside the aggregated object.
pub fn initial_value(name: &NameSpec, default: Option<&Value>, defaults: &Value) -> Option<Value> {
	if let Some(default) = default {
		return Some(default.clone());
	}

	match name {
		NameSpec::All => Some(defaults.clone()),
		NameSpec::Single(name) => path::get(defaults, name).cloned(),
		NameSpec::Many(names) => Some(Value::Object(
			names
				.iter()
				.map(|name| {
					let value = path::get(defaults, name).cloned().unwrap_or(Value::Null);
					(name.clone(), value)
				})
				.collect::<Map<_, _>>(),
		)),
	}
}
