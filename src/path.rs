use serde_json::{Map, Value};
use smallvec::SmallVec;

pub type Segments<'a> = SmallVec<[&'a str; 8]>;

/// Splits `items[0].title` and `items.0.title` into the same segments.
pub fn segments(path: &str) -> Segments<'_> {
	path.split(|c| c == '.' || c == '[' || c == ']')
		.filter(|s| !s.is_empty())
		.collect()
}

pub fn get<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
	segments(path)
		.into_iter()
		.try_fold(value, |current, segment| match current {
			Value::Object(map) => map.get(segment),
			Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
			_ => None,
		})
}

/// Writes `new` at `path`, creating intermediate containers on the way.
///
/// A numeric segment creates an array, anything else an object. A scalar
/// standing in the way is replaced. Arrays only grow by appending: an index
/// past the end, or a non-numeric segment into an array, refuses the write
/// and returns `false`.
pub fn set(value: &mut Value, path: &str, new: Value) -> bool {
	let segments = segments(path);
	let Some((last, parents)) = segments.split_last() else {
		*value = new;
		return true;
	};

	if !writable(value, &segments) {
		return false;
	}

	let mut current = value;
	for (i, segment) in parents.iter().enumerate() {
		let next_is_index = segments[i + 1].parse::<usize>().is_ok();
		match child_mut(current, segment, next_is_index) {
			Some(child) => current = child,
			None => return false,
		}
	}

	match (current, last.parse::<usize>()) {
		(Value::Array(items), Ok(index)) => match slot_mut(items, index) {
			Some(slot) => {
				*slot = new;
				true
			}
			None => false,
		},
		(Value::Array(_), Err(_)) => false,
		(Value::Object(map), _) => {
			map.insert((*last).to_owned(), new);
			true
		}
		(other, _) => {
			let mut map = Map::new();
			map.insert((*last).to_owned(), new);
			*other = Value::Object(map);
			true
		}
	}
}

enum Node<'a> {
	Existing(&'a Value),
	FreshArray,
	FreshObject,
}

/// Walks `segments` without touching `value`, answering whether [`set`] would
/// succeed. Keeps refused writes from leaving half-built containers behind.
fn writable(value: &Value, segments: &[&str]) -> bool {
	let mut node = Node::Existing(value);
	for (i, segment) in segments.iter().enumerate() {
		let next = match node {
			Node::Existing(Value::Array(items)) => match segment.parse::<usize>() {
				Ok(index) if index <= items.len() => items.get(index),
				_ => return false,
			},
			Node::Existing(Value::Object(map)) => map.get(*segment),
			Node::Existing(_) | Node::FreshObject => None,
			Node::FreshArray => match segment.parse::<usize>() {
				Ok(0) => None,
				_ => return false,
			},
		};

		let Some(following) = segments.get(i + 1) else {
			break;
		};
		node = match next {
			Some(child) if child.is_object() || child.is_array() => Node::Existing(child),
			_ if following.parse::<usize>().is_ok() => Node::FreshArray,
			_ => Node::FreshObject,
		};
	}
	true
}

/// Existing slot at `index`, or a new one when `index` is the array length.
fn slot_mut(items: &mut Vec<Value>, index: usize) -> Option<&mut Value> {
	if index == items.len() {
		items.push(Value::Null);
	}
	items.get_mut(index)
}

fn child_mut<'a>(current: &'a mut Value, segment: &str, next_is_index: bool) -> Option<&'a mut Value> {
	let empty = || {
		if next_is_index {
			Value::Array(Vec::new())
		} else {
			Value::Object(Map::new())
		}
	};

	let slot = match current {
		Value::Array(items) => slot_mut(items, segment.parse::<usize>().ok()?)?,
		Value::Object(map) => map.entry(segment.to_owned()).or_insert_with(empty),
		other => {
			*other = Value::Object(Map::new());
			other.as_object_mut()?.entry(segment.to_owned()).or_insert_with(empty)
		}
	};

	if !slot.is_object() && !slot.is_array() {
		*slot = empty();
	}
	Some(slot)
}

/// True when the two paths address the same node or one contains the other.
pub fn overlaps(a: &str, b: &str) -> bool {
	let a = segments(a);
	let b = segments(b);
	a.iter().zip(b.iter()).all(|(x, y)| x == y)
}
