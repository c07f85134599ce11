use std::cell::RefCell;
use std::rc::Rc;

use fxhash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::{path, SubscriberId};

pub type Callback = Rc<dyn Fn()>;

/// Names a subscriber has read, plus its notify callback.
///
/// Both live in one entry so they are always inserted and removed together.
struct Entry {
	names: FxHashSet<String>,
	all: bool,
	callback: Callback,
}

impl Entry {
	fn is_whole_form(&self) -> bool {
		self.all || self.names.is_empty()
	}

	fn interested_in(&self, changed: &str) -> bool {
		self.is_whole_form() || self.names.iter().any(|name| path::overlaps(name, changed))
	}
}

/// Per-container table of active watchers.
#[derive(Default)]
pub struct Subscriptions {
	entries: RefCell<FxHashMap<SubscriberId, Entry>>,
}

impl Subscriptions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts `id` with an empty tracked set, replacing a previous entry.
	pub fn register(&self, id: SubscriberId, callback: Callback) {
		tracing::debug!(%id, "register watcher");
		self.entries.borrow_mut().insert(
			id,
			Entry {
				names: FxHashSet::default(),
				all: false,
				callback,
			},
		);
	}

	/// Removes both the tracked names and the callback of `id`.
	/// Returns `false` when `id` was not registered.
	pub fn unregister(&self, id: SubscriberId) -> bool {
		let removed = self.entries.borrow_mut().remove(&id);
		if removed.is_some() {
			tracing::debug!(%id, "unregister watcher");
		}
		removed.is_some()
	}

	pub fn is_registered(&self, id: SubscriberId) -> bool {
		self.entries.borrow().contains_key(&id)
	}

	/// Adds `names` to the tracked set of `id`. Unknown ids are ignored.
	pub fn track<'a>(&self, id: SubscriberId, names: impl IntoIterator<Item = &'a str>) {
		if let Some(entry) = self.entries.borrow_mut().get_mut(&id) {
			entry.names.extend(names.into_iter().map(str::to_owned));
		}
	}

	pub fn track_all(&self, id: SubscriberId) {
		if let Some(entry) = self.entries.borrow_mut().get_mut(&id) {
			entry.all = true;
		}
	}

	/// Tracked names of `id`, sorted. `None` when not registered.
	pub fn tracked(&self, id: SubscriberId) -> Option<Vec<String>> {
		self.entries.borrow().get(&id).map(|entry| {
			let mut names: Vec<_> = entry.names.iter().cloned().collect();
			names.sort();
			names
		})
	}

	pub fn len(&self) -> usize {
		self.entries.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.borrow().is_empty()
	}

	/// Invokes every watcher interested in `changed`. Returns how many ran.
	pub fn notify(&self, changed: &str) -> usize {
		let callbacks = self.collect(|entry| entry.interested_in(changed));
		tracing::debug!(changed, watchers = callbacks.len(), "notify");
		self.run(callbacks)
	}

	/// Invokes every registered watcher.
	pub fn notify_all(&self) -> usize {
		let callbacks = self.collect(|_| true);
		tracing::debug!(watchers = callbacks.len(), "notify all");
		self.run(callbacks)
	}

	fn collect(&self, filter: impl Fn(&Entry) -> bool) -> SmallVec<[(SubscriberId, Callback); 4]> {
		let entries = self.entries.borrow();
		let mut callbacks: SmallVec<[(SubscriberId, Callback); 4]> = entries
			.iter()
			.filter(|(_, entry)| filter(entry))
			.map(|(id, entry)| (*id, entry.callback.clone()))
			.collect();
		callbacks.sort_by_key(|(id, _)| *id);
		callbacks
	}

	fn run(&self, callbacks: SmallVec<[(SubscriberId, Callback); 4]>) -> usize {
		let mut count = 0;
		for (id, callback) in callbacks {
			// An earlier callback may have detached this one.
			if self.is_registered(id) {
				callback();
				count += 1;
			}
		}
		count
	}
}

impl std::fmt::Debug for Subscriptions {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscriptions")
			.field("len", &self.len())
			.finish()
	}
}
