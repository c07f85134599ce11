use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde_json::Value;
use smallvec::SmallVec;

use crate::registry::Callback;
use crate::{context, initial_value, FormState, NameSpec, Result, SubscriberId, WatchError};

type Listener = Rc<dyn Fn(Option<&Value>)>;

/// Arguments of [`Watch::new`].
#[derive(Default)]
pub struct WatchOptions {
	control: Option<Rc<dyn FormState>>,
	name: NameSpec,
	default_value: Option<Value>,
}

impl WatchOptions {
	pub fn new() -> Self {
		Self::default()
	}

	/// Form state to watch. Without it the ambient one from
	/// [`context::provide`] is used.
	pub fn control(mut self, control: impl Into<Rc<dyn FormState>>) -> Self {
		self.control = Some(control.into());
		self
	}

	pub fn name(mut self, name: impl Into<NameSpec>) -> Self {
		self.name = name.into();
		self
	}

	/// Rendered until the form produces a value, and preferred over the
	/// form's own defaults for the initial value.
	pub fn default_value(mut self, value: Value) -> Self {
		self.default_value = Some(value);
		self
	}

	pub fn build(self) -> Result<Watch> {
		Watch::new(self)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
	Unattached,
	Attached(SubscriberId),
	Detached,
}

/// Subscription of one view to part of a form.
///
/// Cloning yields another handle to the same watcher. The watcher detaches
/// when the last handle is dropped.
pub struct Watch {
	body: Rc<WatchBody>,
}

impl Clone for Watch {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

pub struct WatchBody {
	control: Rc<dyn FormState>,
	inner: RefCell<WatchInner>,
}

struct WatchInner {
	name: NameSpec,
	default_value: Option<Value>,
	value: Option<Value>,
	lifecycle: Lifecycle,
	callback: Option<(SubscriberId, Callback)>,
	listeners: SmallVec<[(u64, Listener); 2]>,
	next_listener: u64,
	warned: bool,
	this: Weak<WatchBody>,
}

impl Watch {
	/// Computes the initial value. Nothing is registered until [`Watch::attach`].
	///
	/// Fails with [`WatchError::MissingControl`] when no control was passed and
	/// none is provided by the context.
	pub fn new(options: WatchOptions) -> Result<Self> {
		let control = match options.control {
			Some(control) => control,
			None => context::current().ok_or(WatchError::MissingControl)?,
		};

		let mut warned = false;
		let name = checked_name(options.name, &mut warned);
		let value = initial_value(&name, options.default_value.as_ref(), &control.default_values());

		Ok(Watch {
			body: Rc::new_cyclic(|this| WatchBody {
				control,
				inner: RefCell::new(WatchInner {
					name,
					default_value: options.default_value,
					value,
					lifecycle: Lifecycle::Unattached,
					callback: None,
					listeners: SmallVec::new(),
					next_listener: 0,
					warned,
					this: this.clone(),
				}),
			}),
		})
	}

	/// Registers with the form and primes name tracking.
	///
	/// Attaching an attached watcher returns its current id and registers
	/// nothing new.
	pub fn attach(&self) -> Result<SubscriberId> {
		self.body.attach()
	}

	/// Removes this watcher from the form. Safe to call more than once.
	pub fn detach(&self) {
		self.body.detach()
	}

	/// The value to render: the latest resolved value, or the default value
	/// when nothing was resolved.
	pub fn value(&self) -> Option<Value> {
		self.body.value()
	}

	pub fn name(&self) -> NameSpec {
		self.body.inner.borrow().name.clone()
	}

	/// Changes the watched name. An equal name keeps the current subscription;
	/// a different one starts a new attach cycle when attached.
	pub fn set_name(&self, name: impl Into<NameSpec>) -> Result<()> {
		self.body.set_name(name.into())
	}

	pub fn id(&self) -> Option<SubscriberId> {
		match self.body.inner.borrow().lifecycle {
			Lifecycle::Attached(id) => Some(id),
			_ => None,
		}
	}

	pub fn is_attached(&self) -> bool {
		self.id().is_some()
	}

	pub fn is_detached(&self) -> bool {
		self.body.inner.borrow().lifecycle == Lifecycle::Detached
	}

	/// Callback registered with the form for the current attach cycle.
	pub fn update_callback(&self) -> Option<Callback> {
		self.body
			.inner
			.borrow()
			.callback
			.as_ref()
			.map(|(_, callback)| callback.clone())
	}

	/// Calls `listener` with the rendered value after every update.
	///
	/// The watcher owns its listeners, so a listener holding a [`Watch`]
	/// keeps the watcher alive forever and it never detaches on drop. Capture
	/// a [`WeakWatch`] from [`Watch::downgrade`] instead.
	pub fn subscribe(&self, listener: impl Fn(Option<&Value>) + 'static) -> Subscription {
		let mut inner = self.body.inner.borrow_mut();
		let key = inner.next_listener;
		inner.next_listener += 1;
		inner.listeners.push((key, Rc::new(listener)));

		Subscription {
			watch: Rc::downgrade(&self.body),
			key,
		}
	}

	pub fn downgrade(&self) -> WeakWatch {
		WeakWatch {
			body: Rc::downgrade(&self.body),
		}
	}
}

/// Handle to a [`Watch`] that does not keep it alive.
pub struct WeakWatch {
	body: Weak<WatchBody>,
}

impl Clone for WeakWatch {
	fn clone(&self) -> Self {
		Self {
			body: self.body.clone(),
		}
	}
}

impl WeakWatch {
	pub fn upgrade(&self) -> Option<Watch> {
		self.body.upgrade().map(|body| Watch { body })
	}
}

fn checked_name(name: NameSpec, warned: &mut bool) -> NameSpec {
	if name.is_empty_single() && !*warned {
		tracing::warn!("watch is missing a field name, falling back to the whole form");
		*warned = true;
	}
	name.normalize()
}

impl WatchBody {
	fn attach(&self) -> Result<SubscriberId> {
		let (id, callback, name, default_value) = {
			let mut inner = self.inner.borrow_mut();
			match inner.lifecycle {
				Lifecycle::Attached(id) => return Ok(id),
				Lifecycle::Detached => return Err(WatchError::Detached),
				Lifecycle::Unattached => {}
			}

			let id = SubscriberId::mint();
			inner.lifecycle = Lifecycle::Attached(id);
			let callback = inner.callback(id);
			(id, callback, inner.name.clone(), inner.default_value.clone())
		};

		tracing::debug!(%id, %name, "attach watch");
		self.control.subscriptions().register(id, callback);
		// Only registers the names, the rendered value is already known.
		let _ = self.control.resolve(&name, default_value.as_ref(), Some(id));

		Ok(id)
	}

	fn detach(&self) {
		let id = {
			let mut inner = self.inner.borrow_mut();
			let previous = std::mem::replace(&mut inner.lifecycle, Lifecycle::Detached);
			inner.callback = None;
			match previous {
				Lifecycle::Attached(id) => id,
				_ => return,
			}
		};

		tracing::debug!(%id, "detach watch");
		self.control.subscriptions().unregister(id);
	}

	fn update(&self, id: SubscriberId) {
		let (name, default_value) = {
			let inner = self.inner.borrow();
			if inner.lifecycle != Lifecycle::Attached(id) {
				tracing::trace!(%id, "stale watch callback ignored");
				return;
			}
			(inner.name.clone(), inner.default_value.clone())
		};

		// `resolve` hands out an owned copy, never container storage.
		let value = self.control.resolve(&name, default_value.as_ref(), Some(id));

		let listeners: SmallVec<[Listener; 2]> = {
			let mut inner = self.inner.borrow_mut();
			inner.value = value;
			inner.listeners.iter().map(|(_, l)| l.clone()).collect()
		};

		if listeners.is_empty() {
			return;
		}

		let rendered = self.value();
		for listener in listeners {
			listener(rendered.as_ref());
		}
	}

	fn value(&self) -> Option<Value> {
		let inner = self.inner.borrow();
		inner.value.clone().or_else(|| inner.default_value.clone())
	}

	fn set_name(&self, name: NameSpec) -> Result<()> {
		let previous = {
			let mut inner = self.inner.borrow_mut();
			let name = checked_name(name, &mut inner.warned);
			if inner.name == name {
				return Ok(());
			}

			inner.value = initial_value(&name, inner.default_value.as_ref(), &self.control.default_values());
			inner.name = name;

			match inner.lifecycle {
				Lifecycle::Attached(id) => {
					inner.lifecycle = Lifecycle::Unattached;
					inner.callback = None;
					id
				}
				_ => return Ok(()),
			}
		};

		tracing::debug!(id = %previous, "rebind watch");
		self.control.subscriptions().unregister(previous);
		self.attach().map(|_| ())
	}

	fn remove_listener(&self, key: u64) {
		self.inner.borrow_mut().listeners.retain(|(k, _)| *k != key);
	}
}

impl WatchInner {
	/// One callback per attach cycle.
	fn callback(&mut self, id: SubscriberId) -> Callback {
		if let Some((current, callback)) = &self.callback {
			if *current == id {
				return callback.clone();
			}
		}

		let this = self.this.clone();
		let callback: Callback = Rc::new(move || {
			if let Some(body) = this.upgrade() {
				body.update(id)
			}
		});

		self.callback = Some((id, callback.clone()));
		callback
	}
}

impl Drop for WatchBody {
	fn drop(&mut self) {
		self.detach()
	}
}

impl std::fmt::Debug for Watch {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let inner = self.body.inner.borrow();
		f.debug_struct("Watch")
			.field("name", &inner.name)
			.field("lifecycle", &inner.lifecycle)
			.field("value", &inner.value)
			.finish()
	}
}

/// Keeps a listener registered. Dropping it removes the listener.
#[must_use]
pub struct Subscription {
	watch: Weak<WatchBody>,
	key: u64,
}

impl Subscription {
	pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(watch) = self.watch.upgrade() {
			watch.remove_listener(self.key);
		}
	}
}
