use std::cell::RefCell;
use std::rc::Rc;

use form_watch::{
	context, on_change, Control, FormState, NameSpec, SubscriberId, Subscriptions, Value, Watch, WatchError,
	WatchOptions,
};
use mockall::predicate::eq;
use serde_json::json;


use mock::Spy;

fn watch(control: &Control, name: impl Into<NameSpec>) -> Watch {
	WatchOptions::new()
		.control(control.clone())
		.name(name)
		.build()
		.unwrap()
}

#[test]
fn explicit_default_wins_over_form_defaults() {
	let control = Control::new(json!({ "a": { "b": 1 } }));

	let single = WatchOptions::new()
		.control(control.clone())
		.name("a.b")
		.default_value(json!(42))
		.build()
		.unwrap();
	assert_eq!(single.value(), Some(json!(42)));

	let whole = WatchOptions::new()
		.control(control.clone())
		.default_value(json!({ "a": { "b": 2 } }))
		.build()
		.unwrap();
	assert_eq!(whole.value(), Some(json!({ "a": { "b": 2 } })));
}

#[test]
fn initial_value_follows_path() {
	let control = Control::new(json!({ "a": { "b": 1 } }));

	assert_eq!(watch(&control, "a.b").value(), Some(json!(1)));
	assert_eq!(watch(&control, "a.c").value(), None);
	assert_eq!(watch(&control, NameSpec::All).value(), Some(json!({ "a": { "b": 1 } })));

	let missing = WatchOptions::new()
		.control(control.clone())
		.name("a.c")
		.default_value(json!("fallback"))
		.build()
		.unwrap();
	assert_eq!(missing.value(), Some(json!("fallback")));
}

#[test]
fn many_names_aggregate_into_fresh_object() {
	let control = Control::new(json!({ "a": { "b": 1 }, "x": 2 }));
	let watch = watch(&control, ["a.b", "x"]);

	assert_eq!(watch.value(), Some(json!({ "a.b": 1, "x": 2 })));

	watch.attach().unwrap();
	control.set_value("x", json!(3));
	assert_eq!(watch.value(), Some(json!({ "a.b": 1, "x": 3 })));
}

#[test]
fn published_value_is_isolated_from_storage() {
	mock::init_tracing();

	let control = Control::default();
	let watch = watch(&control, "x");
	watch.attach().unwrap();

	control.set_value("x", json!({ "y": 5 }));
	assert_eq!(watch.value(), Some(json!({ "y": 5 })));

	control.with_values_mut(|values| values["x"]["y"] = json!(6));
	assert_eq!(control.get_value("x.y"), Some(json!(6)));
	assert_eq!(watch.value(), Some(json!({ "y": 5 })));
}

#[test]
fn only_interested_watchers_are_notified() {
	let control = Control::new(json!({ "a": 1, "z": 1 }));

	let field = watch(&control, "a");
	field.attach().unwrap();
	let whole = watch(&control, NameSpec::All);
	whole.attach().unwrap();

	let field_mock = mock::SharedMock::new();
	let whole_mock = mock::SharedMock::new();

	let _field = field.subscribe(on_change!((field_mock) value => {
		field_mock.get().render(value.cloned());
	}));
	let _whole = whole.subscribe(on_change!((whole_mock) value => {
		whole_mock.get().render(value.cloned());
	}));

	field_mock.get().expect_render().times(0).return_const(());
	whole_mock.get().expect_render().times(1).return_const(());

	control.set_value("z", json!(2));

	field_mock.get().checkpoint();
	whole_mock.get().checkpoint();

	field_mock
		.get()
		.expect_render()
		.with(eq(Some(json!(2))))
		.times(1)
		.return_const(());
	whole_mock.get().expect_render().times(1).return_const(());

	control.set_value("a", json!(2));

	field_mock.get().checkpoint();
	whole_mock.get().checkpoint();
}

#[test]
fn nested_change_reaches_parent_watcher() {
	let control = Control::new(json!({ "a": { "b": 1 } }));
	let watch = watch(&control, "a");
	watch.attach().unwrap();

	control.set_value("a.b", json!(2));
	assert_eq!(watch.value(), Some(json!({ "b": 2 })));
}

#[test]
fn unchanged_value_does_not_notify() {
	let control = Control::default();
	let watch = watch(&control, "a");
	watch.attach().unwrap();

	let mock = mock::SharedMock::new();
	let _subscription = watch.subscribe(on_change!((mock) value => {
		mock.get().render(value.cloned());
	}));

	mock.get().expect_render().times(1).return_const(());
	assert!(control.set_value("a", json!(1)));
	assert!(!control.set_value("a", json!(1)));
	mock.get().checkpoint();
}

#[test]
fn detach_is_idempotent_and_silences_stale_callback() {
	let control = Control::default();
	let watch = watch(&control, "a");
	watch.attach().unwrap();
	control.set_value("a", json!(1));

	let stale = watch.update_callback().unwrap();

	watch.detach();
	watch.detach();
	assert!(watch.is_detached());
	assert!(control.subscriptions().is_empty());
	assert!(watch.update_callback().is_none());

	control.with_values_mut(|values| values["a"] = json!(2));
	stale();
	assert_eq!(watch.value(), Some(json!(1)));

	control.set_value("a", json!(3));
	assert_eq!(watch.value(), Some(json!(1)));

	assert_eq!(watch.attach(), Err(WatchError::Detached));
}

#[test]
fn id_and_callback_are_stable_for_same_name() {
	let control = Control::default();
	let watch = watch(&control, "a");

	let id = watch.attach().unwrap();
	let callback = watch.update_callback().unwrap();

	assert_eq!(watch.attach().unwrap(), id);
	watch.set_name("a").unwrap();
	assert_eq!(watch.id(), Some(id));
	assert!(Rc::ptr_eq(&callback, &watch.update_callback().unwrap()));
	assert_eq!(control.subscriptions().len(), 1);
	assert_eq!(control.subscriptions().tracked(id), Some(vec!["a".to_owned()]));
}

#[test]
fn renaming_starts_a_new_cycle() {
	let control = Control::new(json!({ "a": 1, "b": 2 }));
	let watch = watch(&control, "a");

	let first = watch.attach().unwrap();
	watch.set_name("b").unwrap();
	let second = watch.id().unwrap();

	assert_ne!(first, second);
	assert!(!control.subscriptions().is_registered(first));
	assert!(control.subscriptions().is_registered(second));
	assert_eq!(watch.value(), Some(json!(2)));

	control.set_value("a", json!(10));
	assert_eq!(watch.value(), Some(json!(2)));
	control.set_value("b", json!(20));
	assert_eq!(watch.value(), Some(json!(20)));
}

#[test]
fn missing_control_fails_before_render() {
	let result = WatchOptions::new().name("a").build();
	assert_eq!(result.unwrap_err(), WatchError::MissingControl);
}

#[test]
fn ambient_control_is_used_while_provided() {
	let control = Control::new(json!({ "a": 1 }));

	{
		let _guard = context::provide(control.clone());
		let watch = WatchOptions::new().name("a").build().unwrap();
		assert_eq!(watch.value(), Some(json!(1)));

		watch.attach().unwrap();
		control.set_value("a", json!(2));
		assert_eq!(watch.value(), Some(json!(2)));
	}

	assert!(context::current().is_none());
	assert_eq!(
		WatchOptions::new().name("a").build().unwrap_err(),
		WatchError::MissingControl
	);
}

#[test]
fn empty_name_watches_whole_form() {
	mock::init_tracing();

	let control = Control::new(json!({ "a": 1 }));
	let watch = watch(&control, "");
	assert_eq!(watch.name(), NameSpec::All);
	assert_eq!(watch.value(), Some(json!({ "a": 1 })));

	watch.attach().unwrap();
	control.set_value("b", json!(2));
	assert_eq!(watch.value(), Some(json!({ "b": 2 })));
}

#[test]
fn dropping_last_handle_detaches() {
	let control = Control::default();
	let watch = watch(&control, "a");
	let id = watch.attach().unwrap();
	let other = watch.clone();

	drop(watch);
	assert!(control.subscriptions().is_registered(id));

	drop(other);
	assert!(control.subscriptions().is_empty());
	assert_eq!(control.subscriptions().notify("a"), 0);
}

#[test]
fn updates_arrive_in_mutation_order() {
	let control = Control::default();
	let watch = watch(&control, "count");
	watch.attach().unwrap();

	let seen = Rc::new(RefCell::new(Vec::new()));
	let _subscription = watch.subscribe(on_change!((seen) value => {
		seen.borrow_mut().push(value.cloned());
	}));

	for i in 1..=3 {
		control.set_value("count", json!(i));
	}

	assert_eq!(
		*seen.borrow(),
		vec![Some(json!(1)), Some(json!(2)), Some(json!(3))]
	);
}

#[test]
fn removed_field_falls_back_to_default_value() {
	let control = Control::default();
	let watch = WatchOptions::new()
		.control(control.clone())
		.name("a")
		.default_value(json!("d"))
		.build()
		.unwrap();
	watch.attach().unwrap();

	control.set_value("a", json!("v"));
	assert_eq!(watch.value(), Some(json!("v")));

	control.with_values_mut(|values| values.as_object_mut().map(|map| map.remove("a")));
	control.subscriptions().notify("a");
	assert_eq!(watch.value(), Some(json!("d")));
}

#[test]
fn reset_notifies_every_watcher() {
	let control = Control::new(json!({ "a": 1, "b": 1 }));
	let a = watch(&control, "a");
	let b = watch(&control, "b");
	a.attach().unwrap();
	b.attach().unwrap();

	control.reset(json!({ "a": 5, "b": 6 }));

	assert_eq!(a.value(), Some(json!(5)));
	assert_eq!(b.value(), Some(json!(6)));
	assert_eq!(control.subscriptions().len(), 2);
}

#[test]
fn unsubscribed_listener_is_not_called() {
	let control = Control::default();
	let watch = watch(&control, "a");
	watch.attach().unwrap();

	let calls = Rc::new(RefCell::new(0));
	let subscription = watch.subscribe(on_change!((calls) _value => {
		*calls.borrow_mut() += 1;
	}));

	control.set_value("a", json!(1));
	subscription.unsubscribe();
	control.set_value("a", json!(2));

	assert_eq!(*calls.borrow(), 1);
	assert_eq!(watch.value(), Some(json!(2)));
}

#[test]
fn listener_may_detach_during_notification() {
	let control = Control::default();
	let watch = watch(&control, "a");
	watch.attach().unwrap();

	let handle = watch.downgrade();
	let _subscription = watch.subscribe(move |_: Option<&Value>| {
		if let Some(watch) = handle.upgrade() {
			watch.detach();
		}
	});

	control.set_value("a", json!(1));
	assert!(watch.is_detached());
	assert!(control.subscriptions().is_empty());
}

#[test]
fn listener_with_weak_handle_does_not_keep_watch_alive() {
	let control = Control::default();
	let watch = watch(&control, "a");
	watch.attach().unwrap();

	let seen = Rc::new(RefCell::new(Vec::new()));
	let handle = watch.downgrade();
	let subscription = watch.subscribe(on_change!((seen, handle) _value => {
		if let Some(watch) = handle.upgrade() {
			seen.borrow_mut().push(watch.value());
		}
	}));

	control.set_value("a", json!(1));
	assert_eq!(*seen.borrow(), vec![Some(json!(1))]);

	let weak = watch.downgrade();
	drop(watch);
	assert!(weak.upgrade().is_none());
	assert!(control.subscriptions().is_empty());

	drop(subscription);
	assert_eq!(control.subscriptions().notify("a"), 0);
}

#[test]
fn guards_dropped_out_of_order_remove_their_own_control() {
	let a = Control::new(json!({ "who": "a" }));
	let b = Control::new(json!({ "who": "b" }));

	let guard_a = context::provide(a);
	let guard_b = context::provide(b);

	drop(guard_a);
	let current = context::current().unwrap();
	assert_eq!(current.default_values(), json!({ "who": "b" }));

	let watch = WatchOptions::new().name("who").build().unwrap();
	assert_eq!(watch.value(), Some(json!("b")));

	drop(guard_b);
	assert!(context::current().is_none());
}

#[test]
fn out_of_range_index_is_refused() {
	let control = Control::new(json!({ "items": [] }));
	let watch = watch(&control, "items");
	watch.attach().unwrap();

	let calls = Rc::new(RefCell::new(0));
	let _subscription = watch.subscribe(on_change!((calls) _value => {
		*calls.borrow_mut() += 1;
	}));

	assert!(!control.set_value("items.18446744073709551615", json!(1)));
	assert!(!control.set_value("items.4000000000", json!(1)));
	assert_eq!(*calls.borrow(), 0);

	assert!(control.set_value("items.0", json!(1)));
	assert_eq!(*calls.borrow(), 1);
	assert_eq!(watch.value(), Some(json!([1])));
}

/// Form state whose fields can disappear: `resolve` yields `None` once the
/// value is cleared, regardless of the fallback.
struct Vanishing {
	value: RefCell<Option<Value>>,
	subscriptions: Subscriptions,
}

impl FormState for Vanishing {
	fn resolve(&self, name: &NameSpec, _fallback: Option<&Value>, id: Option<SubscriberId>) -> Option<Value> {
		if let Some(id) = id {
			self.subscriptions.track(id, name.paths());
		}
		self.value.borrow().clone()
	}

	fn subscriptions(&self) -> &Subscriptions {
		&self.subscriptions
	}

	fn default_values(&self) -> Value {
		json!({})
	}
}

#[test]
fn unresolved_value_renders_default() {
	let state = Rc::new(Vanishing {
		value: RefCell::new(Some(json!("v"))),
		subscriptions: Subscriptions::new(),
	});

	let watch = WatchOptions::new()
		.control(state.clone() as Rc<dyn FormState>)
		.name("a")
		.default_value(json!("d"))
		.build()
		.unwrap();
	watch.attach().unwrap();

	let seen = Rc::new(RefCell::new(Vec::new()));
	let _subscription = watch.subscribe(on_change!((seen) value => {
		seen.borrow_mut().push(value.cloned());
	}));

	state.subscriptions.notify("a");
	assert_eq!(watch.value(), Some(json!("v")));

	*state.value.borrow_mut() = None;
	state.subscriptions.notify("a");
	assert_eq!(watch.value(), Some(json!("d")));
	assert_eq!(*seen.borrow(), vec![Some(json!("v")), Some(json!("d"))]);
}
