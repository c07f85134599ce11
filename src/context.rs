//! Ambient form state for watchers created without an explicit control.

use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::rc::Rc;

use crate::FormState;

thread_local! {
	static PROVIDED: RefCell<Vec<(u64, Rc<dyn FormState>)>> = RefCell::new(Vec::new());
	static NEXT_TOKEN: Cell<u64> = Cell::new(0);
}

/// Makes `control` the ambient form state until the guard is dropped.
///
/// The most recently provided control that is still guarded wins. Dropping a
/// guard removes only the control it provided, in whatever order guards go.
#[must_use]
pub fn provide(control: impl Into<Rc<dyn FormState>>) -> ContextGuard {
	let token = NEXT_TOKEN.with(|next| {
		let token = next.get();
		next.set(token + 1);
		token
	});
	PROVIDED.with(|p| p.borrow_mut().push((token, control.into())));
	ContextGuard {
		token,
		_not_send: PhantomData,
	}
}

pub fn current() -> Option<Rc<dyn FormState>> {
	PROVIDED.with(|p| p.borrow().last().map(|(_, control)| control.clone()))
}

pub struct ContextGuard {
	token: u64,
	_not_send: PhantomData<Rc<()>>,
}

impl Drop for ContextGuard {
	fn drop(&mut self) {
		PROVIDED.with(|p| {
			p.borrow_mut().retain(|(token, _)| *token != self.token);
		});
	}
}
