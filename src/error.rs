use thiserror::Error;

pub type Result<T> = std::result::Result<T, WatchError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WatchError {
	/// Neither an explicit control nor an ambient one was available.
	#[error("watch is missing a form control: pass one explicitly or provide one with `context::provide`")]
	MissingControl,

	#[error("watch was detached and cannot be attached again")]
	Detached,
}
