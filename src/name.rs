use std::fmt::{self, Display};

use smallvec::SmallVec;

/// Which part of the form a watcher observes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum NameSpec {
	/// The whole form.
	#[default]
	All,
	Single(String),
	Many(Vec<String>),
}

impl NameSpec {
	pub fn is_all(&self) -> bool {
		matches!(self, NameSpec::All)
	}

	/// `Single("")` is a usage mistake, it is treated as [`NameSpec::All`].
	pub fn is_empty_single(&self) -> bool {
		matches!(self, NameSpec::Single(name) if name.is_empty())
	}

	pub(crate) fn normalize(self) -> Self {
		if self.is_empty_single() {
			NameSpec::All
		} else {
			self
		}
	}

	/// Paths named by this spec, empty for [`NameSpec::All`].
	pub fn paths(&self) -> SmallVec<[&str; 4]> {
		match self {
			NameSpec::All => SmallVec::new(),
			NameSpec::Single(name) => smallvec::smallvec![name.as_str()],
			NameSpec::Many(names) => names.iter().map(String::as_str).collect(),
		}
	}
}

impl From<&str> for NameSpec {
	fn from(name: &str) -> Self {
		NameSpec::Single(name.to_owned())
	}
}

impl From<String> for NameSpec {
	fn from(name: String) -> Self {
		NameSpec::Single(name)
	}
}

impl From<Vec<String>> for NameSpec {
	fn from(names: Vec<String>) -> Self {
		NameSpec::Many(names)
	}
}

impl From<Vec<&str>> for NameSpec {
	fn from(names: Vec<&str>) -> Self {
		NameSpec::Many(names.into_iter().map(str::to_owned).collect())
	}
}

impl<const N: usize> From<[&str; N]> for NameSpec {
	fn from(names: [&str; N]) -> Self {
		NameSpec::Many(names.iter().map(|n| (*n).to_owned()).collect())
	}
}

impl<T> From<Option<T>> for NameSpec
where
	T: Into<NameSpec>,
{
	fn from(name: Option<T>) -> Self {
		name.map(Into::into).unwrap_or_default()
	}
}

impl Display for NameSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			NameSpec::All => f.write_str("<form>"),
			NameSpec::Single(name) => f.write_str(name),
			NameSpec::Many(names) => write!(f, "[{}]", names.join(", ")),
		}
	}
}
