pub use enclose::*;

/// Builds a listener for [`Watch::subscribe`](crate::Watch::subscribe).
///
/// ```ignore
/// let _subscription = watch.subscribe(on_change!((renders) value => {
///     renders.borrow_mut().push(value.cloned());
/// }));
/// ```
#[macro_export]
macro_rules! on_change {
    (( $($d_tt:tt)* ) $value:ident => $($b:tt)*) => {
        $crate::macros::enclose!(($( $d_tt )*) move |$value: ::std::option::Option<&$crate::Value>| { $($b)* })
    };
    ($value:ident => $($b:tt)*) => {
        move |$value: ::std::option::Option<&$crate::Value>| { $($b)* }
    };
}
