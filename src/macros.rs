#![deny(unused_results)]

/// Create an [`OrdMap`][crate::OrdMap] from a weight function and a list of
/// key-value pairs. The weight function precedes the list, mirroring the
/// teacher crate's `sgmap!` (capacity precedes the list there).
///
/// # Examples
///
/// ```
/// use ordstat::{OrdMap, ordmap};
///
/// let mut map = ordmap! {
///     |_k: &&str, v: &i32| [*v as i64],
///     "a" => 0x61,
///     "b" => 0x62,
///     "c" => 0x63,
/// };
///
/// assert_eq!(map[&"a"], 0x61);
/// assert_eq!(map.len(), 3);
/// ```
#[macro_export]
macro_rules! ordmap {
    ( $weight_fn:expr $(, $key:expr => $value:expr)* $(,)? ) => {
        {
            let mut _ord_map = $crate::OrdMap::new($weight_fn);
            $(
                let _ = _ord_map.insert($key, $value).expect("ordmap! insert failed");
            )*
            _ord_map
        }
    };
}

/// Create an [`OrdSet`][crate::OrdSet] from a weight function and a list of
/// keys.
///
/// # Examples
///
/// ```
/// use ordstat::{OrdSet, ordset};
///
/// let mut set = ordset! {
///     |_k: &i32| [1i64],
///     1,
///     2,
///     3,
/// };
///
/// assert!(set.contains(&2));
/// assert_eq!(set.len(), 3);
/// ```
#[macro_export]
macro_rules! ordset {
    ( $weight_fn:expr $(, $value:expr)* $(,)? ) => {
        {
            let mut _ord_set = $crate::OrdSet::new($weight_fn);
            $(
                let _ = _ord_set.insert($value).expect("ordset! insert failed");
            )*
            _ord_set
        }
    };
}
