//! The augmented red-black tree (spec.md §4.5) and its iterator wrappers.

mod core;
mod iter;

pub(crate) use self::core::{KeyPolicy, Multi, Tree, Unique};
pub(crate) use iter::{IntoIter, Iter};
