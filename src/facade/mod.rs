//! Thin façades binding `Tree` to set/multiset/map/multimap surface APIs
//! (spec.md §4.6). No façade carries state beyond its single `Tree`.

mod map;
mod set;

pub use map::{OrdMap, OrdMultimap};
pub use set::{OrdMultiset, OrdSet};
