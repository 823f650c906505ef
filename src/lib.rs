/*!
Weight-augmented ordered set, map, multiset, and multimap collections via an
augmented red-black tree (self-balancing, each node carries the sum of a
caller-supplied weight function over its subtree).

* Embedded-friendly: `#![no_std]` by default (enable feature `std` for
  `std::error::Error` on [`Error`][crate::Error]).
* Two node storage back-ends: a one-allocation-per-node pointer back-end
  ([`OrdSet::new`]/[`OrdMap::new`]) and a compact, index-addressed arena back-end
  ([`OrdSet::new_compact`]/[`OrdMap::new_compact`]) for workloads that care about
  allocator call count and memory locality over raw insert/remove latency.
* Every component weight supports checked arithmetic: an overflowing or
  underflowing sum update returns [`Error::Arithmetic`] instead of wrapping.

### About

Four APIs, all backed by the same tree:

* [`OrdSet`] / [`OrdMultiset`] — ordered set and multiset.
* [`OrdMap`] / [`OrdMultimap`] — ordered map and multimap.

Unlike a plain ordered container, every entry also contributes a
`[W; D]`-shaped weight (`D` components, fixed at the type level) via a
closure supplied at construction. This enables `O(log n)`:

* [`OrdSet::total_sum`] / [`OrdMap::total_sum`] — the weight of every entry, combined.
* [`OrdSet::sum_before`] / [`OrdMap::sum_before`] — the combined weight of every
  entry strictly less than a given key.

A weight function that always returns `[1]` recovers ordinary rank/"how many
entries come before this key" queries; a weight function that reads a field
out of the value recovers prefix sums over that field, ordered by key.

### Usage

```rust
use ordstat::OrdMap;

// Rank by key; sum by a field of the value.
let mut balances: OrdMap<u32, i64, i64, 1, _, _> =
    OrdMap::new(|_account: &u32, balance: &i64| [*balance]);

balances.insert(101, 500).unwrap();
balances.insert(204, 1200).unwrap();
balances.insert(317, 75).unwrap();

// Total balance of every account with id < 300.
assert_eq!(balances.sum_before(&300).unwrap(), [1700]);
assert_eq!(balances.total_sum(), [1775]);
```

### Dependencies

* [`micromath`](https://crates.io/crates/micromath) — `#![no_std]` floating
  point approximations, used by [`f32`]'s [`Weight`][crate::weight::Weight] impl.

### Trusted Dependencies

This crate keeps its third-party surface small and, where the teacher crate's
dependencies no longer apply to this augmented design, drops them rather than
carrying dead weight — see `DESIGN.md` for exactly which teacher dependencies
were kept, dropped, or added and why.
*/

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

mod backend;
mod error;
mod facade;
mod macros;
mod reloc;
mod tree;
mod weight;
mod vec;

pub use error::Error;
pub use facade::{OrdMap, OrdMultimap, OrdMultiset, OrdSet};
pub use reloc::Relocatable;
pub use weight::Weight;
