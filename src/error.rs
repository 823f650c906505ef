use core::fmt;

/// Every fallible outcome a container operation can produce.
///
/// A single flat enum (rather than one error type per operation) mirrors the
/// teacher crate's `SGErr`, extended with the kinds this crate's augmented,
/// dual-backend design needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The backing allocator could not produce a new node.
    OutOfMemory,

    /// A weight-sum propagation overflowed or underflowed `W`'s representable
    /// range. Per spec, the tree is left inconsistent after this error; the
    /// only safe recovery is to discard and rebuild the container.
    Arithmetic,

    /// A nil/sentinel handle (or a handle from a different container) was
    /// passed where a live handle was required.
    InvalidHandle,

    /// `at`/`update_value`/`set_value` addressed a key absent from the map.
    KeyAbsent,

    /// A positional accessor was given an index at or beyond `size()`.
    OutOfRange,

    /// `check()` found a structural or sum inconsistency. Diagnostic only:
    /// the tree is never modified by a failed check.
    InvariantViolated,

    /// The compact allocator has exhausted its index space.
    Capacity,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::OutOfMemory => "allocator could not satisfy the request",
            Error::Arithmetic => "weight-sum propagation overflowed or underflowed",
            Error::InvalidHandle => "handle is nil, stale, or foreign to this container",
            Error::KeyAbsent => "key not present",
            Error::OutOfRange => "index at or beyond container size",
            Error::InvariantViolated => "internal invariant check failed",
            Error::Capacity => "arena index space exhausted",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_non_empty_for_every_kind() {
        let kinds = [
            Error::OutOfMemory,
            Error::Arithmetic,
            Error::InvalidHandle,
            Error::KeyAbsent,
            Error::OutOfRange,
            Error::InvariantViolated,
            Error::Capacity,
        ];
        for k in kinds {
            assert!(!format!("{}", k).is_empty());
        }
    }
}
