//! Opt-in marker for bitwise-relocatable types, per spec.md §4.1/§4.4.

/// Asserts that moving `Self`'s byte representation to a new address — without
/// running any of `Self`'s code (no `Drop`, no `Clone`) — is sound.
///
/// `ReallocVec` requires this bound; `StackedVec` never moves an element once
/// placed, so it accepts any `T`. `CompactAlloc`'s node-storage backing is
/// picked between the two by whether the node type implements this trait,
/// decided once at container-construction time (the type parameter named in
/// the `Backing` choice), never by a runtime check.
///
/// # Safety
///
/// Implementors must not contain self-referential pointers (a pointer into
/// `self`), must not be pinned, and must not rely on their address for
/// identity or for running destructor side effects tied to that address.
pub unsafe trait Relocatable {}

macro_rules! impl_relocatable_copy {
    ($($t:ty),* $(,)?) => {
        $(
            unsafe impl Relocatable for $t {}
        )*
    };
}

impl_relocatable_copy!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64
);

unsafe impl<T: Relocatable, const N: usize> Relocatable for [T; N] {}

unsafe impl<A: Relocatable, B: Relocatable> Relocatable for (A, B) {}

unsafe impl<T: Relocatable> Relocatable for Option<T> {}
