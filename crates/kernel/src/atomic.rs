//! Atomic integers usable from both task and interrupt context.
//!
//! By default every operation runs inside a process-wide critical section
//! (`critical-section` crate), which works on targets with no atomic
//! instructions at all. Enabling the `native-atomics` feature switches the
//! storage to `core::sync::atomic` types with sequentially consistent
//! ordering. The public API is identical in both configurations.
//!
//! No operation can fail or block on a scheduler; at worst it delays other
//! critical-section users for the duration of one read-modify-write.

use core::fmt;
use core::ops::{BitAnd, BitOr, BitXor};

mod sealed {
    pub trait Sealed {}
}

/// Integer types that can be stored in an [`Atomic`].
pub trait AtomicInteger:
    Copy
    + Eq
    + fmt::Debug
    + Send
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + BitXor<Output = Self>
    + sealed::Sealed
    + 'static
{
    #[doc(hidden)]
    type Storage: Send + Sync;

    #[doc(hidden)]
    fn new_storage(value: Self) -> Self::Storage;
    #[doc(hidden)]
    fn load(storage: &Self::Storage) -> Self;
    #[doc(hidden)]
    fn store(storage: &Self::Storage, value: Self);
    #[doc(hidden)]
    fn swap(storage: &Self::Storage, value: Self) -> Self;
    #[doc(hidden)]
    fn compare_exchange(storage: &Self::Storage, current: Self, new: Self) -> Result<Self, Self>;
    #[doc(hidden)]
    fn fetch_add(storage: &Self::Storage, value: Self) -> Self;
    #[doc(hidden)]
    fn fetch_sub(storage: &Self::Storage, value: Self) -> Self;
    #[doc(hidden)]
    fn fetch_and(storage: &Self::Storage, value: Self) -> Self;
    #[doc(hidden)]
    fn fetch_or(storage: &Self::Storage, value: Self) -> Self;
    #[doc(hidden)]
    fn fetch_xor(storage: &Self::Storage, value: Self) -> Self;
    #[doc(hidden)]
    const ONE: Self;
    #[doc(hidden)]
    fn add_wrapping(self, rhs: Self) -> Self;
    #[doc(hidden)]
    fn sub_wrapping(self, rhs: Self) -> Self;
}

#[cfg(not(feature = "native-atomics"))]
macro_rules! impl_atomic_integer {
    ($($ty:ty => $native:ident),* $(,)?) => {$(
        impl sealed::Sealed for $ty {}

        impl AtomicInteger for $ty {
            type Storage = critical_section::Mutex<core::cell::Cell<$ty>>;
            const ONE: Self = 1;

            fn add_wrapping(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }

            fn sub_wrapping(self, rhs: Self) -> Self {
                self.wrapping_sub(rhs)
            }

            fn new_storage(value: Self) -> Self::Storage {
                critical_section::Mutex::new(core::cell::Cell::new(value))
            }

            fn load(storage: &Self::Storage) -> Self {
                critical_section::with(|cs| storage.borrow(cs).get())
            }

            fn store(storage: &Self::Storage, value: Self) {
                critical_section::with(|cs| storage.borrow(cs).set(value));
            }

            fn swap(storage: &Self::Storage, value: Self) -> Self {
                critical_section::with(|cs| storage.borrow(cs).replace(value))
            }

            fn compare_exchange(storage: &Self::Storage, current: Self, new: Self) -> Result<Self, Self> {
                critical_section::with(|cs| {
                    let cell = storage.borrow(cs);
                    let old = cell.get();
                    if old == current {
                        cell.set(new);
                        Ok(old)
                    } else {
                        Err(old)
                    }
                })
            }

            fn fetch_add(storage: &Self::Storage, value: Self) -> Self {
                update(storage, |old| old.wrapping_add(value))
            }

            fn fetch_sub(storage: &Self::Storage, value: Self) -> Self {
                update(storage, |old| old.wrapping_sub(value))
            }

            fn fetch_and(storage: &Self::Storage, value: Self) -> Self {
                update(storage, |old| old & value)
            }

            fn fetch_or(storage: &Self::Storage, value: Self) -> Self {
                update(storage, |old| old | value)
            }

            fn fetch_xor(storage: &Self::Storage, value: Self) -> Self {
                update(storage, |old| old ^ value)
            }
        }
    )*};
}

/// Applies `f` to the stored value inside one critical section, returning the
/// previous value.
#[cfg(not(feature = "native-atomics"))]
fn update<T: Copy>(storage: &critical_section::Mutex<core::cell::Cell<T>>, f: impl FnOnce(T) -> T) -> T {
    critical_section::with(|cs| {
        let cell = storage.borrow(cs);
        let old = cell.get();
        cell.set(f(old));
        old
    })
}

#[cfg(feature = "native-atomics")]
macro_rules! impl_atomic_integer {
    ($($ty:ty => $native:ident),* $(,)?) => {$(
        impl sealed::Sealed for $ty {}

        impl AtomicInteger for $ty {
            type Storage = core::sync::atomic::$native;
            const ONE: Self = 1;

            fn add_wrapping(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }

            fn sub_wrapping(self, rhs: Self) -> Self {
                self.wrapping_sub(rhs)
            }

            fn new_storage(value: Self) -> Self::Storage {
                core::sync::atomic::$native::new(value)
            }

            fn load(storage: &Self::Storage) -> Self {
                storage.load(SeqCst)
            }

            fn store(storage: &Self::Storage, value: Self) {
                storage.store(value, SeqCst);
            }

            fn swap(storage: &Self::Storage, value: Self) -> Self {
                storage.swap(value, SeqCst)
            }

            fn compare_exchange(storage: &Self::Storage, current: Self, new: Self) -> Result<Self, Self> {
                storage.compare_exchange(current, new, SeqCst, SeqCst)
            }

            fn fetch_add(storage: &Self::Storage, value: Self) -> Self {
                storage.fetch_add(value, SeqCst)
            }

            fn fetch_sub(storage: &Self::Storage, value: Self) -> Self {
                storage.fetch_sub(value, SeqCst)
            }

            fn fetch_and(storage: &Self::Storage, value: Self) -> Self {
                storage.fetch_and(value, SeqCst)
            }

            fn fetch_or(storage: &Self::Storage, value: Self) -> Self {
                storage.fetch_or(value, SeqCst)
            }

            fn fetch_xor(storage: &Self::Storage, value: Self) -> Self {
                storage.fetch_xor(value, SeqCst)
            }
        }
    )*};
}

#[cfg(feature = "native-atomics")]
use core::sync::atomic::Ordering::SeqCst;

impl_atomic_integer! {
    u8 => AtomicU8,
    u16 => AtomicU16,
    u32 => AtomicU32,
    u64 => AtomicU64,
    usize => AtomicUsize,
    i8 => AtomicI8,
    i16 => AtomicI16,
    i32 => AtomicI32,
    i64 => AtomicI64,
    isize => AtomicIsize,
}

/// An integer whose every access is indivisible.
///
/// Arithmetic wraps on overflow. `fetch_*` operations return the value held
/// before the update.
pub struct Atomic<T: AtomicInteger> {
    storage: T::Storage,
}

impl<T: AtomicInteger> Atomic<T> {
    /// Creates an atomic holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            storage: T::new_storage(value),
        }
    }

    /// Reads the current value.
    #[inline]
    pub fn load(&self) -> T {
        T::load(&self.storage)
    }

    /// Replaces the current value.
    #[inline]
    pub fn store(&self, value: T) {
        T::store(&self.storage, value);
    }

    /// Stores `value` and returns the previous value.
    #[inline]
    pub fn swap(&self, value: T) -> T {
        T::swap(&self.storage, value)
    }

    /// Stores `new` if the current value equals `current`.
    ///
    /// Returns the previous value, wrapped in `Ok` on success.
    #[inline]
    pub fn compare_exchange(&self, current: T, new: T) -> Result<T, T> {
        T::compare_exchange(&self.storage, current, new)
    }

    /// Adds `value` (wrapping); returns the previous value.
    #[inline]
    pub fn fetch_add(&self, value: T) -> T {
        T::fetch_add(&self.storage, value)
    }

    /// Subtracts `value` (wrapping); returns the previous value.
    #[inline]
    pub fn fetch_sub(&self, value: T) -> T {
        T::fetch_sub(&self.storage, value)
    }

    /// Bitwise AND with `value`; returns the previous value.
    #[inline]
    pub fn fetch_and(&self, value: T) -> T {
        T::fetch_and(&self.storage, value)
    }

    /// Bitwise OR with `value`; returns the previous value.
    #[inline]
    pub fn fetch_or(&self, value: T) -> T {
        T::fetch_or(&self.storage, value)
    }

    /// Bitwise XOR with `value`; returns the previous value.
    #[inline]
    pub fn fetch_xor(&self, value: T) -> T {
        T::fetch_xor(&self.storage, value)
    }

    /// Post-increment: returns the value before adding one.
    #[inline]
    pub fn post_increment(&self) -> T {
        T::fetch_add(&self.storage, T::ONE)
    }

    /// Pre-increment: returns the value after adding one.
    #[inline]
    pub fn increment(&self) -> T {
        self.post_increment().add_wrapping(T::ONE)
    }

    /// Post-decrement: returns the value before subtracting one.
    #[inline]
    pub fn post_decrement(&self) -> T {
        T::fetch_sub(&self.storage, T::ONE)
    }

    /// Pre-decrement: returns the value after subtracting one.
    #[inline]
    pub fn decrement(&self) -> T {
        self.post_decrement().sub_wrapping(T::ONE)
    }

    /// `+=`: adds `value` (wrapping) and returns the new value.
    #[inline]
    pub fn add_fetch(&self, value: T) -> T {
        self.fetch_add(value).add_wrapping(value)
    }

    /// `-=`: subtracts `value` (wrapping) and returns the new value.
    #[inline]
    pub fn sub_fetch(&self, value: T) -> T {
        self.fetch_sub(value).sub_wrapping(value)
    }

    /// `&=`: returns the new value.
    #[inline]
    pub fn and_fetch(&self, value: T) -> T {
        self.fetch_and(value) & value
    }

    /// `|=`: returns the new value.
    #[inline]
    pub fn or_fetch(&self, value: T) -> T {
        self.fetch_or(value) | value
    }

    /// `^=`: returns the new value.
    #[inline]
    pub fn xor_fetch(&self, value: T) -> T {
        self.fetch_xor(value) ^ value
    }
}

impl<T: AtomicInteger + Default> Default for Atomic<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: AtomicInteger> From<T> for Atomic<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: AtomicInteger> fmt::Debug for Atomic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Atomic").field(&self.load()).finish()
    }
}

/// Boolean flag stored as a 0/1 byte.
#[derive(Default)]
pub struct AtomicBool {
    inner: Atomic<u8>,
}

impl AtomicBool {
    /// Creates a flag holding `value`.
    pub fn new(value: bool) -> Self {
        Self {
            inner: Atomic::new(u8::from(value)),
        }
    }

    /// Reads the flag.
    #[inline]
    pub fn load(&self) -> bool {
        self.inner.load() != 0
    }

    /// Sets the flag.
    #[inline]
    pub fn store(&self, value: bool) {
        self.inner.store(u8::from(value));
    }

    /// Sets the flag and returns its previous state.
    #[inline]
    pub fn swap(&self, value: bool) -> bool {
        self.inner.swap(u8::from(value)) != 0
    }

    /// Logical OR; returns the previous state.
    #[inline]
    pub fn fetch_or(&self, value: bool) -> bool {
        self.inner.fetch_or(u8::from(value)) != 0
    }

    /// Logical AND; returns the previous state.
    #[inline]
    pub fn fetch_and(&self, value: bool) -> bool {
        self.inner.fetch_and(u8::from(value)) != 0
    }

    /// Logical XOR; returns the previous state.
    #[inline]
    pub fn fetch_xor(&self, value: bool) -> bool {
        self.inner.fetch_xor(u8::from(value)) != 0
    }
}

impl From<bool> for AtomicBool {
    fn from(value: bool) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for AtomicBool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomicBool").field(&self.load()).finish()
    }
}

pub type AtomicU8 = Atomic<u8>;
pub type AtomicU16 = Atomic<u16>;
pub type AtomicU32 = Atomic<u32>;
pub type AtomicU64 = Atomic<u64>;
pub type AtomicUsize = Atomic<usize>;
pub type AtomicI8 = Atomic<i8>;
pub type AtomicI16 = Atomic<i16>;
pub type AtomicI32 = Atomic<i32>;
pub type AtomicI64 = Atomic<i64>;
pub type AtomicIsize = Atomic<isize>;
