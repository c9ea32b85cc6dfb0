/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 *
 * (c) ZeroTier, Inc.
 * https://www.zerotier.com/
 */

use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::cell::Cell;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::mem::{self, needs_drop, MaybeUninit};
use std::ops::{Bound, Deref, DerefMut, Index, IndexMut, RangeBounds};
use std::ptr::{self, NonNull};
use std::slice;

use crate::error::TryReserveError;
use crate::unlikely_branch;

/// Header prefixed to every heap allocation used by the "large" representation.
///
/// The elements themselves follow directly after this header in the same
/// allocation (see [`data_ptr`]). `ref_count` is a plain `Cell`, not atomic:
/// sharing a [`SocowVec`] buffer across threads is not supported (see the
/// crate-level docs), so there is never a need to pay for an atomic RMW here.
#[repr(C)]
struct Header<T> {
    ref_count: Cell<usize>,
    len: usize,
    _marker: PhantomData<T>,
}

/// Computes the allocation layout for a large buffer of the given capacity,
/// along with the byte offset at which the element array begins.
fn header_and_array_layout<T>(cap: usize) -> Option<(Layout, usize)> {
    let header_layout = Layout::new::<Header<T>>();
    let array_layout = Layout::array::<T>(cap).ok()?;
    let (combined, offset) = header_layout.extend(array_layout).ok()?;
    Some((combined.pad_to_align(), offset))
}

/// The element-array offset depends only on the alignment of `T`, not on
/// `cap`, so it can be computed once with a zero-length array.
fn data_offset<T>() -> usize {
    header_and_array_layout::<T>(0).expect("offset computation cannot fail for a zero-length array").1
}

fn data_ptr<T>(handle: NonNull<Header<T>>) -> *mut T {
    unsafe { (handle.as_ptr() as *mut u8).add(data_offset::<T>()).cast::<T>() }
}

unsafe fn dealloc_large<T>(handle: NonNull<Header<T>>, cap: usize) {
    let (layout, _) = header_and_array_layout::<T>(cap).expect("capacity overflow");
    dealloc(handle.as_ptr().cast(), layout);
}

/// An in-progress, exclusively-owned large buffer.
///
/// Elements are appended left to right via [`RawBuf::push_move`] /
/// [`RawBuf::push_clone`]. If the `RawBuf` is dropped before [`RawBuf::commit`]
/// is called (e.g. because an element clone panicked), every element written
/// so far is dropped and the allocation is freed -- this is what gives every
/// growth path in [`SocowVec`] its strong exception guarantee.
struct RawBuf<T> {
    handle: NonNull<Header<T>>,
    cap: usize,
    written: usize,
    committed: bool,
}

impl<T> RawBuf<T> {
    fn try_new(cap: usize) -> Result<Self, TryReserveError> {
        let (layout, _) = header_and_array_layout::<T>(cap).ok_or(TryReserveError { requested: cap })?;
        let raw = unsafe { alloc(layout) };
        if raw.is_null() {
            unlikely_branch();
            return Err(TryReserveError { requested: cap });
        }
        let handle = unsafe { NonNull::new_unchecked(raw.cast::<Header<T>>()) };
        unsafe { handle.as_ptr().write(Header { ref_count: Cell::new(1), len: 0, _marker: PhantomData }) };
        Ok(Self { handle, cap, written: 0, committed: false })
    }

    fn new(cap: usize) -> Self {
        let (layout, _) = header_and_array_layout::<T>(cap).expect("capacity overflow");
        let raw = unsafe { alloc(layout) };
        if raw.is_null() {
            unlikely_branch();
            handle_alloc_error(layout);
        }
        let handle = unsafe { NonNull::new_unchecked(raw.cast::<Header<T>>()) };
        unsafe { handle.as_ptr().write(Header { ref_count: Cell::new(1), len: 0, _marker: PhantomData }) };
        Self { handle, cap, written: 0, committed: false }
    }

    #[inline(always)]
    fn data_ptr(&self) -> *mut T {
        data_ptr(self.handle)
    }

    /// # Safety
    /// Caller must not push more than `cap` elements in total.
    unsafe fn push_move(&mut self, value: T) {
        debug_assert!(self.written < self.cap);
        self.data_ptr().add(self.written).write(value);
        self.written += 1;
    }

    /// # Safety
    /// Caller must not push more than `cap` elements in total.
    unsafe fn push_clone(&mut self, value: &T)
    where
        T: Clone,
    {
        debug_assert!(self.written < self.cap);
        self.data_ptr().add(self.written).write(value.clone());
        self.written += 1;
    }

    /// Finalize this buffer with the given logical length, handing back its handle.
    fn commit(mut self, len: usize) -> NonNull<Header<T>> {
        debug_assert!(len <= self.written);
        unsafe { (*self.handle.as_ptr()).len = len };
        self.committed = true;
        self.handle
    }
}

impl<T> Drop for RawBuf<T> {
    fn drop(&mut self) {
        if !self.committed {
            unsafe {
                let data = self.data_ptr();
                for i in 0..self.written {
                    ptr::drop_in_place(data.add(i));
                }
                dealloc_large(self.handle, self.cap);
            }
        }
    }
}

/// What to do with a container's previous large-mode allocation once a fresh
/// one has successfully replaced it.
enum Cleanup<T> {
    /// Was small-mode; nothing to release.
    None,
    /// Was large-mode but shared; give up this container's share of it.
    DecrementShared(NonNull<Header<T>>),
    /// Was large-mode and exclusive; its elements were moved out, so only
    /// the allocation itself needs releasing.
    FreeExclusive(NonNull<Header<T>>, usize),
}

enum Repr<T, const N: usize> {
    Small { len: usize, buf: [MaybeUninit<T>; N] },
    Large { cap: usize, handle: NonNull<Header<T>> },
}

/// A small-buffer-optimized, copy-on-write dynamic sequence of `T`.
///
/// Up to `N` elements are stored inline. Beyond that, elements live in a
/// heap-allocated, reference-counted buffer that is shared between clones:
/// cloning a large [`SocowVec`] is an O(1) reference-count bump, and the
/// buffer is copied only when one of the sharers is mutated (copy-on-write).
///
/// `SocowVec` is single-threaded: its reference count is a plain [`Cell`],
/// so it is neither `Send` nor `Sync`.
pub struct SocowVec<T, const N: usize> {
    repr: Repr<T, N>,
}

impl<T, const N: usize> SocowVec<T, N> {
    /// Creates an empty, inline (small-mode) vector.
    #[inline]
    pub fn new() -> Self {
        Self { repr: Repr::Small { len: 0, buf: unsafe { MaybeUninit::uninit().assume_init() } } }
    }

    #[inline]
    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Small { len, .. } => *len,
            Repr::Large { handle, .. } => unsafe { handle.as_ref().len },
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `N` while small, the heap buffer's allocated capacity while large.
    #[inline]
    pub fn capacity(&self) -> usize {
        match &self.repr {
            Repr::Small { .. } => N,
            Repr::Large { cap, .. } => *cap,
        }
    }

    #[inline]
    fn is_large(&self) -> bool {
        matches!(self.repr, Repr::Large { .. })
    }

    /// True if this is a large buffer with more than one owner.
    #[inline]
    fn is_shared(&self) -> bool {
        match &self.repr {
            Repr::Small { .. } => false,
            Repr::Large { handle, .. } => unsafe { handle.as_ref().ref_count.get() > 1 },
        }
    }

    pub fn as_slice(&self) -> &[T] {
        match &self.repr {
            Repr::Small { len, buf } => unsafe { slice::from_raw_parts(buf.as_ptr().cast::<T>(), *len) },
            Repr::Large { handle, .. } => unsafe {
                slice::from_raw_parts(data_ptr(*handle), handle.as_ref().len)
            },
        }
    }

    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.as_slice().as_ptr()
    }

    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    #[inline]
    pub fn first(&self) -> Option<&T> {
        self.as_slice().first()
    }

    #[inline]
    pub fn last(&self) -> Option<&T> {
        self.as_slice().last()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }
}

impl<T, const N: usize> Default for SocowVec<T, N> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

// --- mutating API: requires T: Clone, since detaching a shared large buffer clones elements. ---
impl<T: Clone, const N: usize> SocowVec<T, N> {
    /// Reads out this container's plan for releasing its current large-mode
    /// allocation, to be applied with [`Self::apply_cleanup`] once a
    /// replacement buffer has been committed. Must be captured before the
    /// replacement is built, since building it only reads `self`.
    fn cleanup_info(&self) -> Cleanup<T> {
        match &self.repr {
            Repr::Small { .. } => Cleanup::None,
            Repr::Large { cap, handle } => {
                let handle = *handle;
                if unsafe { handle.as_ref().ref_count.get() } > 1 {
                    Cleanup::DecrementShared(handle)
                } else {
                    Cleanup::FreeExclusive(handle, *cap)
                }
            }
        }
    }

    fn apply_cleanup(cleanup: Cleanup<T>) {
        match cleanup {
            Cleanup::None => {}
            Cleanup::DecrementShared(handle) => unsafe {
                let rc = handle.as_ref().ref_count.get();
                handle.as_ref().ref_count.set(rc - 1);
            },
            Cleanup::FreeExclusive(handle, cap) => unsafe { dealloc_large(handle, cap) },
        }
    }

    /// Appends this container's current elements into `dest`: moved if this
    /// container exclusively owns them, cloned if they are shared (since
    /// sharers still need their copy). Does not touch `self`'s own storage.
    fn copy_elements_into(&self, dest: &mut RawBuf<T>) {
        match &self.repr {
            Repr::Small { len, buf } => unsafe {
                let src = buf.as_ptr().cast::<T>();
                for i in 0..*len {
                    dest.push_move(ptr::read(src.add(i)));
                }
            },
            Repr::Large { handle, .. } => {
                let handle = *handle;
                let header = unsafe { handle.as_ref() };
                let src = data_ptr(handle);
                if header.ref_count.get() > 1 {
                    for i in 0..header.len {
                        unsafe { dest.push_clone(&*src.add(i)) };
                    }
                } else {
                    for i in 0..header.len {
                        unsafe { dest.push_move(ptr::read(src.add(i))) };
                    }
                }
            }
        }
    }

    /// Ensures this container is large-mode, exclusively owned, with exactly
    /// `new_cap` capacity. `new_cap` must be `> N` and `>= self.len()`.
    ///
    /// This is the central "detach"/"unshare" operation: every path that
    /// needs a mutable element or a length change while large routes through
    /// here (directly, or through [`Self::reserve`]/[`Self::shrink_to_fit`]).
    fn detach_to(&mut self, new_cap: usize) {
        debug_assert!(new_cap >= self.len());
        debug_assert!(new_cap > N || self.is_large());
        if let Repr::Large { cap, handle } = &self.repr {
            if unsafe { handle.as_ref().ref_count.get() } == 1 && *cap == new_cap {
                return;
            }
        }
        let len = self.len();
        let cleanup = self.cleanup_info();
        let mut new_buf = RawBuf::<T>::new(new_cap);
        self.copy_elements_into(&mut new_buf);
        let handle = new_buf.commit(len);
        Self::apply_cleanup(cleanup);
        self.repr = Repr::Large { cap: new_cap, handle };
    }

    /// Detaches to an exclusive buffer at the current capacity if (and only
    /// if) this container is currently a shared large buffer. A no-op
    /// otherwise, including while small (small mode is never shared).
    fn ensure_exclusive(&mut self) {
        if self.is_shared() {
            let cap = self.capacity();
            self.detach_to(cap);
        }
    }

    fn as_mut_ptr_exclusive(&mut self) -> *mut T {
        match &mut self.repr {
            Repr::Small { buf, .. } => buf.as_mut_ptr().cast::<T>(),
            Repr::Large { handle, .. } => data_ptr(*handle),
        }
    }

    fn set_len(&mut self, new_len: usize) {
        match &mut self.repr {
            Repr::Small { len, .. } => *len = new_len,
            Repr::Large { handle, .. } => unsafe { (*handle.as_ptr()).len = new_len },
        }
    }

    /// Detaches (if shared) or promotes (if small) to obtain a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.ensure_exclusive();
        let len = self.len();
        unsafe { slice::from_raw_parts_mut(self.as_mut_ptr_exclusive(), len) }
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.as_mut_slice().as_mut_ptr()
    }

    #[inline]
    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }

    #[inline]
    pub fn first_mut(&mut self) -> Option<&mut T> {
        self.as_mut_slice().first_mut()
    }

    #[inline]
    pub fn last_mut(&mut self) -> Option<&mut T> {
        self.as_mut_slice().last_mut()
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.as_mut_slice().get_mut(index)
    }

    /// Appends `value`. `value` may alias an existing element of `self` (e.g.
    /// `v.push(v[0].clone())`): since `push` takes `value` by ownership, the
    /// caller's clone is captured before any reallocation touches `self`'s
    /// storage, so aliasing can never observe a half-moved source.
    pub fn push(&mut self, value: T) {
        enum Plan {
            InPlace,
            Grow(usize),
        }
        let plan = match &self.repr {
            Repr::Small { len, .. } if *len < N => Plan::InPlace,
            Repr::Small { .. } => Plan::Grow(if N == 0 { 1 } else { 2 * N }),
            Repr::Large { cap, handle } => {
                let header = unsafe { handle.as_ref() };
                if header.ref_count.get() == 1 && header.len < *cap {
                    Plan::InPlace
                } else if header.len == *cap {
                    Plan::Grow(cap.checked_mul(2).expect("capacity overflow"))
                } else {
                    Plan::Grow(*cap)
                }
            }
        };
        match plan {
            Plan::InPlace => match &mut self.repr {
                Repr::Small { len, buf } => {
                    unsafe { buf.get_unchecked_mut(*len).write(value) };
                    *len += 1;
                }
                Repr::Large { handle, .. } => unsafe {
                    let len = handle.as_ref().len;
                    data_ptr(*handle).add(len).write(value);
                    (*handle.as_ptr()).len = len + 1;
                },
            },
            Plan::Grow(new_cap) => self.grow_with_push(new_cap, value),
        }
    }

    fn grow_with_push(&mut self, new_cap: usize, value: T) {
        let len = self.len();
        let cleanup = self.cleanup_info();
        let mut new_buf = RawBuf::<T>::new(new_cap);
        self.copy_elements_into(&mut new_buf);
        unsafe { new_buf.push_move(value) };
        let handle = new_buf.commit(len + 1);
        Self::apply_cleanup(cleanup);
        self.repr = Repr::Large { cap: new_cap, handle };
    }

    /// Removes and returns the last element, or `None` if empty.
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        self.ensure_exclusive();
        let len = self.len();
        let value = unsafe { ptr::read(self.as_mut_ptr_exclusive().add(len - 1)) };
        self.set_len(len - 1);
        Some(value)
    }

    /// Inserts `value` at `index`, shifting everything at and after `index`
    /// one position to the right. Panics if `index > len()`.
    pub fn insert(&mut self, index: usize, value: T) {
        let len = self.len();
        assert!(index <= len, "insertion index (is {index}) should be <= len (is {len})");
        enum Plan {
            InPlace,
            Grow(usize),
        }
        let plan = match &self.repr {
            Repr::Small { len: small_len, .. } if *small_len < N => Plan::InPlace,
            Repr::Small { .. } => Plan::Grow(if N == 0 { 1 } else { 2 * N }),
            Repr::Large { cap, handle } => {
                let header = unsafe { handle.as_ref() };
                if header.ref_count.get() == 1 && header.len < *cap {
                    Plan::InPlace
                } else if header.len == *cap {
                    Plan::Grow(cap.checked_mul(2).expect("capacity overflow"))
                } else {
                    Plan::Grow(*cap)
                }
            }
        };
        match plan {
            Plan::InPlace => self.insert_in_place(index, value),
            Plan::Grow(new_cap) => self.detach_insert(new_cap, index, value),
        }
    }

    fn insert_in_place(&mut self, index: usize, value: T) {
        let len = self.len();
        unsafe {
            let p = self.as_mut_ptr_exclusive().add(index);
            ptr::copy(p, p.add(1), len - index);
            p.write(value);
        }
        self.set_len(len + 1);
    }

    /// Builds a fresh exclusive buffer of `new_cap` with `value` spliced in
    /// at `index`, sourcing the surrounding elements from `self` (moved if
    /// exclusive, cloned if shared) the same way [`Self::detach_to`] does.
    fn detach_insert(&mut self, new_cap: usize, index: usize, value: T) {
        let len = self.len();
        let cleanup = self.cleanup_info();
        let mut new_buf = RawBuf::<T>::new(new_cap);
        match &self.repr {
            Repr::Small { buf, .. } => unsafe {
                let src = buf.as_ptr().cast::<T>();
                for i in 0..index {
                    new_buf.push_move(ptr::read(src.add(i)));
                }
                new_buf.push_move(value);
                for i in index..len {
                    new_buf.push_move(ptr::read(src.add(i)));
                }
            },
            Repr::Large { handle, .. } => {
                let handle = *handle;
                let header = unsafe { handle.as_ref() };
                let src = data_ptr(handle);
                if header.ref_count.get() > 1 {
                    unsafe {
                        for i in 0..index {
                            new_buf.push_clone(&*src.add(i));
                        }
                        new_buf.push_move(value);
                        for i in index..len {
                            new_buf.push_clone(&*src.add(i));
                        }
                    }
                } else {
                    unsafe {
                        for i in 0..index {
                            new_buf.push_move(ptr::read(src.add(i)));
                        }
                        new_buf.push_move(value);
                        for i in index..len {
                            new_buf.push_move(ptr::read(src.add(i)));
                        }
                    }
                }
            }
        }
        let handle = new_buf.commit(len + 1);
        Self::apply_cleanup(cleanup);
        self.repr = Repr::Large { cap: new_cap, handle };
    }

    /// Removes and returns the element at `index`, shifting everything after
    /// it one position to the left. Panics if `index >= len()`.
    pub fn remove(&mut self, index: usize) -> T {
        let len = self.len();
        assert!(index < len, "removal index (is {index}) should be < len (is {len})");
        self.ensure_exclusive();
        let value = unsafe {
            let p = self.as_mut_ptr_exclusive().add(index);
            let value = ptr::read(p);
            ptr::copy(p.add(1), p, len - index - 1);
            value
        };
        self.set_len(len - 1);
        value
    }

    /// Removes the elements in `range`, shifting the tail left, and returns
    /// the removed elements. Panics if the range is out of bounds.
    pub fn drain_range<R: RangeBounds<usize>>(&mut self, range: R) -> Vec<T> {
        let (first, last) = Self::resolve_range(range, self.len());
        let mut removed = Vec::with_capacity(last - first);
        self.remove_range(first, last, |p| unsafe { removed.push(ptr::read(p)) });
        removed
    }

    /// Removes `[first, last)`, dropping the removed elements in place.
    /// Unlike [`Self::drain_range`], this never allocates.
    pub fn erase(&mut self, first: usize, last: usize) {
        assert!(first <= last && last <= self.len(), "erase range out of bounds");
        if needs_drop::<T>() {
            self.remove_range(first, last, |p| unsafe { ptr::drop_in_place(p) });
        } else {
            self.remove_range(first, last, |_| {});
        }
    }

    /// Shifts `[first, last)` out of the live range, calling `on_each` once
    /// per removed element (in order) before the tail is moved down over the
    /// gap. `on_each` must take ownership of `*p` (by moving or dropping it)
    /// exactly once; it is the caller's responsibility to do so.
    fn remove_range(&mut self, first: usize, last: usize, mut on_each: impl FnMut(*mut T)) {
        self.ensure_exclusive();
        let len = self.len();
        let count = last - first;
        unsafe {
            let p = self.as_mut_ptr_exclusive().add(first);
            for i in 0..count {
                on_each(p.add(i));
            }
            ptr::copy(p.add(count), p, len - last);
        }
        self.set_len(len - count);
    }

    fn resolve_range<R: RangeBounds<usize>>(range: R, len: usize) -> (usize, usize) {
        let first = match range.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n + 1,
            Bound::Unbounded => 0,
        };
        let last = match range.end_bound() {
            Bound::Included(&n) => n + 1,
            Bound::Excluded(&n) => n,
            Bound::Unbounded => len,
        };
        assert!(first <= last && last <= len, "drain range out of bounds");
        (first, last)
    }

    /// Ensures `capacity() >= n`. Unlike [`Vec::reserve`], `n` is the total
    /// desired capacity, not an additional amount -- matching the C++
    /// `std::vector`-style contract this container's semantics are drawn
    /// from. A shared large buffer whose capacity already satisfies `n` is
    /// left shared; `reserve` alone does not imply an intent to mutate.
    pub fn reserve(&mut self, n: usize) {
        if n > self.capacity() {
            self.detach_to(n);
        }
    }

    /// Fallible counterpart to [`Self::reserve`]: returns an error instead of
    /// aborting the process when the allocator cannot satisfy the request.
    pub fn try_reserve(&mut self, n: usize) -> Result<(), TryReserveError> {
        if n <= self.capacity() {
            return Ok(());
        }
        let len = self.len();
        let cleanup = self.cleanup_info();
        let mut new_buf = RawBuf::<T>::try_new(n)?;
        self.copy_elements_into(&mut new_buf);
        let handle = new_buf.commit(len);
        Self::apply_cleanup(cleanup);
        self.repr = Repr::Large { cap: n, handle };
        Ok(())
    }

    /// Shrinks capacity to fit the current length exactly: migrates back to
    /// inline storage if `len() <= N`, otherwise reallocates an exclusive
    /// buffer of exactly `len()` capacity. A no-op while already small
    /// (inline capacity is fixed at `N`) or already exactly fitting.
    pub fn shrink_to_fit(&mut self) {
        if !self.is_large() {
            return;
        }
        let len = self.len();
        if self.capacity() == len {
            return;
        }
        if len > N {
            self.detach_to(len);
            return;
        }

        // Migrate elements back into inline storage.
        let mut new_small: [MaybeUninit<T>; N] = unsafe { MaybeUninit::uninit().assume_init() };
        struct Guard<T> {
            ptr: *mut MaybeUninit<T>,
            written: usize,
        }
        impl<T> Drop for Guard<T> {
            fn drop(&mut self) {
                unsafe {
                    for i in 0..self.written {
                        (*self.ptr.add(i)).assume_init_drop();
                    }
                }
            }
        }
        let mut guard = Guard { ptr: new_small.as_mut_ptr(), written: 0 };
        let cleanup = self.cleanup_info();
        match &self.repr {
            Repr::Large { handle, .. } => {
                let handle = *handle;
                let header = unsafe { handle.as_ref() };
                let src = data_ptr(handle);
                if header.ref_count.get() > 1 {
                    for i in 0..len {
                        unsafe { (*guard.ptr.add(i)).write((*src.add(i)).clone()) };
                        guard.written = i + 1;
                    }
                } else {
                    for i in 0..len {
                        unsafe { (*guard.ptr.add(i)).write(ptr::read(src.add(i))) };
                        guard.written = i + 1;
                    }
                }
            }
            Repr::Small { .. } => unreachable!("guarded by is_large() above"),
        }
        mem::forget(guard);
        Self::apply_cleanup(cleanup);
        self.repr = Repr::Small { len, buf: new_small };
    }

    /// Empties this container. If large and shared, this is a cheap reset:
    /// the shared buffer is untouched (its ref count just drops by one) and
    /// `self` becomes an empty small-mode container, rather than detaching
    /// into an empty exclusive buffer. If large and exclusive, `capacity()`
    /// and `data()`/`as_ptr()` are preserved (elements are dropped in place).
    pub fn clear(&mut self) {
        enum Action<T> {
            Small(usize),
            SharedReset(NonNull<Header<T>>),
            ExclusiveClear(NonNull<Header<T>>, usize),
        }
        let action = match &self.repr {
            Repr::Small { len, .. } => Action::Small(*len),
            Repr::Large { handle, .. } => {
                let handle = *handle;
                let header = unsafe { handle.as_ref() };
                if header.ref_count.get() > 1 {
                    Action::SharedReset(handle)
                } else {
                    Action::ExclusiveClear(handle, header.len)
                }
            }
        };
        match action {
            Action::Small(len) => {
                if needs_drop::<T>() {
                    if let Repr::Small { buf, .. } = &mut self.repr {
                        unsafe {
                            for i in 0..len {
                                buf.get_unchecked_mut(i).assume_init_drop();
                            }
                        }
                    }
                }
                self.set_len(0);
            }
            Action::SharedReset(handle) => {
                let rc = unsafe { handle.as_ref().ref_count.get() };
                unsafe { handle.as_ref().ref_count.set(rc - 1) };
                self.repr = Repr::Small { len: 0, buf: unsafe { MaybeUninit::uninit().assume_init() } };
            }
            Action::ExclusiveClear(handle, len) => {
                if needs_drop::<T>() {
                    let data = data_ptr(handle);
                    unsafe {
                        for i in 0..len {
                            ptr::drop_in_place(data.add(i));
                        }
                    }
                }
                unsafe { (*handle.as_ptr()).len = 0 };
            }
        }
    }

    /// Exchanges the contents of `self` and `other` in constant time and
    /// without ever cloning an element.
    ///
    /// Unlike the storage-mode-by-storage-mode case analysis a non-relocatable
    /// language needs here, every Rust value is unconditionally relocatable
    /// (moving a value is always a bitwise copy plus forgetting the source),
    /// so swapping the two representations wholesale is already correct for
    /// every pairing of small/large modes: whichever bytes end up in `self`'s
    /// `repr` field are observed through `self`'s own address, inline buffer
    /// included.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.repr, &mut other.repr);
    }
}

impl<T: Clone, const N: usize> Clone for SocowVec<T, N> {
    fn clone(&self) -> Self {
        match &self.repr {
            Repr::Small { len, buf } => {
                let len = *len;
                let mut new_buf: [MaybeUninit<T>; N] = unsafe { MaybeUninit::uninit().assume_init() };
                struct Guard<T> {
                    ptr: *mut MaybeUninit<T>,
                    written: usize,
                }
                impl<T> Drop for Guard<T> {
                    fn drop(&mut self) {
                        unsafe {
                            for i in 0..self.written {
                                (*self.ptr.add(i)).assume_init_drop();
                            }
                        }
                    }
                }
                let mut guard = Guard { ptr: new_buf.as_mut_ptr(), written: 0 };
                for i in 0..len {
                    let value = unsafe { buf.get_unchecked(i).assume_init_ref().clone() };
                    unsafe { (*guard.ptr.add(i)).write(value) };
                    guard.written = i + 1;
                }
                mem::forget(guard);
                Self { repr: Repr::Small { len, buf: new_buf } }
            }
            Repr::Large { cap, handle } => {
                let rc = unsafe { handle.as_ref().ref_count.get() };
                unsafe { handle.as_ref().ref_count.set(rc + 1) };
                Self { repr: Repr::Large { cap: *cap, handle: *handle } }
            }
        }
    }
}

impl<T, const N: usize> Drop for SocowVec<T, N> {
    fn drop(&mut self) {
        match &mut self.repr {
            Repr::Small { len, buf } => {
                if needs_drop::<T>() {
                    unsafe {
                        for i in 0..*len {
                            buf.get_unchecked_mut(i).assume_init_drop();
                        }
                    }
                }
            }
            Repr::Large { cap, handle } => {
                let handle = *handle;
                let header = unsafe { handle.as_ref() };
                let rc = header.ref_count.get();
                if rc == 1 {
                    if needs_drop::<T>() {
                        let data = data_ptr(handle);
                        let len = header.len;
                        unsafe {
                            for i in 0..len {
                                ptr::drop_in_place(data.add(i));
                            }
                        }
                    }
                    unsafe { dealloc_large(handle, *cap) };
                } else {
                    header.ref_count.set(rc - 1);
                }
            }
        }
    }
}

impl<T, const N: usize> Deref for SocowVec<T, N> {
    type Target = [T];
    #[inline]
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Clone, const N: usize> DerefMut for SocowVec<T, N> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T, const N: usize> Index<usize> for SocowVec<T, N> {
    type Output = T;
    #[inline]
    fn index(&self, index: usize) -> &T {
        &self.as_slice()[index]
    }
}

impl<T: Clone, const N: usize> IndexMut<usize> for SocowVec<T, N> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.as_mut_slice()[index]
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a SocowVec<T, N> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;
    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T: Clone, const N: usize> IntoIterator for &'a mut SocowVec<T, N> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;
    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T: Clone, const N: usize> IntoIterator for SocowVec<T, N> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;
    fn into_iter(mut self) -> Self::IntoIter {
        let len = self.len();
        self.drain_range(0..len).into_iter()
    }
}

impl<T: Clone, const N: usize> FromIterator<T> for SocowVec<T, N> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut v = Self::new();
        for x in iter {
            v.push(x);
        }
        v
    }
}

impl<T: Clone, const N: usize> Extend<T> for SocowVec<T, N> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for x in iter {
            self.push(x);
        }
    }
}

impl<T: Clone, const N: usize, const S: usize> From<[T; S]> for SocowVec<T, N> {
    fn from(values: [T; S]) -> Self {
        let mut v = Self::new();
        for x in values {
            v.push(x);
        }
        v
    }
}

impl<T: Clone, const N: usize> From<Vec<T>> for SocowVec<T, N> {
    fn from(values: Vec<T>) -> Self {
        let mut v = Self::new();
        for x in values {
            v.push(x);
        }
        v
    }
}

impl<T: Debug, const N: usize> Debug for SocowVec<T, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<T: PartialEq, const N: usize> PartialEq for SocowVec<T, N> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Eq, const N: usize> Eq for SocowVec<T, N> {}

impl<T: PartialOrd, const N: usize> PartialOrd for SocowVec<T, N> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.as_slice().partial_cmp(other.as_slice())
    }
}

impl<T: Ord, const N: usize> Ord for SocowVec<T, N> {
    #[inline]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

impl<T: std::hash::Hash, const N: usize> std::hash::Hash for SocowVec<T, N> {
    #[inline]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

impl<T: PartialEq, const N: usize> PartialEq<[T]> for SocowVec<T, N> {
    #[inline]
    fn eq(&self, other: &[T]) -> bool {
        self.as_slice() == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;

    // --- instance-tracking test element, ported in spirit from the upstream
    // Catch2 harness's `Element`/`NoNewInstancesGuard`. Addresses are not a
    // stable identity across a Rust move (unlike a C++ object pinned in its
    // own storage), so instances are tracked by an id carried in the value
    // rather than by `&Element as *const _`.

    thread_local! {
        static NEXT_ID: Cell<u64> = const { Cell::new(0) };
        static LIVE: RefCell<HashSet<u64>> = RefCell::new(HashSet::new());
    }

    #[derive(Debug)]
    struct Element {
        value: i64,
        id: u64,
    }

    impl Element {
        fn register() -> u64 {
            let id = NEXT_ID.with(|n| {
                let id = n.get();
                n.set(id + 1);
                id
            });
            LIVE.with(|l| assert!(l.borrow_mut().insert(id), "duplicate element id {id}"));
            id
        }
    }

    impl From<i64> for Element {
        fn from(value: i64) -> Self {
            Element { value, id: Element::register() }
        }
    }

    impl Clone for Element {
        fn clone(&self) -> Self {
            Element { value: self.value, id: Element::register() }
        }
    }

    impl Drop for Element {
        fn drop(&mut self) {
            LIVE.with(|l| assert!(l.borrow_mut().remove(&self.id), "double drop of element id {}", self.id));
        }
    }

    impl PartialEq for Element {
        fn eq(&self, other: &Self) -> bool {
            self.value == other.value
        }
    }

    impl PartialEq<i64> for Element {
        fn eq(&self, other: &i64) -> bool {
            self.value == *other
        }
    }

    struct NoNewInstancesGuard {
        baseline: HashSet<u64>,
    }

    impl NoNewInstancesGuard {
        fn new() -> Self {
            Self { baseline: LIVE.with(|l| l.borrow().clone()) }
        }

        fn check_no_new_instances(&self) -> bool {
            LIVE.with(|l| *l.borrow() == self.baseline)
        }
    }

    impl Drop for NoNewInstancesGuard {
        fn drop(&mut self) {
            if !std::thread::panicking() {
                assert!(self.check_no_new_instances(), "instances leaked or created outside guard");
            }
        }
    }

    struct Snapshot {
        capacity: usize,
        data: *const Element,
        elements: Vec<Element>,
    }

    impl Snapshot {
        fn new<const N: usize>(v: &SocowVec<Element, N>) -> Self {
            Self { capacity: v.capacity(), data: v.as_ptr(), elements: v.as_slice().to_vec() }
        }

        fn verify<const N: usize>(&self, v: &SocowVec<Element, N>) {
            assert_eq!(v.len(), self.elements.len());
            for (i, e) in self.elements.iter().enumerate() {
                assert_eq!(&v[i], e);
            }
        }

        fn full_verify<const N: usize>(&self, v: &SocowVec<Element, N>) {
            assert_eq!(v.capacity(), self.capacity);
            assert!(std::ptr::eq(v.as_ptr(), self.data));
            self.verify(v);
        }
    }

    fn is_static_storage<const N: usize>(v: &SocowVec<Element, N>) -> bool {
        if v.capacity() != N {
            return false;
        }
        let base = v as *const _ as usize;
        let end = base + std::mem::size_of::<SocowVec<Element, N>>();
        let data = v.as_ptr() as usize;
        base <= data && data < end
    }

    fn mass_push_back<const N: usize>(v: &mut SocowVec<Element, N>, count: usize) {
        for i in 0..count {
            v.push(Element::from((2 * i + 1) as i64));
        }
    }

    #[test]
    fn default_constructor_is_empty_small_storage() {
        let _guard = NoNewInstancesGuard::new();
        let a: SocowVec<Element, 3> = SocowVec::new();
        assert!(a.is_empty());
        assert_eq!(a.len(), 0);
        assert!(is_static_storage(&a));
    }

    #[test]
    fn push_back_grows_past_small_capacity() {
        let _guard = NoNewInstancesGuard::new();
        const N: usize = 50;
        let mut a: SocowVec<Element, 3> = SocowVec::new();
        mass_push_back(&mut a, N);
        assert_eq!(a.len(), N);
        assert!(a.capacity() >= N);
        for i in 0..N {
            assert_eq!(a[i], (2 * i + 1) as i64);
        }
    }

    #[test]
    fn push_back_from_self_survives_reallocation() {
        let _guard = NoNewInstancesGuard::new();
        const N: usize = 50;
        let mut a: SocowVec<Element, 3> = SocowVec::new();
        a.push(Element::from(42));
        for i in 1..N {
            let v = a[i - 1].clone();
            a.push(v);
        }
        assert_eq!(a.len(), N);
        assert!(a.capacity() >= N);
        for i in 0..N {
            assert_eq!(a[i], 42);
        }
    }

    #[test]
    fn subscript_mutation() {
        let _guard = NoNewInstancesGuard::new();
        const N: usize = 50;
        const K: usize = 10;
        let mut a: SocowVec<Element, 3> = SocowVec::new();
        mass_push_back(&mut a, N);
        for i in 0..K {
            a[i] = Element::from((4 * i + 1) as i64);
        }
        for i in 0..K {
            assert_eq!(a[i], (4 * i + 1) as i64);
        }
        for i in K..N {
            assert_eq!(a[i], (2 * i + 1) as i64);
        }
    }

    #[test]
    fn access_data_pointer() {
        let _guard = NoNewInstancesGuard::new();
        const N: usize = 50;
        let mut a: SocowVec<Element, 3> = SocowVec::new();
        mass_push_back(&mut a, N);
        let data = a.as_mut_ptr();
        assert!(std::ptr::eq(data, &a[0]));
        for i in 0..N {
            assert_eq!(unsafe { &*data.add(i) }, &a[i]);
        }
    }

    #[test]
    fn front_and_back() {
        let _guard = NoNewInstancesGuard::new();
        const N: usize = 50;
        let mut a: SocowVec<Element, 3> = SocowVec::new();
        mass_push_back(&mut a, N);
        assert_eq!(*a.first().unwrap(), 1);
        assert_eq!(*a.last().unwrap(), (2 * N - 1) as i64);
    }

    #[test]
    fn reserve_keeps_capacity_and_data_stable() {
        let _guard = NoNewInstancesGuard::new();
        const N: usize = 10;
        const M: usize = 50;
        let mut a: SocowVec<Element, 3> = SocowVec::new();
        mass_push_back(&mut a, N);
        a.reserve(M);
        let snap = Snapshot::new(&a);
        for i in N..M {
            a.push(Element::from((2 * i + 1) as i64));
        }
        assert_eq!(a.len(), M);
        assert!(std::ptr::eq(a.as_ptr(), snap.data));
        assert_eq!(a.capacity(), snap.capacity);
    }

    #[test]
    fn shrink_capacity_back_to_small() {
        let _guard = NoNewInstancesGuard::new();
        const N: usize = 50;
        const M: usize = 2;
        let mut a: SocowVec<Element, 3> = SocowVec::new();
        a.reserve(N);
        mass_push_back(&mut a, M);
        assert_eq!(a.len(), M);
        assert_eq!(a.capacity(), N);
        let snap = Snapshot::new(&a);
        a.shrink_to_fit();
        assert_eq!(a.capacity(), 3);
        snap.verify(&a);
        assert!(is_static_storage(&a));
    }

    #[test]
    fn shrink_capacity_stays_large() {
        let _guard = NoNewInstancesGuard::new();
        const N: usize = 50;
        const M: usize = 10;
        let mut a: SocowVec<Element, 3> = SocowVec::new();
        a.reserve(N);
        mass_push_back(&mut a, M);
        assert_eq!(a.len(), M);
        assert_eq!(a.capacity(), N);
        let snap = Snapshot::new(&a);
        a.shrink_to_fit();
        assert_eq!(a.capacity(), M);
        snap.verify(&a);
    }

    #[test]
    fn clear_preserves_capacity_and_data_when_exclusive() {
        let _guard = NoNewInstancesGuard::new();
        const N: usize = 50;
        {
            let mut a: SocowVec<Element, 3> = SocowVec::new();
            mass_push_back(&mut a, N);
            let snap = Snapshot::new(&a);
            a.clear();
            assert!(a.is_empty());
            assert_eq!(a.capacity(), snap.capacity);
            assert!(std::ptr::eq(a.as_ptr(), snap.data));
        }
    }

    #[test]
    fn clear_on_shared_buffer_detaches_to_empty_small() {
        let _guard = NoNewInstancesGuard::new();
        const N: usize = 50;
        let mut a: SocowVec<Element, 3> = SocowVec::new();
        mass_push_back(&mut a, N);
        let b = a.clone();
        a.clear();
        assert!(a.is_empty());
        assert!(is_static_storage(&a));
        assert_eq!(b.len(), N);
    }

    #[test]
    fn swap_mixed_modes() {
        let _guard = NoNewInstancesGuard::new();
        const N: usize = 4;
        const M: usize = 11;
        let mut a: SocowVec<Element, 3> = SocowVec::new();
        for i in 1..=N {
            a.push(Element::from(i as i64));
        }
        let mut b: SocowVec<Element, 3> = SocowVec::new();
        for i in N..=M {
            b.push(Element::from(i as i64));
        }
        let snap_a = Snapshot::new(&a);
        let snap_b = Snapshot::new(&b);
        a.swap(&mut b);
        snap_a.full_verify(&b);
        snap_b.full_verify(&a);
    }

    #[test]
    fn copy_constructor_and_cow_isolation() {
        let _guard = NoNewInstancesGuard::new();
        const N: usize = 50;
        let mut a: SocowVec<Element, 3> = SocowVec::new();
        mass_push_back(&mut a, N);
        let snap = Snapshot::new(&a);
        let b = a.clone();
        let c = a.clone();
        snap.full_verify(&b);
        snap.full_verify(&c);

        let mut b = b;
        b[0] = Element::from(42);

        assert_eq!(a[0], 1);
        assert_eq!(b[0], 42);
        assert_eq!(c[0], 1);
        assert!(std::ptr::eq(a.as_ptr(), c.as_ptr()));
        assert!(!std::ptr::eq(a.as_ptr(), b.as_ptr()));
    }

    #[test]
    fn clone_from_self_assignment_is_identity() {
        let _guard = NoNewInstancesGuard::new();
        const N: usize = 50;
        let mut a: SocowVec<Element, 3> = SocowVec::new();
        mass_push_back(&mut a, N);
        let snap = Snapshot::new(&a);
        let cloned = a.clone();
        a = cloned;
        snap.verify(&a);
    }

    #[test]
    fn pop_back_drains_in_order() {
        let _guard = NoNewInstancesGuard::new();
        const N: usize = 50;
        let mut a: SocowVec<Element, 3> = SocowVec::new();
        mass_push_back(&mut a, N);
        let snap = Snapshot::new(&a);
        for i in (0..N).rev() {
            assert_eq!(*a.last().unwrap(), (2 * i + 1) as i64);
            assert_eq!(a.len(), i + 1);
            a.pop();
        }
        assert!(a.is_empty());
        assert_eq!(a.capacity(), snap.capacity);
        assert!(std::ptr::eq(a.as_ptr(), snap.data));
    }

    #[test]
    fn insert_in_middle() {
        let _guard = NoNewInstancesGuard::new();
        const N: usize = 50;
        const K: usize = 10;
        let mut a: SocowVec<Element, 3> = SocowVec::new();
        mass_push_back(&mut a, N);
        a.insert(K, Element::from(42));
        assert_eq!(a.len(), N + 1);
        assert!(a.capacity() >= N + 1);
        for i in 0..K {
            assert_eq!(a[i], (2 * i + 1) as i64);
        }
        assert_eq!(a[K], 42);
        for i in K..N {
            assert_eq!(a[i + 1], (2 * i + 1) as i64);
        }
    }

    #[test]
    fn erase_single() {
        let _guard = NoNewInstancesGuard::new();
        const N: usize = 50;
        const POS: usize = 10;
        let mut a: SocowVec<Element, 3> = SocowVec::new();
        mass_push_back(&mut a, N);
        let snap = Snapshot::new(&a);
        a.remove(POS);
        assert_eq!(a.len(), N - 1);
        assert_eq!(a.capacity(), snap.capacity);
        assert!(std::ptr::eq(a.as_ptr(), snap.data));
        for i in 0..POS {
            assert_eq!(a[i], (2 * i + 1) as i64);
        }
        for i in POS..a.len() {
            assert_eq!(a[i], (2 * (i + 1) + 1) as i64);
        }
    }

    #[test]
    fn erase_range() {
        let _guard = NoNewInstancesGuard::new();
        const N: usize = 50;
        const K: usize = 10;
        let mut a: SocowVec<Element, 3> = SocowVec::new();
        mass_push_back(&mut a, N);
        let snap = Snapshot::new(&a);
        a.erase(K, N - K);
        assert_eq!(a.len(), 2 * K);
        assert_eq!(a.capacity(), snap.capacity);
        assert!(std::ptr::eq(a.as_ptr(), snap.data));
        for i in 0..K {
            assert_eq!(a[i], (2 * i + 1) as i64);
        }
        for i in K..a.len() {
            assert_eq!(a[i], (2 * (i + (N - 2 * K)) + 1) as i64);
        }
    }

    #[test]
    fn iteration_mutable_then_const() {
        let _guard = NoNewInstancesGuard::new();
        const N: usize = 50;
        let mut a: SocowVec<Element, 3> = SocowVec::new();
        for _ in 0..N {
            a.push(Element::from(42));
        }
        for (i, e) in a.iter_mut().enumerate() {
            *e = Element::from((i * 2 + 1) as i64);
        }
        for (i, e) in a.iter().enumerate() {
            assert_eq!(*e, (i * 2 + 1) as i64);
        }
    }

    #[test]
    fn small_object_optimization_threshold() {
        let _guard = NoNewInstancesGuard::new();
        let mut a: SocowVec<Element, 3> = SocowVec::new();
        a.push(Element::from(42));
        a.push(Element::from(43));
        a.push(Element::from(44));
        assert!(is_static_storage(&a));
        a.push(Element::from(45));
        assert!(!is_static_storage(&a));
    }

    #[test]
    fn drain_range_returns_removed_elements() {
        let _guard = NoNewInstancesGuard::new();
        const N: usize = 20;
        let mut a: SocowVec<Element, 3> = SocowVec::new();
        mass_push_back(&mut a, N);
        let removed = a.drain_range(5..15);
        assert_eq!(removed.len(), 10);
        for (i, e) in removed.iter().enumerate() {
            assert_eq!(*e, (2 * (i + 5) + 1) as i64);
        }
        assert_eq!(a.len(), N - 10);
    }

    #[test]
    fn try_reserve_reports_overflow_instead_of_aborting() {
        let mut a: SocowVec<Element, 3> = SocowVec::new();
        let result = a.try_reserve(usize::MAX / 2);
        assert!(result.is_err());
        assert!(a.is_empty());
        assert!(is_static_storage(&a));
    }

    #[test]
    fn into_iterator_consumes_in_order() {
        let _guard = NoNewInstancesGuard::new();
        const N: usize = 20;
        let mut a: SocowVec<Element, 3> = SocowVec::new();
        mass_push_back(&mut a, N);
        let collected: Vec<Element> = a.into_iter().collect();
        for (i, e) in collected.into_iter().enumerate() {
            assert_eq!(e, (2 * i + 1) as i64);
        }
    }

    #[test]
    fn from_iterator_round_trips() {
        let _guard = NoNewInstancesGuard::new();
        let v: SocowVec<Element, 3> = (0..20i64).map(Element::from).collect();
        assert_eq!(v.len(), 20);
        for i in 0..20 {
            assert_eq!(v[i], i as i64);
        }
    }

    #[test]
    fn randomized_sequence_preserves_invariants() {
        use rand::Rng;
        let _guard = NoNewInstancesGuard::new();
        let mut rng = rand::thread_rng();
        let mut a: SocowVec<Element, 3> = SocowVec::new();
        let mut model: Vec<i64> = Vec::new();
        for _ in 0..2000 {
            match rng.gen_range(0..6) {
                0 => {
                    let v = rng.gen_range(-1000..1000);
                    a.push(Element::from(v));
                    model.push(v);
                }
                1 => {
                    let popped = a.pop();
                    assert_eq!(popped.is_some(), model.pop().is_some());
                }
                2 if !model.is_empty() => {
                    let idx = rng.gen_range(0..model.len());
                    let v = rng.gen_range(-1000..1000);
                    a.insert(idx, Element::from(v));
                    model.insert(idx, v);
                }
                3 if !model.is_empty() => {
                    let idx = rng.gen_range(0..model.len());
                    let expected = model.remove(idx);
                    assert_eq!(a.remove(idx), expected);
                }
                4 => {
                    let b = a.clone();
                    assert_eq!(b.len(), model.len());
                }
                _ => {
                    a.shrink_to_fit();
                }
            }
            assert_eq!(a.len(), model.len());
            assert!(a.len() <= a.capacity());
            for (i, v) in model.iter().enumerate() {
                assert_eq!(a[i], *v);
            }
        }
    }
}
