use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicI32, AtomicU16, AtomicU8, Ordering};

use crate::errors::LogBufferError;

/// Required alignment of the base address of any wrapped region.
pub const ALIGNMENT: usize = 8;

const SIZE_OF_I32: usize = 4;
const SIZE_OF_U16: usize = 2;

/// Ordered and atomic access to integer fields of a fixed-length byte region.
///
/// All methods take `&self`: the region is shared between every writer thread (and possibly other
/// processes), so each access mode is chosen by the caller through the method it calls rather than
/// through Rust's borrow rules. Indexes are byte offsets from the start of the region and are
/// bounds checked; integer fields must sit on their natural alignment.
pub trait AtomicBuffer {
    fn capacity(&self) -> usize;

    /// Plain read with no ordering guarantee.
    fn get_i32(&self, index: usize) -> i32;

    /// Read with acquire semantics.
    fn get_i32_volatile(&self, index: usize) -> i32;

    /// Plain write with no ordering guarantee.
    fn put_i32(&self, index: usize, value: i32);

    /// Write with release semantics: every prior write is visible before this one.
    fn put_i32_ordered(&self, index: usize, value: i32);

    /// Atomically adds `delta`, returning the previous value. Wraps on overflow.
    fn get_and_add_i32(&self, index: usize, delta: i32) -> i32;

    fn compare_and_set_i32(&self, index: usize, expected: i32, update: i32) -> bool;

    fn get_u8(&self, index: usize) -> u8;

    fn put_u8(&self, index: usize, value: u8);

    fn get_u16(&self, index: usize) -> u16;

    fn put_u16(&self, index: usize, value: u16);

    fn get_bytes(&self, index: usize, dst: &mut [u8]);

    fn put_bytes(&self, index: usize, src: &[u8]);
}

/// An [`AtomicBuffer`] over memory it does not own.
///
/// The memory is either an exclusively borrowed slice or a raw mapping (see
/// [`crate::mapped::MappedLogBuffers`]). Once wrapped, it is only touched through atomics and byte
/// copies, which is what makes handing `&UnsafeBuffer` to many threads sound.
pub struct UnsafeBuffer<'a> {
    ptr: *mut u8,
    capacity: usize,
    _marker: PhantomData<&'a UnsafeCell<[u8]>>,
}

unsafe impl Send for UnsafeBuffer<'_> {}
unsafe impl Sync for UnsafeBuffer<'_> {}

impl<'a> UnsafeBuffer<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Result<UnsafeBuffer<'a>, LogBufferError> {
        unsafe { UnsafeBuffer::from_raw_parts(bytes.as_mut_ptr(), bytes.len()) }
    }

    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `capacity` bytes for the whole of `'a`, and any
    /// other party touching that memory while it is wrapped must do so atomically or through byte
    /// copies of disjoint ranges.
    pub unsafe fn from_raw_parts(
        ptr: *mut u8,
        capacity: usize,
    ) -> Result<UnsafeBuffer<'a>, LogBufferError> {
        if ptr.is_null() || (ptr as usize) % ALIGNMENT != 0 {
            return Err(LogBufferError::IllegalState(format!(
                "buffer address {:p} is not aligned to {} bytes",
                ptr, ALIGNMENT
            )));
        }
        Ok(UnsafeBuffer {
            ptr,
            capacity,
            _marker: PhantomData,
        })
    }

    /// A view of `length` bytes starting at `offset`, sharing the same memory.
    pub fn view(&self, offset: usize, length: usize) -> Result<UnsafeBuffer<'a>, LogBufferError> {
        match offset.checked_add(length) {
            Some(end) if end <= self.capacity => {}
            _ => {
                return Err(LogBufferError::IllegalArgument(format!(
                    "view offset={} length={} exceeds capacity={}",
                    offset, length, self.capacity
                )))
            }
        }
        unsafe { UnsafeBuffer::from_raw_parts(self.ptr.add(offset), length) }
    }

    #[inline]
    fn bounds_check(&self, index: usize, length: usize) {
        let in_bounds = matches!(index.checked_add(length), Some(end) if end <= self.capacity);
        assert!(
            in_bounds,
            "index={} length={} out of bounds for capacity={}",
            index, length, self.capacity
        );
    }

    #[inline]
    fn field_check(&self, index: usize, width: usize) {
        self.bounds_check(index, width);
        assert!(
            index % width == 0,
            "index={} is not aligned to {} bytes",
            index, width
        );
    }

    #[inline]
    fn atomic_i32(&self, index: usize) -> &AtomicI32 {
        self.field_check(index, SIZE_OF_I32);
        unsafe { AtomicI32::from_ptr(self.ptr.add(index) as *mut i32) }
    }
}

impl AtomicBuffer for UnsafeBuffer<'_> {
    #[inline]
    fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    fn get_i32(&self, index: usize) -> i32 {
        self.atomic_i32(index).load(Ordering::Relaxed)
    }

    #[inline]
    fn get_i32_volatile(&self, index: usize) -> i32 {
        self.atomic_i32(index).load(Ordering::Acquire)
    }

    #[inline]
    fn put_i32(&self, index: usize, value: i32) {
        self.atomic_i32(index).store(value, Ordering::Relaxed)
    }

    #[inline]
    fn put_i32_ordered(&self, index: usize, value: i32) {
        self.atomic_i32(index).store(value, Ordering::Release)
    }

    #[inline]
    fn get_and_add_i32(&self, index: usize, delta: i32) -> i32 {
        self.atomic_i32(index).fetch_add(delta, Ordering::AcqRel)
    }

    #[inline]
    fn compare_and_set_i32(&self, index: usize, expected: i32, update: i32) -> bool {
        self.atomic_i32(index)
            .compare_exchange(expected, update, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    fn get_u8(&self, index: usize) -> u8 {
        self.bounds_check(index, 1);
        unsafe { AtomicU8::from_ptr(self.ptr.add(index)) }.load(Ordering::Relaxed)
    }

    #[inline]
    fn put_u8(&self, index: usize, value: u8) {
        self.bounds_check(index, 1);
        unsafe { AtomicU8::from_ptr(self.ptr.add(index)) }.store(value, Ordering::Relaxed)
    }

    #[inline]
    fn get_u16(&self, index: usize) -> u16 {
        self.field_check(index, SIZE_OF_U16);
        unsafe { AtomicU16::from_ptr(self.ptr.add(index) as *mut u16) }.load(Ordering::Relaxed)
    }

    #[inline]
    fn put_u16(&self, index: usize, value: u16) {
        self.field_check(index, SIZE_OF_U16);
        unsafe { AtomicU16::from_ptr(self.ptr.add(index) as *mut u16) }
            .store(value, Ordering::Relaxed)
    }

    #[inline]
    fn get_bytes(&self, index: usize, dst: &mut [u8]) {
        self.bounds_check(index, dst.len());
        unsafe {
            ptr::copy_nonoverlapping(self.ptr.add(index), dst.as_mut_ptr(), dst.len());
        }
    }

    #[inline]
    fn put_bytes(&self, index: usize, src: &[u8]) {
        self.bounds_check(index, src.len());
        unsafe {
            ptr::copy_nonoverlapping(src.as_ptr(), self.ptr.add(index), src.len());
        }
    }
}

impl fmt::Debug for UnsafeBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsafeBuffer")
            .field("address", &self.ptr)
            .field("capacity", &self.capacity)
            .finish()
    }
}
