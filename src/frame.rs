//! Per-thread call frames.
//!
//! A frame is made of three regions carved from a thread-local [`Bump`]:
//!
//! ```text
//! [ argument pointers (argc words) ]  [ return slot (16 words) ]  [ argument data ... ]
//! ```
//!
//! Bump allocations never move, so a pointer recorded for an argument stays
//! valid however much the frame (or a frame nested inside a callback) grows
//! afterwards. The arena is reset when the outermost frame of the thread is
//! released; until then frames simply stack.

use std::cell::{Cell, RefCell};

use bumpalo::Bump;
use gdx_sys::{ConstTypePtr, ObjectPtr, TypePtr};

use crate::meta::PtrCodec;

/// Bytes each thread's arena starts with.
pub const ARENA_BYTES: usize = 32 * 1024;

/// Bytes reserved for the return value: the widest kind is `Projection`
/// in double precision.
pub const RETURN_SLOT_BYTES: usize = 128;

const WORD: usize = std::mem::size_of::<u64>();
const RETURN_WORDS: usize = RETURN_SLOT_BYTES / WORD;

thread_local! {
    static ARENA: RefCell<Bump> = RefCell::new(Bump::with_capacity(ARENA_BYTES));
    static LIVE_FRAMES: Cell<usize> = const { Cell::new(0) };
}

/// Words needed to hold `bytes`, at least one.
const fn words_for(bytes: usize) -> usize {
    if bytes == 0 { 1 } else { bytes.div_ceil(WORD) }
}

/// A call frame. See the module docs for the layout.
pub struct Frame {
    args: *mut u64,
    ret: *mut u64,
    argc: usize,
    pushed: usize,
    data: *mut u64,
    data_words: usize,
    /// Data offsets recorded by [`Frame::push_offset`], `offset + 1` per
    /// argument, zero where the argument pointer is already absolute.
    offsets: *mut u64,
    resolved: bool,
    in_arena: bool,
    /// Chunks owned by the frame when the thread arena is gone (thread
    /// teardown).
    detached: Vec<Box<[u64]>>,
}

impl Frame {
    /// Acquire a frame for `argc` arguments. Never fails: the arena grows
    /// by new chunks instead of running out.
    pub fn acquire(argc: usize) -> Frame {
        let in_arena = LIVE_FRAMES
            .try_with(|live| live.set(live.get() + 1))
            .is_ok();
        let mut frame = Frame {
            args: std::ptr::null_mut(),
            ret: std::ptr::null_mut(),
            argc,
            pushed: 0,
            data: std::ptr::null_mut(),
            data_words: 0,
            offsets: std::ptr::null_mut(),
            resolved: false,
            in_arena,
            detached: Vec::new(),
        };
        frame.args = frame.alloc_words(argc.max(1));
        frame.ret = frame.alloc_words(RETURN_WORDS);
        frame
    }

    pub fn arg_count(&self) -> usize {
        self.argc
    }

    /// Arguments recorded so far.
    pub fn pushed(&self) -> usize {
        self.pushed
    }

    /// Words in the data area written through [`Frame::write_bytes`].
    pub fn data_words(&self) -> usize {
        self.data_words
    }

    /// Zeroed words that stay put until the frame is released.
    fn alloc_words(&mut self, words: usize) -> *mut u64 {
        if self.in_arena {
            let allocated = ARENA.try_with(|arena| {
                let arena = arena.borrow();
                arena.alloc_slice_fill_copy(words, 0u64).as_mut_ptr()
            });
            if let Ok(ptr) = allocated {
                return ptr;
            }
        }
        let mut chunk = vec![0u64; words].into_boxed_slice();
        let ptr = chunk.as_mut_ptr();
        self.detached.push(chunk);
        ptr
    }

    fn record(&mut self, slot: *const u64) {
        debug_assert!(!self.resolved, "argument recorded after the frame was resolved");
        if self.pushed < self.argc {
            unsafe { *self.args.add(self.pushed) = slot as usize as u64 };
            self.pushed += 1;
        } else {
            debug_assert!(false, "frame declared {} arguments", self.argc);
        }
    }

    /// Copy `bytes` into the data area at byte `offset`, growing the area
    /// as needed.
    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) {
        let needed = words_for(offset + bytes.len());
        if needed > self.data_words {
            debug_assert!(!self.resolved, "data area grown after the frame was resolved");
            let words = needed.max(self.data_words * 2);
            let grown = self.alloc_words(words);
            if !self.data.is_null() {
                unsafe { std::ptr::copy_nonoverlapping(self.data, grown, self.data_words) };
            }
            self.data = grown;
            self.data_words = words;
        }
        unsafe {
            let dst = self.data.cast::<u8>().add(offset);
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
        }
    }

    /// Write a plain value into the data area at byte `offset`.
    pub fn write_at<T: Copy>(&mut self, offset: usize, value: T) {
        let bytes = unsafe {
            std::slice::from_raw_parts((&value as *const T).cast::<u8>(), std::mem::size_of::<T>())
        };
        self.write_bytes(offset, bytes);
    }

    /// Record the data at byte `offset` (word aligned) as the next argument.
    pub fn push_offset(&mut self, offset: usize) {
        debug_assert_eq!(offset % WORD, 0, "argument offsets are word aligned");
        if self.offsets.is_null() {
            self.offsets = self.alloc_words(self.argc.max(1));
        }
        if self.pushed < self.argc {
            unsafe { *self.offsets.add(self.pushed) = offset as u64 + 1 };
        }
        self.record(std::ptr::null());
    }

    /// Write `value` in typed-storage form and record it as the next
    /// argument. The frame holds a borrowed copy; `value` keeps ownership.
    pub fn push<T: PtrCodec>(&mut self, value: &T) {
        let slot = self.alloc_words(words_for(T::SIZE));
        unsafe { value.write_arg(slot.cast()) };
        self.record(slot);
    }

    /// Record an object argument: the slot holds the object pointer.
    pub fn push_object(&mut self, object: ObjectPtr) {
        let slot = self.alloc_words(1);
        unsafe { *slot.cast::<ObjectPtr>() = object };
        self.record(slot);
    }

    /// Record an argument that lives outside the frame, such as a variant
    /// owned by the caller.
    pub fn push_ref(&mut self, value: ConstTypePtr) {
        self.record(value.cast());
    }

    /// Address of the return slot, zeroed at acquisition.
    pub fn return_slot(&mut self, size: usize) -> TypePtr {
        debug_assert!(size <= RETURN_SLOT_BYTES, "return value of {size} bytes does not fit");
        self.ret.cast()
    }

    /// The argument pointer array, in push order.
    ///
    /// After this call the data area must not grow.
    pub fn as_pointer_array(&mut self) -> *const ConstTypePtr {
        if !self.resolved && !self.offsets.is_null() {
            for index in 0..self.pushed {
                let offset = unsafe { *self.offsets.add(index) };
                if offset != 0 {
                    let ptr = unsafe { self.data.cast::<u8>().add(offset as usize - 1) };
                    unsafe { *self.args.add(index) = ptr as usize as u64 };
                }
            }
        }
        self.resolved = true;
        self.args.cast_const().cast()
    }

    /// Release explicitly; same as dropping.
    pub fn release(self) {}
}

impl Drop for Frame {
    fn drop(&mut self) {
        if !self.in_arena {
            return;
        }
        let outermost = LIVE_FRAMES
            .try_with(|live| {
                let remaining = live.get().saturating_sub(1);
                live.set(remaining);
                remaining == 0
            })
            .unwrap_or(false);
        if outermost {
            let _ = ARENA.try_with(|arena| {
                if let Ok(mut arena) = arena.try_borrow_mut() {
                    arena.reset();
                }
            });
        }
    }
}

/// Frames currently alive on this thread.
pub fn live_frames() -> usize {
    LIVE_FRAMES.try_with(Cell::get).unwrap_or(0)
}

/// Bytes the thread arena has reserved from the allocator.
pub fn arena_capacity() -> usize {
    ARENA.try_with(|arena| arena.borrow().allocated_bytes()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn arg(frame: &mut Frame, index: usize) -> *const u64 {
        unsafe { *frame.as_pointer_array().add(index) }.cast()
    }

    #[test]
    fn frames_nest_and_release() {
        let before = live_frames();
        {
            let outer = Frame::acquire(2);
            assert_eq!(live_frames(), before + 1);
            assert!(arena_capacity() > 0);
            {
                let _inner = Frame::acquire(1);
                assert_eq!(live_frames(), before + 2);
            }
            assert_eq!(live_frames(), before + 1);
            outer.release();
        }
        assert_eq!(live_frames(), before);
    }

    #[test]
    fn pushed_values_widen_to_engine_storage() {
        let mut frame = Frame::acquire(3);
        frame.push(&7i32);
        frame.push(&true);
        frame.push(&1.5f32);
        unsafe {
            assert_eq!(*arg(&mut frame, 0).cast::<i64>(), 7);
            assert_eq!(*arg(&mut frame, 1).cast::<u8>(), 1);
            assert_eq!(*arg(&mut frame, 2).cast::<f64>(), 1.5);
        }
    }

    #[test]
    fn return_slot_starts_zeroed() {
        {
            let mut dirty = Frame::acquire(0);
            let slot = dirty.return_slot(RETURN_SLOT_BYTES).cast::<u8>();
            unsafe { std::ptr::write_bytes(slot, 0xAB, RETURN_SLOT_BYTES) };
        }
        let mut frame = Frame::acquire(0);
        let slot = frame.return_slot(RETURN_SLOT_BYTES).cast::<u8>();
        let bytes = unsafe { std::slice::from_raw_parts(slot, RETURN_SLOT_BYTES) };
        assert!(bytes.iter().all(|b| *b == 0));
    }

    #[test]
    fn oversized_frames_are_not_truncated() {
        let count = ARENA_BYTES / WORD;
        let mut frame = Frame::acquire(count);
        for value in 0..count as i64 {
            frame.push(&value);
        }
        assert_eq!(frame.pushed(), count);
        for index in [0, count / 2, count - 1] {
            assert_eq!(unsafe { *arg(&mut frame, index).cast::<i64>() }, index as i64);
        }
    }

    #[test]
    fn nested_growth_keeps_outer_arguments_in_place() {
        let mut outer = Frame::acquire(1);
        outer.push(&41i64);
        let first = unsafe { arg(&mut outer, 0) };
        {
            let mut inner = Frame::acquire(2);
            inner.write_bytes(0, &vec![1u8; ARENA_BYTES * 2]);
            inner.push_offset(0);
            inner.push(&1i64);
            assert_eq!(inner.data_words(), ARENA_BYTES * 2 / WORD);
        }
        assert_eq!(unsafe { arg(&mut outer, 0) }, first);
        assert_eq!(unsafe { *first.cast::<i64>() }, 41);
    }

    #[test]
    fn raw_writes_and_external_arguments() {
        let external = 99u64;
        let mut frame = Frame::acquire(3);
        frame.write_at(0, 0x1122_3344u32);
        frame.push_offset(0);
        frame.write_at(4, 0x5566_7788u32);
        frame.write_at(64, 7u64);
        frame.push_offset(64);
        frame.push_ref((&external as *const u64).cast());
        unsafe {
            assert_eq!(*arg(&mut frame, 0), 0x5566_7788_1122_3344);
            assert_eq!(*arg(&mut frame, 1), 7);
            assert_eq!(arg(&mut frame, 2), &external as *const u64);
        }
    }
}
