//! Fixed-size sample buffer storage.
//!
//! A waveform controller owns one or two [`SampleBuffer`]s for its whole
//! lifetime. The buffers are allocated once at construction, never resized,
//! and are the only resource shared with the timer domain: the controller
//! hands the timer subsystem a non-owning [`BufferLease`] for the duration of
//! a run, and identifies its task afterwards by the resolved [`BufferId`].
//!
//! ## Identity
//!
//! [`BufferId`] is the storage base address, captured once at construction.
//! All "which buffer is the task using" decisions reduce to comparing ids
//! from a single [`TaskSnapshot`](crate::clock::TaskSnapshot) against the
//! primary buffer's id — there is no indirection to chase at query time.
//!
//! ## Two-domain access
//!
//! While a run is active the timer domain reads/writes sample bytes through
//! the lease, and the interpreter domain refills the buffer the task is *not*
//! touching (the double-buffering handoff). Storage therefore lives behind an
//! `UnsafeCell`; the lease accessors are `unsafe` with the contract spelled
//! out on [`BufferLease`].

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

use alloc::vec::Vec;

use crate::error::Error;

/// Resolved identity of a sample buffer: its storage base address.
///
/// Stable for the buffer's lifetime (the backing storage is never resized or
/// reallocated, even when the owning controller moves). Comparison assumes
/// the timer subsystem never re-binds a retired buffer's address to a
/// different live task while the owning controller runs.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BufferId(*const u8);

/// Names the buffers of a pair: `Primary` is the first/only buffer (the
/// handle used to create, query, and cancel the timer task), `Secondary` is
/// the wraparound buffer of a double-buffered controller.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferSlot {
    Primary,
    Secondary,
}

impl BufferSlot {
    /// 0 for `Primary`, 1 for `Secondary`.
    pub fn index(self) -> u8 {
        match self {
            BufferSlot::Primary => 0,
            BufferSlot::Secondary => 1,
        }
    }

    pub(crate) fn from_index(index: u8) -> Self {
        if index == 0 {
            BufferSlot::Primary
        } else {
            BufferSlot::Secondary
        }
    }
}

/// One fixed-size byte buffer.
///
/// `Deref`s to `[u8]` for interpreter-domain access. The caller must not
/// assume the contents are stable while the owning controller is running;
/// the only bytes safe to touch during a run are those of the buffer most
/// recently reported free by a `buffer` notification.
pub struct SampleBuffer {
    storage: UnsafeCell<Vec<u8>>,
}

impl SampleBuffer {
    /// Allocate a buffer of exactly `samples` bytes, zero-filled.
    ///
    /// Allocation is fallible; on failure nothing is retained.
    pub(crate) fn allocate(samples: usize) -> Result<Self, Error> {
        let mut storage = Vec::new();
        storage
            .try_reserve_exact(samples)
            .map_err(|_| Error::OutOfMemory)?;
        storage.resize(samples, 0);
        Ok(SampleBuffer {
            storage: UnsafeCell::new(storage),
        })
    }

    /// The buffer's resolved identity.
    pub fn id(&self) -> BufferId {
        // SAFETY: shared read of the base pointer; the Vec is never resized
        // after construction, so the address is stable.
        BufferId(unsafe { (*self.storage.get()).as_ptr() })
    }

    /// Number of sample bytes.
    pub fn len(&self) -> usize {
        // SAFETY: shared read of the length, which never changes.
        unsafe { (*self.storage.get()).len() }
    }

    /// `true` if the buffer holds no samples. Construction rejects a zero
    /// sample count, so this is false for every buffer a controller owns.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grant the timer domain a non-owning read/write lease.
    pub(crate) fn lease(&self) -> BufferLease {
        // SAFETY: pointer and length captured once; both are stable.
        let (ptr, len) = unsafe {
            let storage = &mut *self.storage.get();
            (storage.as_mut_ptr(), storage.len())
        };
        BufferLease {
            id: BufferId(ptr as *const u8),
            ptr,
            len,
        }
    }
}

impl Deref for SampleBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: interpreter-domain access. The timer domain only touches
        // the buffer through its lease while a run is active, and the two
        // domains never overlap on the same buffer (the cooperative model
        // plus the double-buffering handoff).
        unsafe { (*self.storage.get()).as_slice() }
    }
}

impl DerefMut for SampleBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: as for Deref, with `&mut self` excluding other
        // interpreter-domain references.
        unsafe { (*self.storage.get()).as_mut_slice() }
    }
}

/// Non-owning read/write lease on a [`SampleBuffer`], granted to the timer
/// subsystem for the duration of an active run.
///
/// The lease never owns the storage. It is valid from task creation until
/// the task is retired by the subsystem or its cancellation is acknowledged;
/// using it outside that window is undefined behavior. The host keeps this
/// window closed by running the kill hook before dropping a runtime that may
/// still have live tasks.
#[derive(Clone, Copy, Debug)]
pub struct BufferLease {
    id: BufferId,
    ptr: *mut u8,
    len: usize,
}

impl BufferLease {
    /// Identity of the leased buffer.
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Number of sample bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read the sample byte at `index`.
    ///
    /// # Safety
    /// The lease must be within its validity window and `index < len()`.
    pub unsafe fn read(&self, index: usize) -> u8 {
        debug_assert!(index < self.len);
        unsafe { self.ptr.add(index).read_volatile() }
    }

    /// Write the sample byte at `index`.
    ///
    /// # Safety
    /// The lease must be within its validity window and `index < len()`.
    pub unsafe fn write(&self, index: usize, value: u8) {
        debug_assert!(index < self.len);
        unsafe { self.ptr.add(index).write_volatile(value) }
    }
}

/// The one or two buffers of a waveform controller, created atomically at
/// construction and immutable in size afterwards.
pub(crate) struct BufferPair {
    primary: SampleBuffer,
    secondary: Option<SampleBuffer>,
}

impl BufferPair {
    /// Allocate `samples` bytes per buffer; one buffer, or two when
    /// `double_buffer` is set.
    ///
    /// `samples == 0` is rejected with `InvalidArgument` before anything is
    /// allocated. If the second allocation fails the first is released and
    /// the construction fails as a whole.
    pub(crate) fn allocate(samples: usize, double_buffer: bool) -> Result<Self, Error> {
        if samples == 0 {
            return Err(Error::InvalidArgument);
        }
        let primary = SampleBuffer::allocate(samples)?;
        let secondary = if double_buffer {
            Some(SampleBuffer::allocate(samples)?)
        } else {
            None
        };
        Ok(BufferPair { primary, secondary })
    }

    pub(crate) fn sample_count(&self) -> usize {
        self.primary.len()
    }

    pub(crate) fn is_double_buffered(&self) -> bool {
        self.secondary.is_some()
    }

    /// Identity of the primary buffer — the task handle for query/cancel.
    pub(crate) fn primary_id(&self) -> BufferId {
        self.primary.id()
    }

    pub(crate) fn get(&self, slot: BufferSlot) -> Option<&SampleBuffer> {
        match slot {
            BufferSlot::Primary => Some(&self.primary),
            BufferSlot::Secondary => self.secondary.as_ref(),
        }
    }

    pub(crate) fn get_mut(&mut self, slot: BufferSlot) -> Option<&mut SampleBuffer> {
        match slot {
            BufferSlot::Primary => Some(&mut self.primary),
            BufferSlot::Secondary => self.secondary.as_mut(),
        }
    }

    /// Lease over the primary buffer.
    pub(crate) fn primary_lease(&self) -> BufferLease {
        self.primary.lease()
    }

    /// Lease the timer task should wrap onto when repeating: the secondary
    /// buffer when there is one, otherwise the primary buffer itself.
    pub(crate) fn wraparound_lease(&self) -> BufferLease {
        match &self.secondary {
            Some(secondary) => secondary.lease(),
            None => self.primary.lease(),
        }
    }
}
