use std::ptr::NonNull;

use crate::error::MapError;

/// This trait provides an abstraction over the low level page mapping
/// syscalls. As the allocator, our top level view of memory has nothing
/// to do with the concrete APIs offered by each kernel: we only ever ask
/// for `len` bytes somewhere around an address.
///
/// # Safety
///
/// On success, implementors must return a pointer to `len` zero-filled,
/// readable and writable bytes that nothing else uses and that stay mapped
/// for as long as the source is alive. When `exact` is set the returned
/// pointer must equal `hint`, and the mapping must not replace any existing
/// one.
pub unsafe trait PageSource {
    /// Request a memory region of size `len` placed at `hint`. If `exact` is
    /// false the hint may be ignored and the memory can land anywhere.
    fn map(&mut self, hint: *mut u8, len: usize, exact: bool) -> Result<NonNull<u8>, MapError>;

    /// Returns the virtual memory page size in bytes.
    fn page_size(&self) -> usize;
}

/// Page source backed by the operating system.
///
/// Memory obtained from the kernel is never returned to it.
#[derive(Debug, Clone, Copy)]
pub struct Kernel {
    /// Virtual memory page size of the computer. This is usually 4096 but
    /// we don't know the value at compile time.
    page_size: usize,
}

impl Kernel {
    /// Creates a new `Kernel` source, asking the OS for its page size.
    pub fn new() -> Self {
        Self {
            page_size: platform::page_size(),
        }
    }
}

impl Kernel {
    /// Hands back a fresh mapping of `len` bytes at `addr`, or unmaps it when
    /// an exact placement at `hint` was asked for and not honoured. Some
    /// kernels take the placement flag as a mere suggestion.
    ///
    /// **SAFETY**: `addr` must be a mapping of `len` bytes nobody else uses.
    unsafe fn check_placement(
        addr: NonNull<u8>,
        hint: *mut u8,
        len: usize,
        exact: bool,
    ) -> Result<NonNull<u8>, MapError> {
        if exact && addr.as_ptr() != hint {
            unsafe { platform::return_memory(addr.as_ptr(), len) };

            return Err(MapError::Misplaced {
                hint: hint as usize,
                actual: addr.as_ptr() as usize,
            });
        }

        Ok(addr)
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl PageSource for Kernel {
    fn map(&mut self, hint: *mut u8, len: usize, exact: bool) -> Result<NonNull<u8>, MapError> {
        let addr = unsafe { platform::request_memory(hint, len, exact) }
            .ok_or(MapError::Refused { hint: hint as usize, len })?;

        unsafe { Self::check_placement(addr, hint, len, exact) }
    }

    #[inline]
    fn page_size(&self) -> usize {
        self.page_size
    }
}

#[cfg(unix)]
mod platform {
    use libc::{mmap, munmap, off_t, size_t};

    use std::{
        os::raw::{c_int, c_void},
        ptr::NonNull,
    };

    /// Refuse to clobber an existing mapping at the hint.
    #[cfg(target_os = "linux")]
    const EXACT: c_int = libc::MAP_FIXED_NOREPLACE;

    /// Without `MAP_FIXED_NOREPLACE` a plain hint never replaces anything;
    /// the caller checks where the mapping ended up.
    #[cfg(not(target_os = "linux"))]
    const EXACT: c_int = 0;

    pub(super) unsafe fn request_memory(hint: *mut u8, len: usize, exact: bool) -> Option<NonNull<u8>> {
        // Read-Write only memory.
        const PROT: c_int = libc::PROT_READ | libc::PROT_WRITE;
        const FLAGS: c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
        const FD: c_int = -1;
        const OFFSET: off_t = 0;

        let flags = if exact { FLAGS | EXACT } else { FLAGS };

        let addr = unsafe { mmap(hint.cast::<c_void>(), len as size_t, PROT, flags, FD, OFFSET) };

        if addr == libc::MAP_FAILED {
            return None;
        }

        NonNull::new(addr.cast::<u8>())
    }

    pub(super) unsafe fn return_memory(addr: *mut u8, len: usize) {
        unsafe {
            munmap(addr.cast::<c_void>(), len as size_t);
        }
    }

    pub(super) fn page_size() -> usize {
        unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) as usize }
    }
}

#[cfg(windows)]
mod platform {
    use std::{ffi::c_void, mem::MaybeUninit, ptr::NonNull};

    use windows::Win32::System::{Memory, SystemInformation};

    pub(super) unsafe fn request_memory(hint: *mut u8, len: usize, exact: bool) -> Option<NonNull<u8>> {
        // Read-Write only.
        let protection = Memory::PAGE_READWRITE;

        let flags = Memory::MEM_RESERVE | Memory::MEM_COMMIT;

        // VirtualAlloc never moves a placed request, it fails instead.
        let address = exact.then_some(hint as *const c_void);

        unsafe {
            let addr = Memory::VirtualAlloc(address, len, flags, protection);

            NonNull::new(addr.cast())
        }
    }

    pub(super) unsafe fn return_memory(addr: *mut u8, _len: usize) {
        unsafe {
            let _ = Memory::VirtualFree(addr.cast::<c_void>(), 0, Memory::MEM_RELEASE);
        }
    }

    pub(super) fn page_size() -> usize {
        unsafe {
            let mut system_info = MaybeUninit::uninit();
            SystemInformation::GetSystemInfo(system_info.as_mut_ptr());

            system_info.assume_init().dwPageSize as usize
        }
    }
}
