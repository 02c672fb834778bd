//! Linux ioctl request number encoding.
//!
//! Mirrors the generic `_IOC` layout from `asm-generic/ioctl.h`, which is the
//! layout used on x86, x86_64, arm and aarch64:
//!
//! ```text
//!  31 30 29          16 15     8 7      0
//! +-----+--------------+--------+--------+
//! | dir |     size     |  type  |   nr   |
//! +-----+--------------+--------+--------+
//! ```

use crate::decode::Operation;

/// `type` byte shared by every DVKM request.
pub const DVKM_IOCTL_MAGIC: u8 = b'D';

pub const IOC_NONE: u32 = 0;
pub const IOC_WRITE: u32 = 1;
pub const IOC_READ: u32 = 2;

const IOC_NRBITS: u32 = 8;
const IOC_TYPEBITS: u32 = 8;
const IOC_SIZEBITS: u32 = 14;
const IOC_DIRBITS: u32 = 2;

const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = IOC_NRSHIFT + IOC_NRBITS;
const IOC_SIZESHIFT: u32 = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: u32 = IOC_SIZESHIFT + IOC_SIZEBITS;

const IOC_SIZEMASK: u32 = (1 << IOC_SIZEBITS) - 1;
const IOC_DIRMASK: u32 = (1 << IOC_DIRBITS) - 1;

/// An encoded ioctl request number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IoctlCode(u32);

impl IoctlCode {
    /// `_IOC(dir, ty, nr, size)`. `size` is truncated to the 14-bit field.
    #[must_use]
    pub const fn new(dir: u32, ty: u8, nr: u8, size: usize) -> Self {
        Self(
            ((dir & IOC_DIRMASK) << IOC_DIRSHIFT)
                | (((size as u32) & IOC_SIZEMASK) << IOC_SIZESHIFT)
                | ((ty as u32) << IOC_TYPESHIFT)
                | ((nr as u32) << IOC_NRSHIFT),
        )
    }

    /// `_IOWR(ty, nr, T)` where `size == size_of::<T>()`.
    #[must_use]
    pub const fn read_write(ty: u8, nr: u8, size: usize) -> Self {
        Self::new(IOC_READ | IOC_WRITE, ty, nr, size)
    }

    /// Request number for one DVKM operation with an argument of `arg_size` bytes.
    #[must_use]
    pub const fn for_operation(op: Operation, arg_size: usize) -> Self {
        Self::read_write(DVKM_IOCTL_MAGIC, op.opcode(), arg_size)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn dir(self) -> u32 {
        (self.0 >> IOC_DIRSHIFT) & IOC_DIRMASK
    }

    #[must_use]
    pub const fn ty(self) -> u8 {
        (self.0 >> IOC_TYPESHIFT) as u8
    }

    #[must_use]
    pub const fn nr(self) -> u8 {
        (self.0 >> IOC_NRSHIFT) as u8
    }

    #[must_use]
    pub const fn size(self) -> usize {
        ((self.0 >> IOC_SIZESHIFT) & IOC_SIZEMASK) as usize
    }
}

impl core::fmt::Display for IoctlCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
