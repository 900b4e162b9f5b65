//! # Boot Stub
//!
//! The purgatory code that runs between the old and the new kernel. It loads
//! the device-tree address into the first argument register, clears the
//! others and branches to the kernel entry.
//!
//! ## aarch64 layout
//!
//! | Offset | Content |
//! |--------|---------|
//! | 0      | `ldr x4, #24` |
//! | 4      | `ldr x0, #28` |
//! | 8      | `mov x1, xzr` |
//! | 12     | `mov x2, xzr` |
//! | 16     | `mov x3, xzr` |
//! | 20     | `br x4` |
//! | 24     | kernel entry, u64 little endian |
//! | 32     | device-tree address, u64 little endian |
//!
//! This matches the arm64 boot protocol: `x0` holds the physical address of
//! the device tree, `x1..x3` are zero.

use crate::arch::Arch;
use kexec_addresses::PhysicalAddress;

/// Boot-stub template for one architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootStub {
    Aarch64,
}

impl BootStub {
    /// The template for `arch`, if there is one.
    #[must_use]
    pub const fn for_arch(arch: Arch) -> Option<Self> {
        match arch {
            Arch::Aarch64 => Some(Self::Aarch64),
            Arch::X86_64 | Arch::Riscv64 => None,
        }
    }

    #[must_use]
    pub const fn arch(self) -> Arch {
        match self {
            Self::Aarch64 => Arch::Aarch64,
        }
    }

    /// Produce the stub for the given kernel entry and metadata address.
    #[must_use]
    pub fn synthesize(self, kernel_entry: PhysicalAddress, metadata: PhysicalAddress) -> Vec<u8> {
        match self {
            Self::Aarch64 => aarch64::synthesize(kernel_entry.as_u64(), metadata.as_u64()).to_vec(),
        }
    }
}

mod aarch64 {
    use super::a64;

    pub const KERNEL_ENTRY_OFFSET: usize = 24;
    pub const METADATA_OFFSET: usize = 32;
    pub const STUB_SIZE: usize = 40;

    /// Byte offset of a literal from the instruction at `pc`.
    const fn literal(at: usize, pc: usize) -> i32 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let off = (at - pc) as i32;
        off
    }

    const CODE: [u32; 6] = [
        a64::ldr_literal(4, literal(KERNEL_ENTRY_OFFSET, 0)),
        a64::ldr_literal(0, literal(METADATA_OFFSET, 4)),
        a64::mov_zero(1),
        a64::mov_zero(2),
        a64::mov_zero(3),
        a64::br(4),
    ];

    const _: () = assert!(CODE.len() * 4 == KERNEL_ENTRY_OFFSET);
    const _: () = assert!(METADATA_OFFSET + 8 == STUB_SIZE);

    pub fn synthesize(kernel_entry: u64, metadata: u64) -> [u8; STUB_SIZE] {
        let mut out = [0u8; STUB_SIZE];
        for (slot, word) in out.chunks_exact_mut(4).zip(CODE) {
            slot.copy_from_slice(&word.to_le_bytes());
        }
        out[KERNEL_ENTRY_OFFSET..METADATA_OFFSET].copy_from_slice(&kernel_entry.to_le_bytes());
        out[METADATA_OFFSET..STUB_SIZE].copy_from_slice(&metadata.to_le_bytes());
        out
    }
}

/// Minimal A64 instruction encoders.
mod a64 {
    /// Zero register encoding in the `Rm`/`Rn` fields.
    const XZR: u32 = 31;

    /// `LDR Xt, label` (64-bit literal load). `offset` is the byte distance
    /// from this instruction to the literal and must be word aligned.
    pub const fn ldr_literal(rt: u32, offset: i32) -> u32 {
        assert!(offset % 4 == 0 && rt < 31);
        #[allow(clippy::cast_sign_loss)]
        let imm19 = ((offset >> 2) as u32) & 0x7_FFFF;
        0x5800_0000 | (imm19 << 5) | rt
    }

    /// `MOV Xd, XZR`, the alias of `ORR Xd, XZR, XZR`.
    pub const fn mov_zero(rd: u32) -> u32 {
        assert!(rd < 31);
        0xAA00_03E0 | (XZR << 16) | rd
    }

    /// `BR Xn`.
    pub const fn br(rn: u32) -> u32 {
        assert!(rn < 31);
        0xD61F_0000 | (rn << 5)
    }
}
