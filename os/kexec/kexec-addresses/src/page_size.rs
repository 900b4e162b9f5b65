/// Sealed trait pattern to restrict `PageSize` impls to our markers.
mod sealed {
    pub trait Sealed {}
}

/// Marker trait for supported page sizes.
pub trait PageSize: sealed::Sealed + Copy {
    /// Page size in bytes (power of two).
    const SIZE: u64;
}

/// 4 KiB page (4096 bytes).
///
/// Granularity of the boot stub and device-tree slots.
#[derive(Debug, Copy, Clone)]
pub struct Size4K;
impl sealed::Sealed for Size4K {}
impl PageSize for Size4K {
    const SIZE: u64 = 4096;
}

/// 2 MiB block (`2_097_152` bytes).
///
/// arm64 kernels that do not advertise "place anywhere" expect a 2 MiB
/// aligned base.
#[derive(Debug, Copy, Clone)]
pub struct Size2M;
impl sealed::Sealed for Size2M {}
impl PageSize for Size2M {
    const SIZE: u64 = 2 * 1024 * 1024;
}

const _: () = {
    assert!(Size4K::SIZE.is_power_of_two());
    assert!(Size2M::SIZE.is_power_of_two());
};
