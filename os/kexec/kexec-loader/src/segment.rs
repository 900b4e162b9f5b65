//! # Kexec Segments
//!
//! A [`Segment`] is a byte blob bound to a physical range; [`Segments`] is the
//! ordered, non-overlapping set of them that makes up the loadable image.

use core::fmt;
use kexec_addresses::{PhysicalAddress, PhysicalRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SegmentError {
    #[error("segment {second} overlaps segment {first}")]
    Overlap {
        first: PhysicalRange,
        second: PhysicalRange,
    },
    #[error("segment {segment} lies outside {bounds}")]
    OutOfBounds {
        segment: PhysicalRange,
        bounds: PhysicalRange,
    },
    #[error("{len} bytes of segment data do not fit {target}")]
    Oversized { len: u64, target: PhysicalRange },
    #[error("{len} bytes at {start} run past the end of the address space")]
    AddressOverflow { start: PhysicalAddress, len: u64 },
}

/// A byte blob bound to a physical address range.
///
/// The target size always equals the data length.
#[derive(Clone, PartialEq, Eq)]
pub struct Segment {
    data: Vec<u8>,
    target: PhysicalRange,
}

impl Segment {
    /// Bind `data` to `start`, covering exactly `data.len()` bytes.
    ///
    /// # Errors
    /// [`SegmentError::AddressOverflow`] if the blob would run past the end of
    /// the 64-bit address space.
    pub fn new(data: Vec<u8>, start: PhysicalAddress) -> Result<Self, SegmentError> {
        let len = data.len() as u64;
        if start.checked_add(len).is_none() {
            return Err(SegmentError::AddressOverflow { start, len });
        }
        Ok(Self {
            data,
            target: PhysicalRange::new(start, len),
        })
    }

    /// Bind `data` to a fixed-size slot, zero-filling the remainder.
    ///
    /// # Errors
    /// [`SegmentError::Oversized`] if `data` is larger than `slot`.
    pub fn padded(mut data: Vec<u8>, slot: PhysicalRange) -> Result<Self, SegmentError> {
        let len = data.len() as u64;
        if len > slot.size() {
            return Err(SegmentError::Oversized { len, target: slot });
        }
        let size = usize::try_from(slot.size())
            .map_err(|_| SegmentError::Oversized { len, target: slot })?;
        data.resize(size, 0);
        Ok(Self { data, target: slot })
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub const fn target(&self) -> PhysicalRange {
        self.target
    }

    #[must_use]
    pub const fn start(&self) -> PhysicalAddress {
        self.target.start()
    }

    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("target", &self.target)
            .field("len", &self.data.len())
            .finish()
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#x} bytes)", self.target, self.data.len())
    }
}

/// Ordered set of non-overlapping segments.
///
/// Order is placement order and carries no precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segments(Vec<Segment>);

impl Segments {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Append `segment` unless it overlaps one already present.
    ///
    /// # Errors
    /// [`SegmentError::Overlap`] naming the existing and the rejected range.
    pub fn push(&mut self, segment: Segment) -> Result<(), SegmentError> {
        if let Some(existing) = self.0.iter().find(|s| s.target.overlaps(&segment.target)) {
            return Err(SegmentError::Overlap {
                first: existing.target,
                second: segment.target,
            });
        }
        self.0.push(segment);
        Ok(())
    }

    /// Re-check every pair for overlap.
    ///
    /// # Errors
    /// [`SegmentError::Overlap`] for the first overlapping pair.
    pub fn validate(&self) -> Result<(), SegmentError> {
        for (i, a) in self.0.iter().enumerate() {
            for b in &self.0[i + 1..] {
                if a.target.overlaps(&b.target) {
                    return Err(SegmentError::Overlap {
                        first: a.target,
                        second: b.target,
                    });
                }
            }
        }
        Ok(())
    }

    /// Check that every segment lies inside `bounds`.
    ///
    /// # Errors
    /// [`SegmentError::OutOfBounds`] for the first segment outside.
    pub fn validate_within(&self, bounds: &PhysicalRange) -> Result<(), SegmentError> {
        match self.0.iter().find(|s| !bounds.contains(&s.target)) {
            Some(s) => Err(SegmentError::OutOfBounds {
                segment: s.target,
                bounds: *bounds,
            }),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.0.get(index)
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Segment> {
        self.0.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Segment] {
        &self.0
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Segment> {
        self.0
    }

    /// Physical ranges of all segments, in order.
    pub fn ranges(&self) -> impl Iterator<Item = PhysicalRange> + '_ {
        self.0.iter().map(Segment::target)
    }

    /// Sum of all segment sizes in bytes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.ranges().map(|r| r.size()).sum()
    }
}

impl<'a> IntoIterator for &'a Segments {
    type Item = &'a Segment;
    type IntoIter = core::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for Segments {
    type Item = Segment;
    type IntoIter = std::vec::IntoIter<Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Segments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, s) in self.0.iter().enumerate() {
            writeln!(f, "segment {i}: {s}")?;
        }
        Ok(())
    }
}
