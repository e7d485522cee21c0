//! Byte ranges occupied by decoded structures.
//!
//! Every structural node in this crate records the absolute file range it was decoded from, as a
//! [`Region`]. A hex or tree viewer can use it to highlight the bytes behind a header or table
//! without knowing anything about the structure itself.

use std::fmt;

/// An absolute `(start, length)` byte range in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Region {
    /// Absolute file offset of the first byte
    pub start: u64,
    /// Number of bytes covered
    pub length: u64,
}

impl Region {
    /// Create a region from a start offset and a length.
    #[must_use]
    pub const fn new(start: u64, length: u64) -> Self {
        Region { start, length }
    }

    /// Create a region from a start and an exclusive end offset. An `end` before `start`
    /// yields an empty region.
    #[must_use]
    pub fn from_bounds(start: usize, end: usize) -> Self {
        Region {
            start: start as u64,
            length: end.saturating_sub(start) as u64,
        }
    }

    /// First offset past the region.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.start.saturating_add(self.length)
    }

    /// Returns `true` if `offset` lies inside the region.
    #[must_use]
    pub fn contains(&self, offset: u64) -> bool {
        offset >= self.start && offset < self.end()
    }

    /// Returns `true` if the region covers no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:08X} - {:08X}]", self.start, self.end())
    }
}

/// Implemented by every structure that knows which bytes it was decoded from.
pub trait HasRegion {
    /// The absolute byte range of this structure.
    fn region(&self) -> Region;
}

macro_rules! impl_has_region {
    ($($ty:ty),* $(,)?) => {
        $(
            impl crate::image::region::HasRegion for $ty {
                fn region(&self) -> crate::image::region::Region {
                    self.region
                }
            }
        )*
    };
}

pub(crate) use impl_has_region;
