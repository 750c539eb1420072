// Oriented coordinate primitives
//
// A `SeqPos` is an oriented position on the graph's linearized sequence:
// the most significant bit selects the strand (0 = forward, 1 = reverse
// complement), the low 63 bits are an offset from the start of that
// strand's concatenated sequence. Keeping the orientation in the top bit
// lets positions on one strand be ordered and subtracted like plain
// integers, but stepping across the strand boundary is always a bug, so
// movement goes through the checked `advance`/`retreat` operations.
//
// A `Handle` names (node rank, orientation) with the rank in the high bits
// and the orientation in bit 0.

use crate::error::MapError;
use std::fmt;

const OFFSET_BITS: u64 = 63;
const ORIENTATION_MASK: u64 = 1 << OFFSET_BITS;
const OFFSET_MASK: u64 = ORIENTATION_MASK - 1;

/// Oriented position on the linearized graph sequence.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct SeqPos(u64);

impl SeqPos {
    #[inline(always)]
    pub fn encode(offset: u64, is_rev: bool) -> Self {
        debug_assert!(offset <= OFFSET_MASK);
        SeqPos(offset | if is_rev { ORIENTATION_MASK } else { 0 })
    }

    #[inline(always)]
    pub fn offset(self) -> u64 {
        self.0 & OFFSET_MASK
    }

    #[inline(always)]
    pub fn is_rev(self) -> bool {
        self.0 & ORIENTATION_MASK != 0
    }

    #[inline(always)]
    pub fn to_u64(self) -> u64 {
        self.0
    }

    #[inline(always)]
    pub fn from_u64(raw: u64) -> Self {
        SeqPos(raw)
    }

    /// Move `delta` bases along the strand. Fails rather than crossing the
    /// orientation bit.
    pub fn advance(self, delta: u64) -> Result<SeqPos, MapError> {
        let offset = self
            .offset()
            .checked_add(delta)
            .filter(|&o| o <= OFFSET_MASK)
            .ok_or(MapError::Overflow)?;
        Ok(SeqPos::encode(offset, self.is_rev()))
    }

    /// Move `delta` bases back along the strand.
    pub fn retreat(self, delta: u64) -> Result<SeqPos, MapError> {
        let offset = self.offset().checked_sub(delta).ok_or(MapError::Overflow)?;
        Ok(SeqPos::encode(offset, self.is_rev()))
    }
}

impl fmt::Display for SeqPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.offset(), if self.is_rev() { '-' } else { '+' })
    }
}

impl fmt::Debug for SeqPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeqPos({})", self)
    }
}

/// (node rank, orientation) packed into a u64.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Handle(u64);

impl Handle {
    #[inline(always)]
    pub fn pack(rank: u64, is_rev: bool) -> Self {
        Handle((rank << 1) | is_rev as u64)
    }

    #[inline(always)]
    pub fn rank(self) -> u64 {
        self.0 >> 1
    }

    #[inline(always)]
    pub fn is_rev(self) -> bool {
        self.0 & 1 != 0
    }

    /// Same node, opposite orientation.
    #[inline(always)]
    pub fn flip(self) -> Self {
        Handle(self.0 ^ 1)
    }

    #[inline(always)]
    pub fn to_u64(self) -> u64 {
        self.0
    }

    #[inline(always)]
    pub fn from_u64(raw: u64) -> Self {
        Handle(raw)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}{})", self.rank(), if self.is_rev() { '-' } else { '+' })
    }
}
