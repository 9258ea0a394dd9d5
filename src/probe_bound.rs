use alloc::vec::Vec;

use crate::error::Error;
use crate::occupancy::GROUP_WIDTH;
use crate::occupancy::group_count;

/// Upper bound on probe distance, shared by each run of 32 home buckets.
///
/// A lookup whose home bucket is `h` can stop once it has probed further than
/// `get(h)` buckets. Bounds only ever grow between resizes; deletions leave
/// them in place.
#[derive(Clone, Debug)]
pub(crate) struct ProbeBounds {
    bounds: Vec<u32>,
}

impl ProbeBounds {
    pub(crate) fn try_new(buckets: usize) -> Result<Self, Error> {
        let len = group_count(buckets);
        let mut bounds = Vec::new();
        bounds
            .try_reserve_exact(len)
            .map_err(|_| Error::AllocationFailure {
                bytes: len * core::mem::size_of::<u32>(),
            })?;
        bounds.resize(len, 0);

        Ok(Self { bounds })
    }

    #[inline(always)]
    pub(crate) fn get(&self, home: usize) -> usize {
        self.bounds[home / GROUP_WIDTH] as usize
    }

    /// Records that an entry homed at `home` sits `distance` buckets away.
    #[inline(always)]
    pub(crate) fn raise(&mut self, home: usize, distance: usize) {
        let bound = &mut self.bounds[home / GROUP_WIDTH];
        if distance as u32 > *bound {
            *bound = distance as u32;
        }
    }

    pub(crate) fn reset(&mut self, buckets: usize) {
        self.bounds.truncate(group_count(buckets));
        self.bounds.fill(0);
    }

    #[cfg(any(test, feature = "stats"))]
    pub(crate) fn max(&self) -> usize {
        self.bounds.iter().copied().max().unwrap_or(0) as usize
    }
}
