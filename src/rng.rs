//! Seeded random number pool.
//!
//! A single root generator seeds one private generator per worker lane at the start of
//! every tick. Agents are split into as many contiguous chunks as there are lanes (in
//! agent id order) and each chunk only ever draws from its own lane, so a run with the same
//! root seed reproduces exactly, whether the chunks run on one thread or many.

use bevy_ecs::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Root generator plus the per-lane generators for the current tick.
#[derive(Resource, Debug, Clone)]
pub struct RngPool {
    root: ChaCha8Rng,
    lanes: Vec<ChaCha8Rng>,
}

impl RngPool {
    pub fn new(seed: u64, lane_count: usize) -> Self {
        let mut pool = Self {
            root: ChaCha8Rng::seed_from_u64(seed),
            lanes: Vec::with_capacity(lane_count),
        };
        pool.lanes
            .extend((0..lane_count.max(1)).map(|_| ChaCha8Rng::seed_from_u64(0)));
        pool.reseed_lanes();
        pool
    }

    /// Draw fresh lane seeds from the root. Called once at the start of every tick.
    pub fn reseed_lanes(&mut self) {
        for lane in self.lanes.iter_mut() {
            *lane = ChaCha8Rng::seed_from_u64(self.root.gen());
        }
    }

    /// The root generator, for serial work between ticks (spawning).
    pub fn root_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.root
    }

    pub fn lanes_mut(&mut self) -> &mut [ChaCha8Rng] {
        &mut self.lanes
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }
}

/// Run `f` over `items`, chunk `k` drawing only from lane `k`.
///
/// With the `parallel` feature the chunks run on the rayon pool. Output is identical either
/// way because the chunk-to-lane mapping only depends on `items.len()` and the lane count.
pub fn for_each_in_lanes<T, F>(items: &mut [T], lanes: &mut [ChaCha8Rng], f: F)
where
    T: Send,
    F: Fn(&mut T, &mut ChaCha8Rng) + Send + Sync,
{
    if items.is_empty() || lanes.is_empty() {
        return;
    }
    let chunk_len = items.len().div_ceil(lanes.len());

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        items
            .par_chunks_mut(chunk_len)
            .zip(lanes.par_iter_mut())
            .for_each(|(chunk, rng)| {
                for item in chunk {
                    f(item, rng);
                }
            });
    }

    #[cfg(not(feature = "parallel"))]
    for (chunk, rng) in items.chunks_mut(chunk_len).zip(lanes.iter_mut()) {
        for item in chunk {
            f(item, rng);
        }
    }
}
