//! Per-lane random number streams.
//!
//! Every (pixel, sample-slot) lane draws from its own generator, keyed by
//! (frame, pixel, sample, bounce). Identical keys reproduce identical
//! streams; any differing key component yields an independent stream, so no
//! two lanes in a generation can observe correlated noise.
//!
//! The [xoshiro](https://prng.di.unimi.it/) family is a good fit for path
//! tracing: statistically strong, cheap to seed, and small enough to
//! construct per lane per generation without touching shared state.

use rand::Rng;
pub use rand::SeedableRng;

/// Generator type used by all transport-side draws.
pub type LaneRng = rand_xoshiro::Xoshiro128Plus;

/// SplitMix64 finalizer used to mix lane keys into a seed.
fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Build the generator for one lane at one bounce generation.
///
/// The four keys are folded through SplitMix64 one at a time, so a change in
/// any of them decorrelates the whole seed.
pub fn lane_rng(frame: u64, pixel: u32, sample: u32, bounce: u32) -> LaneRng {
    let mut seed = splitmix64(frame);
    seed = splitmix64(seed ^ u64::from(pixel));
    seed = splitmix64(seed ^ u64::from(sample));
    seed = splitmix64(seed ^ u64::from(bounce));
    LaneRng::seed_from_u64(seed)
}

/// Draw a uniform f32 in [0, 1).
#[inline]
pub fn gen_f32(rng: &mut LaneRng) -> f32 {
    rng.gen::<f32>()
}
