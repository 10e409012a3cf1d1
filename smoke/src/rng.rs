// Everything pseudo-random in the effect goes through here: splat colors,
// random splat positions and burst sizes.
//
// Seeding the generator makes a run reproducible.

use rand::distr::{Alphanumeric, StandardUniform};
use rand::prelude::*;
use rand_pcg::Pcg32;
use rand_seeder::Seeder;
use std::cell::RefCell;
use std::thread_local;

thread_local!(
    static SMOKE_RNG: RefCell<Pcg32> = {
        let rng = Pcg32::from_rng(&mut rand::rng());
        RefCell::new(rng)
    }
);

pub fn init_from_seed(optional_seed: &Option<String>) {
    let seed = optional_seed.as_ref().cloned().unwrap_or_else(|| {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect()
    });

    SMOKE_RNG.with(|rng| rng.replace(Seeder::from(seed).into_rng()));
}

pub fn gen<T>() -> T
where
    StandardUniform: Distribution<T>,
{
    SMOKE_RNG.with(|rng| rng.borrow_mut().random::<T>())
}

/// A uniformly distributed integer in `low..high`.
pub fn gen_between(low: u32, high: u32) -> u32 {
    let span = high.saturating_sub(low).max(1);
    low + ((gen::<f32>() * span as f32) as u32).min(span - 1)
}
