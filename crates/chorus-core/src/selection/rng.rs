//! Randomness used by speaker selection.

use rand::Rng;
use rand::seq::SliceRandom;

/// The random draws a selection strategy needs.
///
/// Every `rand::Rng` provides it; tests substitute scripted draws.
pub trait SelectionRng {
    /// One Bernoulli trial with the given success probability.
    fn chance(&mut self, probability: f64) -> bool;

    /// A uniform index in `0..upper`. `upper` must be non-zero.
    fn pick(&mut self, upper: usize) -> usize;

    /// A uniform random permutation of `0..len`.
    fn permutation(&mut self, len: usize) -> Vec<usize>;
}

impl<R: Rng> SelectionRng for R {
    fn chance(&mut self, probability: f64) -> bool {
        self.gen_bool(probability.clamp(0.0, 1.0))
    }

    fn pick(&mut self, upper: usize) -> usize {
        self.gen_range(0..upper)
    }

    fn permutation(&mut self, len: usize) -> Vec<usize> {
        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(self);
        order
    }
}
