//! Deck/Index Navigator
//!
//! Keeps a permutation of `[0, len)` mapping logical positions to card array
//! indices. Sequential order is the identity permutation; shuffled order is a
//! uniformly random Fisher-Yates permutation.

use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Navigator {
    order: Vec<usize>,
    shuffled: bool,
}

impl Navigator {
    pub fn new(len: usize, shuffle: bool) -> Self {
        let mut navigator = Self::default();
        navigator.rebuild(len, shuffle);
        navigator
    }

    /// Recompute the order for a deck of `len` cards
    pub fn rebuild(&mut self, len: usize, shuffle: bool) {
        self.rebuild_with(len, shuffle, &mut rand::thread_rng());
    }

    /// Recompute the order with a caller-supplied RNG
    pub fn rebuild_with<R: Rng + ?Sized>(&mut self, len: usize, shuffle: bool, rng: &mut R) {
        self.order = (0..len).collect();
        self.reorder_with(shuffle, rng);
    }

    /// Reorder the current deck: shuffled, or back to identity
    pub fn reorder(&mut self, shuffle: bool) {
        self.reorder_with(shuffle, &mut rand::thread_rng());
    }

    pub fn reorder_with<R: Rng + ?Sized>(&mut self, shuffle: bool, rng: &mut R) {
        let len = self.order.len();
        self.order.clear();
        self.order.extend(0..len);
        if shuffle {
            self.order.shuffle(rng);
        }
        self.shuffled = shuffle;
    }

    /// Map a logical position to a card index
    ///
    /// Out-of-range positions map to themselves.
    pub fn logical_to_real(&self, logical: usize) -> usize {
        self.order.get(logical).copied().unwrap_or(logical)
    }

    pub fn next(&self, logical: usize) -> Option<usize> {
        let len = self.order.len();
        (len > 0).then(|| (logical + 1) % len)
    }

    pub fn prev(&self, logical: usize) -> Option<usize> {
        let len = self.order.len();
        (len > 0).then(|| (logical % len + len - 1) % len)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffled
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn is_bijection(order: &[usize]) -> bool {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        sorted == (0..order.len()).collect::<Vec<_>>()
    }

    #[test]
    fn test_sequential_is_identity() {
        let nav = Navigator::new(5, false);
        assert_eq!(nav.order(), &[0, 1, 2, 3, 4]);
        assert!(!nav.is_shuffled());
    }

    #[test]
    fn test_shuffle_is_bijection_and_unshuffle_restores_identity() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut nav = Navigator::default();

        for len in [0usize, 1, 2, 10, 57] {
            nav.rebuild_with(len, true, &mut rng);
            assert!(is_bijection(nav.order()), "len {}", len);
            assert!(nav.is_shuffled());

            nav.reorder_with(false, &mut rng);
            assert_eq!(nav.order(), (0..len).collect::<Vec<_>>().as_slice());
        }
    }

    #[test]
    fn test_shuffle_actually_permutes() {
        let mut rng = StdRng::seed_from_u64(42);
        let nav_order = {
            let mut nav = Navigator::default();
            nav.rebuild_with(20, true, &mut rng);
            nav.order().to_vec()
        };
        assert_ne!(nav_order, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_logical_to_real_out_of_range_is_identity() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut nav = Navigator::default();
        nav.rebuild_with(3, true, &mut rng);

        assert_eq!(nav.logical_to_real(3), 3);
        assert_eq!(nav.logical_to_real(100), 100);
        assert!(nav.logical_to_real(2) < 3);
    }

    #[test]
    fn test_wrap_around() {
        let nav = Navigator::new(3, false);
        assert_eq!(nav.next(2), Some(0));
        assert_eq!(nav.prev(0), Some(2));
        assert_eq!(nav.next(0), Some(1));

        let single = Navigator::new(1, false);
        assert_eq!(single.next(0), Some(0));
        assert_eq!(single.prev(0), Some(0));

        let empty = Navigator::new(0, false);
        assert_eq!(empty.next(0), None);
        assert_eq!(empty.prev(0), None);
    }
}
