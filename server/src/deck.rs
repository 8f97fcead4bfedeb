//! The 17-card policy deck and the shuffle every random permutation in the game goes through.

use crate::error::EngineError;
use log::debug;
use rand::Rng;
use shared::{Policy, FASCIST_POLICY_CARDS, REPUBLICAN_POLICY_CARDS};

/// Fisher-Yates: walk from the last index down to 1, swapping with a uniform index in `[0, i]`.
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

/// Draw and discard piles. Cards in a legislative hand or on a policy track live elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyDeck {
    draw_pile: Vec<Policy>,
    discard_pile: Vec<Policy>,
}

impl PolicyDeck {
    /// Builds the full 6 republican + 11 fascist deck and shuffles it once.
    pub fn new_shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut draw_pile = Vec::with_capacity(REPUBLICAN_POLICY_CARDS + FASCIST_POLICY_CARDS);
        draw_pile.extend(std::iter::repeat(Policy::Republican).take(REPUBLICAN_POLICY_CARDS));
        draw_pile.extend(std::iter::repeat(Policy::Fascist).take(FASCIST_POLICY_CARDS));
        shuffle(&mut draw_pile, rng);

        Self {
            draw_pile,
            discard_pile: Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn from_piles(draw_pile: Vec<Policy>, discard_pile: Vec<Policy>) -> Self {
        Self {
            draw_pile,
            discard_pile,
        }
    }

    /// Removes and returns the first `n` cards in draw order.
    pub fn draw(&mut self, n: usize) -> Result<Vec<Policy>, EngineError> {
        if n > self.draw_pile.len() {
            return Err(EngineError::EmptyDeck {
                requested: n,
                remaining: self.draw_pile.len(),
            });
        }
        Ok(self.draw_pile.drain(..n).collect())
    }

    /// Appends to the discard pile, keeping arrival order for auditing.
    pub fn discard(&mut self, cards: impl IntoIterator<Item = Policy>) {
        self.discard_pile.extend(cards);
    }

    pub fn peek(&self, n: usize) -> &[Policy] {
        &self.draw_pile[..n.min(self.draw_pile.len())]
    }

    /// Shuffles the discard pile back under the draw pile when fewer than `needed` cards remain.
    ///
    /// Returns whether a reshuffle happened.
    pub fn replenish<R: Rng + ?Sized>(&mut self, needed: usize, rng: &mut R) -> bool {
        if self.draw_pile.len() >= needed || self.discard_pile.is_empty() {
            return false;
        }

        debug!(
            "Reshuffling {} discarded policies into a draw pile of {}",
            self.discard_pile.len(),
            self.draw_pile.len()
        );
        self.draw_pile.append(&mut self.discard_pile);
        shuffle(&mut self.draw_pile, rng);
        true
    }

    pub fn draw_pile(&self) -> &[Policy] {
        &self.draw_pile
    }

    pub fn discard_pile(&self) -> &[Policy] {
        &self.discard_pile
    }

    pub fn len(&self) -> usize {
        self.draw_pile.len() + self.discard_pile.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draw_pile.is_empty() && self.discard_pile.is_empty()
    }
}
