//! Sign ring and round resolution.
//!
//! The sixteen signs sit on a ring in declaration order. A sign beats the
//! `(N - 1) / 2` signs that follow it clockwise and loses to the same number
//! preceding it. With an even ring one sign is left over, exactly half a
//! ring away; that antipodal pairing resolves as a draw so the relation
//! stays antisymmetric and every sign keeps the same number of wins.
//!
//! The beats relation is precomputed once per process into a [`BeatsTable`]
//! and [`resolve`] is a pair of bit tests.

use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::GameError;

/// Largest ring a [`BeatsTable`] can describe (one bit per position).
pub const MAX_RING: usize = 64;

/// One game symbol. Declaration order is ring order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", try_from = "String")]
pub enum Sign {
    Air,
    Water,
    Alien,
    Dragon,
    Devil,
    Lightning,
    Gun,
    Rock,
    Fire,
    Scissors,
    Snake,
    Human,
    Tree,
    Wolf,
    Sponge,
    Paper,
}

impl Sign {
    /// Every sign, in ring order.
    pub const ALL: [Self; 16] = [
        Self::Air,
        Self::Water,
        Self::Alien,
        Self::Dragon,
        Self::Devil,
        Self::Lightning,
        Self::Gun,
        Self::Rock,
        Self::Fire,
        Self::Scissors,
        Self::Snake,
        Self::Human,
        Self::Tree,
        Self::Wolf,
        Self::Sponge,
        Self::Paper,
    ];

    /// Number of signs on the ring.
    pub const COUNT: usize = Self::ALL.len();

    /// Position of this sign on the ring.
    #[must_use]
    pub const fn position(self) -> usize {
        self as usize
    }

    /// Sign at `position`, wrapping around the ring.
    #[must_use]
    pub const fn at(position: usize) -> Self {
        Self::ALL[position % Self::COUNT]
    }

    /// Upper-case name, as used on the wire.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Air => "AIR",
            Self::Water => "WATER",
            Self::Alien => "ALIEN",
            Self::Dragon => "DRAGON",
            Self::Devil => "DEVIL",
            Self::Lightning => "LIGHTNING",
            Self::Gun => "GUN",
            Self::Rock => "ROCK",
            Self::Fire => "FIRE",
            Self::Scissors => "SCISSORS",
            Self::Snake => "SNAKE",
            Self::Human => "HUMAN",
            Self::Tree => "TREE",
            Self::Wolf => "WOLF",
            Self::Sponge => "SPONGE",
            Self::Paper => "PAPER",
        }
    }

    /// Signs this one defeats, clockwise from the next position.
    #[must_use]
    pub fn beats(self) -> Vec<Self> {
        SIGN_TABLE
            .beaten_by(self.position())
            .map(Self::at)
            .collect()
    }

    /// The sign half a ring away, if the ring has even size.
    #[must_use]
    pub fn antipode(self) -> Option<Self> {
        SIGN_TABLE
            .antipode(self.position())
            .map(Self::at)
    }
}

impl std::fmt::Display for Sign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Sign {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|sign| sign.name() == upper)
            .ok_or_else(|| GameError::InvalidSign {
                input: s.to_string(),
                suggestion: suggest_sign(&upper),
            })
    }
}

impl TryFrom<String> for Sign {
    type Error = GameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Closest sign name within Damerau-Levenshtein distance 3.
#[must_use]
pub fn suggest_sign(input: &str) -> Option<String> {
    let upper = input.to_ascii_uppercase();
    Sign::ALL
        .iter()
        .map(|s| (s.name(), strsim::damerau_levenshtein(&upper, s.name())))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(name, _)| name.to_string())
}

/// Result of a round from one player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Lose,
    Draw,
}

impl Outcome {
    /// The same result seen from the opponent's side.
    #[must_use]
    pub const fn flip(self) -> Self {
        match self {
            Self::Win => Self::Lose,
            Self::Lose => Self::Win,
            Self::Draw => Self::Draw,
        }
    }

    /// Lower-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Lose => "lose",
            Self::Draw => "draw",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Precomputed beats relation for a ring of `size` positions.
///
/// `masks[i]` has bit `j` set when position `i` beats position `j`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeatsTable {
    size: usize,
    masks: Vec<u64>,
}

impl BeatsTable {
    /// Builds the table for a ring of `size` positions.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero or larger than [`MAX_RING`].
    #[must_use]
    pub fn new(size: usize) -> Self {
        assert!(
            (1..=MAX_RING).contains(&size),
            "ring size must be in 1..={MAX_RING}, got {size}"
        );
        let reach = (size - 1) / 2;
        let masks = (0..size)
            .map(|i| {
                (1..=reach).fold(0u64, |mask, step| mask | (1u64 << ((i + step) % size)))
            })
            .collect();
        Self { size, masks }
    }

    /// Number of positions on the ring.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// How many positions each position beats.
    #[must_use]
    pub const fn reach(&self) -> usize {
        (self.size - 1) / 2
    }

    /// Positions beaten by `position`, clockwise order.
    pub fn beaten_by(&self, position: usize) -> impl Iterator<Item = usize> + '_ {
        let reach = self.reach();
        (1..=reach).map(move |step| (position + step) % self.size)
    }

    /// The position half a ring away, only defined for even sizes.
    #[must_use]
    pub const fn antipode(&self, position: usize) -> Option<usize> {
        if self.size % 2 == 0 {
            Some((position + self.size / 2) % self.size)
        } else {
            None
        }
    }

    /// Outcome of `a` against `b`, both ring positions.
    ///
    /// # Panics
    ///
    /// Panics if either position is outside the ring.
    #[must_use]
    pub fn resolve(&self, a: usize, b: usize) -> Outcome {
        assert!(a < self.size && b < self.size, "position outside ring");
        if a == b {
            Outcome::Draw
        } else if self.masks[a] & (1u64 << b) != 0 {
            Outcome::Win
        } else if self.masks[b] & (1u64 << a) != 0 {
            Outcome::Lose
        } else {
            Outcome::Draw
        }
    }
}

static SIGN_TABLE: LazyLock<BeatsTable> = LazyLock::new(|| BeatsTable::new(Sign::COUNT));

/// Outcome of `a` against `b`, from `a`'s perspective.
#[must_use]
pub fn resolve(a: Sign, b: Sign) -> Outcome {
    SIGN_TABLE.resolve(a.position(), b.position())
}
