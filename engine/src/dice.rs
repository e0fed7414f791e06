use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("no dice (\"none\")")]
    NoDice,
    #[error("invalid dice format '{0}' (expected NdM)")]
    Malformed(String),
}

/// `count` dice with `sides` faces each, written "NdM".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiceSpec {
    pub count: u32,
    pub sides: u32,
}

impl DiceSpec {
    pub const fn new(count: u32, sides: u32) -> Self {
        Self { count, sides }
    }

    pub fn min(self) -> u32 {
        self.count
    }

    pub fn max(self) -> u32 {
        self.count.saturating_mul(self.sides)
    }

    /// Same die, `extra` more of them.
    pub fn plus_dice(self, extra: u32) -> Self {
        Self {
            count: self.count.saturating_add(extra),
            ..self
        }
    }
}

impl fmt::Display for DiceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)
    }
}

impl FromStr for DiceSpec {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        if lowered == "none" {
            return Err(DiceError::NoDice);
        }
        let malformed = || DiceError::Malformed(s.to_string());
        let (count, sides) = lowered.split_once('d').ok_or_else(malformed)?;
        let count: u32 = count.parse().map_err(|_| malformed())?;
        let sides: u32 = sides.parse().map_err(|_| malformed())?;
        if count == 0 || sides == 0 {
            return Err(malformed());
        }
        Ok(Self { count, sides })
    }
}

impl TryFrom<String> for DiceSpec {
    type Error = DiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DiceSpec> for String {
    fn from(spec: DiceSpec) -> Self {
        spec.to_string()
    }
}

/// A damage or healing field as written in content and saves: dice, the
/// literal "None", or legacy text that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Notation {
    #[default]
    None,
    Dice(DiceSpec),
    Raw(String),
}

impl Notation {
    pub fn parse(text: &str) -> Self {
        match text.parse::<DiceSpec>() {
            Ok(spec) => Notation::Dice(spec),
            Err(DiceError::NoDice) => Notation::None,
            Err(DiceError::Malformed(_)) => Notation::Raw(text.to_string()),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Notation::None)
    }

    pub fn spec(&self) -> Option<DiceSpec> {
        match self {
            Notation::Dice(spec) => Some(*spec),
            _ => None,
        }
    }
}

impl fmt::Display for Notation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notation::None => f.write_str("None"),
            Notation::Dice(spec) => spec.fmt(f),
            Notation::Raw(text) => f.write_str(text),
        }
    }
}

impl From<String> for Notation {
    fn from(value: String) -> Self {
        Notation::parse(&value)
    }
}

impl From<Notation> for String {
    fn from(value: Notation) -> Self {
        value.to_string()
    }
}

impl From<DiceSpec> for Notation {
    fn from(spec: DiceSpec) -> Self {
        Notation::Dice(spec)
    }
}

/// Seeded random source for every roll the engine makes.
#[derive(Debug, Clone)]
pub struct Dice {
    rng: ChaCha8Rng,
    script: VecDeque<u32>,
}

impl Dice {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            script: VecDeque::new(),
        }
    }

    pub fn from_entropy() -> Self {
        Self::from_seed(rand::random())
    }

    /// Die faces are taken from `faces` in order (clamped to the die), then
    /// from a zero-seeded stream. Probability draws always use the stream.
    pub fn from_scripted(faces: Vec<u32>) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(0),
            script: faces.into(),
        }
    }

    pub fn die(&mut self, sides: u32) -> u32 {
        if sides == 0 {
            return 0;
        }
        match self.script.pop_front() {
            Some(face) => face.clamp(1, sides),
            None => self.rng.gen_range(1..=sides),
        }
    }

    pub fn roll(&mut self, spec: DiceSpec) -> u32 {
        (0..spec.count).fold(0u32, |total, _| total.saturating_add(self.die(spec.sides)))
    }

    pub fn roll_notation(&mut self, notation: &Notation) -> Result<u32, DiceError> {
        match notation {
            Notation::Dice(spec) => Ok(self.roll(*spec)),
            Notation::None => Err(DiceError::NoDice),
            Notation::Raw(text) => Err(DiceError::Malformed(text.clone())),
        }
    }

    /// True with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.gen_range(0.0..1.0) < p
    }

    pub fn uniform(&mut self, low: f64, high: f64) -> f64 {
        if high <= low {
            return low;
        }
        self.rng.gen_range(low..=high)
    }

    pub fn range(&mut self, low: u64, high: u64) -> u64 {
        if high <= low {
            return low;
        }
        self.rng.gen_range(low..=high)
    }

    pub fn index(&mut self, len: usize) -> Option<usize> {
        (len > 0).then(|| self.rng.gen_range(0..len))
    }

    /// Weighted pick; `None` when no weight is positive.
    pub fn weighted(&mut self, weights: &[u32]) -> Option<usize> {
        WeightedIndex::new(weights)
            .ok()
            .map(|dist| dist.sample(&mut self.rng))
    }

    /// `amount` distinct indices out of `len`, in random order.
    pub fn sample(&mut self, len: usize, amount: usize) -> Vec<usize> {
        rand::seq::index::sample(&mut self.rng, len, amount.min(len)).into_vec()
    }
}

/// Parse and roll in one step. "none" and malformed text both roll nothing.
pub fn roll_dice(dice: &mut Dice, text: &str) -> Result<u32, DiceError> {
    let spec: DiceSpec = text.parse()?;
    Ok(dice.roll(spec))
}
