use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::action::ActionIndex;

/// Strength setting for agent-driven opponents.
///
/// Weaker levels replace the agent's choice with a uniformly random legal
/// action at a fixed rate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn level(self) -> u8 {
        match self {
            Difficulty::Easy => 1,
            Difficulty::Medium => 2,
            Difficulty::Hard => 3,
        }
    }

    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Difficulty::Easy),
            2 => Some(Difficulty::Medium),
            3 => Some(Difficulty::Hard),
            _ => None,
        }
    }

    /// Probability of overriding the agent's choice.
    pub fn blunder_rate(self) -> f64 {
        match self {
            Difficulty::Easy => 0.6,
            Difficulty::Medium => 0.25,
            Difficulty::Hard => 0.0,
        }
    }

    pub fn adjust<R: Rng>(
        self,
        chosen: ActionIndex,
        legal_actions: &[ActionIndex],
        rng: &mut R,
    ) -> ActionIndex {
        if rng.gen_bool(self.blunder_rate()) {
            legal_actions.choose(rng).copied().unwrap_or(chosen)
        } else {
            chosen
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        };
        f.write_str(name)
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" | "1" => Ok(Difficulty::Easy),
            "medium" | "2" => Ok(Difficulty::Medium),
            "hard" | "3" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn hard_never_overrides() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..200 {
            assert_eq!(Difficulty::Hard.adjust(7, &[1, 7, 60], &mut rng), 7);
        }
    }

    #[test]
    fn overrides_stay_legal() {
        let mut rng = StdRng::seed_from_u64(1);
        let legal = [3, 18, 60];
        let mut overridden = 0;
        for _ in 0..500 {
            let action = Difficulty::Easy.adjust(18, &legal, &mut rng);
            assert!(legal.contains(&action));
            if action != 18 {
                overridden += 1;
            }
        }
        assert!(overridden > 0);
    }

    #[test]
    fn levels_and_names_round_trip() {
        for difficulty in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            assert_eq!(Difficulty::from_level(difficulty.level()), Some(difficulty));
            assert_eq!(difficulty.to_string().parse::<Difficulty>(), Ok(difficulty));
        }
        assert_eq!(Difficulty::default(), Difficulty::Medium);
        assert!(Difficulty::from_level(4).is_none());
    }
}
