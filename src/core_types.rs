//! Core types used throughout the system
//!
//! These are fundamental type aliases and small value types shared by
//! every module. They provide semantic meaning and enable future type
//! evolution without touching call sites.

use std::fmt;
use std::str::FromStr;

/// User ID - globally unique, immutable after assignment.
///
/// # Usage:
/// - Primary key for wallet rows and player stats
/// - Subject of the JWT bearer token
pub type UserId = u64;

/// Number of players admitted into a single match.
pub type PartySize = u8;

/// Virtual-currency stake amount, drawn from a fixed denomination set.
pub type Stake = u64;

/// 1-indexed round counter within a match.
pub type RoundNo = u32;

/// The allowed party sizes, smallest first.
pub const PARTY_SIZES: [PartySize; 4] = [2, 3, 4, 5];

/// The allowed stake denominations, smallest first.
pub const STAKES: [Stake; 7] = [100, 200, 500, 1000, 2500, 5000, 10000];

/// `true` if `size` is one of the allowed party sizes.
#[inline]
pub fn is_valid_party_size(size: PartySize) -> bool {
    PARTY_SIZES.contains(&size)
}

/// `true` if `stake` is one of the allowed denominations.
#[inline]
pub fn is_valid_stake(stake: Stake) -> bool {
    STAKES.contains(&stake)
}

/// A ULID-based, sortable, coordination-free unique identifier.
///
/// Used for both ticket IDs and match IDs. ULIDs are monotonic and
/// embed a millisecond timestamp, which keeps `queue:*` and `match:*`
/// keys roughly time-ordered without a separate sequence allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id(ulid::Ulid);

impl Id {
    /// Generate a new unique ID.
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Id {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

impl serde::Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A player's choice in a single round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Choice {
    Rock,
    Paper,
    Scissors,
}

impl Choice {
    pub const ALL: [Choice; 3] = [Choice::Rock, Choice::Paper, Choice::Scissors];

    /// The choice that `self` beats under ROCK -> SCISSORS -> PAPER -> ROCK.
    #[inline]
    pub fn beats(self) -> Choice {
        match self {
            Choice::Rock => Choice::Scissors,
            Choice::Scissors => Choice::Paper,
            Choice::Paper => Choice::Rock,
        }
    }

    /// Pick a uniformly random choice.
    pub fn random() -> Choice {
        use rand::seq::SliceRandom;
        *Choice::ALL.choose(&mut rand::thread_rng()).expect("ALL is non-empty")
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Choice::Rock => "ROCK",
            Choice::Paper => "PAPER",
            Choice::Scissors => "SCISSORS",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Choice {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ROCK" => Ok(Choice::Rock),
            "PAPER" => Ok(Choice::Paper),
            "SCISSORS" => Ok(Choice::Scissors),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beats_cycle() {
        assert_eq!(Choice::Rock.beats(), Choice::Scissors);
        assert_eq!(Choice::Scissors.beats(), Choice::Paper);
        assert_eq!(Choice::Paper.beats(), Choice::Rock);
    }

    #[test]
    fn party_size_and_stake_validation() {
        assert!(is_valid_party_size(2));
        assert!(is_valid_party_size(5));
        assert!(!is_valid_party_size(1));
        assert!(!is_valid_party_size(6));

        assert!(is_valid_stake(100));
        assert!(is_valid_stake(10000));
        assert!(!is_valid_stake(0));
        assert!(!is_valid_stake(150));
    }

    #[test]
    fn id_roundtrips_through_display_and_parse() {
        let id = Id::new();
        let text = id.to_string();
        let parsed: Id = text.parse().unwrap();
        assert_eq!(id, parsed);
    }
}
