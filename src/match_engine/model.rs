//! The `Match` entity and its sub-types.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core_types::{Choice, Id, PartySize, RoundNo, Stake, UserId};
use crate::fee::FeeSchedule;

/// Identifies a participant: either a real user or a synthetic bot
/// filler (`BOT1`..`BOT50`). Serializes to the bare string form so it
/// can be used directly as a JSON object key, matching the wire
/// format used elsewhere for user-keyed maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PlayerId {
    User(UserId),
    Bot(String),
}

impl PlayerId {
    pub fn is_bot(&self) -> bool {
        matches!(self, PlayerId::Bot(_))
    }

    pub fn as_user(&self) -> Option<UserId> {
        match self {
            PlayerId::User(id) => Some(*id),
            PlayerId::Bot(_) => None,
        }
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerId::User(id) => write!(f, "{id}"),
            PlayerId::Bot(label) => write!(f, "{label}"),
        }
    }
}

impl Serialize for PlayerId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PlayerId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(if let Ok(id) = s.parse::<UserId>() {
            PlayerId::User(id)
        } else {
            PlayerId::Bot(s)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Ready,
    InProgress,
    Finished,
    Cancelled,
}

impl MatchStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, MatchStatus::Finished | MatchStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Mode {
    Real,
    Practice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoundOutcome {
    Tie,
    Elimination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TieReason {
    AllSame,
    AllThree,
}

/// The outcome of the most recently resolved round, kept on the match
/// so clients reconnecting mid-match can render the last result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastRound {
    pub outcome: RoundOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<TieReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winning_move: Option<Choice>,
    #[serde(default)]
    pub winners: Vec<PlayerId>,
    #[serde(default)]
    pub losers: Vec<PlayerId>,
    pub round_no: RoundNo,
    pub moves: HashMap<PlayerId, Choice>,
}

/// A match in progress or terminal, as stored under `match:<matchId>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub match_id: Id,
    pub party_size: PartySize,
    pub stake: Stake,
    pub pot: u64,
    pub fee_rate_percent: u64,
    pub fee: u64,
    pub payout: u64,

    pub player_ids: Vec<PlayerId>,
    pub alive_ids: Vec<PlayerId>,
    pub eliminated_ids: Vec<PlayerId>,

    pub bot_names: HashMap<PlayerId, String>,
    pub player_names: HashMap<PlayerId, String>,

    pub round: RoundNo,
    pub moves: HashMap<PlayerId, Choice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_round: Option<LastRound>,

    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub move_deadline_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub move_timer_started_ms: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<PlayerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    pub settled: bool,
    pub mode: Mode,

    /// True once every alive real player has moved and only bot
    /// fillers remain — a sub-case of `IN_PROGRESS`.
    #[serde(default)]
    pub bot_match: bool,
}

impl Match {
    pub fn new(
        match_id: Id,
        party_size: PartySize,
        stake: Stake,
        fee_schedule: FeeSchedule,
        player_ids: Vec<PlayerId>,
        player_names: HashMap<PlayerId, String>,
        bot_names: HashMap<PlayerId, String>,
        mode: Mode,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            match_id,
            party_size,
            stake,
            pot: fee_schedule.pot,
            fee_rate_percent: crate::fee::FEE_RATE_PERCENT,
            fee: fee_schedule.fee,
            payout: fee_schedule.payout,
            alive_ids: player_ids.clone(),
            eliminated_ids: Vec::new(),
            player_ids,
            bot_names,
            player_names,
            round: 1,
            moves: HashMap::new(),
            last_round: None,
            status: MatchStatus::Ready,
            created_at: now,
            move_deadline_ms: None,
            move_timer_started_ms: None,
            winner_id: None,
            finished_at: None,
            settled: false,
            mode,
            bot_match: false,
        }
    }

    pub fn real_player_ids(&self) -> impl Iterator<Item = UserId> + '_ {
        self.player_ids.iter().filter_map(|p| p.as_user())
    }

    pub fn alive_real_players(&self) -> impl Iterator<Item = &PlayerId> + '_ {
        self.alive_ids.iter().filter(|p| !p.is_bot())
    }

    pub fn has_bot_fillers(&self) -> bool {
        self.player_ids.iter().any(PlayerId::is_bot)
    }
}

/// KV key for a match snapshot.
pub fn match_key(match_id: Id) -> String {
    format!("match:{match_id}")
}

/// TTL (seconds) for an active, non-terminal match.
pub const MATCH_TTL_ACTIVE_SECS: u64 = 600;
/// TTL (seconds) for a terminal match, kept around briefly for clients
/// still polling/reconnecting.
pub const MATCH_TTL_TERMINAL_SECS: u64 = 3600;

/// The KV TTL a snapshot should carry given its current status.
pub fn ttl_for_status(status: MatchStatus) -> u64 {
    if status.is_terminal() {
        MATCH_TTL_TERMINAL_SECS
    } else {
        MATCH_TTL_ACTIVE_SECS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_id_roundtrips_user_and_bot() {
        let user = PlayerId::User(42);
        let bot = PlayerId::Bot("BOT3".to_string());
        assert_eq!(user.to_string(), "42");
        assert_eq!(bot.to_string(), "BOT3");

        let user_json = serde_json::to_string(&user).unwrap();
        assert_eq!(user_json, "\"42\"");
        let parsed: PlayerId = serde_json::from_str(&user_json).unwrap();
        assert_eq!(parsed, user);

        let bot_json = serde_json::to_string(&bot).unwrap();
        let parsed_bot: PlayerId = serde_json::from_str(&bot_json).unwrap();
        assert_eq!(parsed_bot, bot);
    }

    #[test]
    fn map_with_player_id_keys_serializes_as_object() {
        let mut moves = HashMap::new();
        moves.insert(PlayerId::User(1), Choice::Rock);
        let json = serde_json::to_value(&moves).unwrap();
        assert_eq!(json["1"], serde_json::json!("ROCK"));
    }
}
