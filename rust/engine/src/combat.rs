//! Challenge resolution.
//!
//! The outcome of every ordered (attacker, defender) rank pair is derived
//! once from [`derive_outcome`] into a 15×15 [`CombatTable`]; live play and
//! replay both read from that table.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::OnceLock;

use crate::pieces::Rank;

/// Which piece survives a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Attacker,
    Defender,
    Tie,
}

/// Ordered rule list, first match wins.
///
/// 1. Flags: a Flag only beats a Flag it attacks; any piece attacking a
///    Flag captures it.
/// 2. Spies: Spy vs Spy ties, a Private beats a Spy from either side, a Spy
///    beats every officer from either side.
/// 3. Everything else compares numeric strength.
pub fn derive_outcome(attacker: Rank, defender: Rank) -> Outcome {
    use Rank::{Flag, Private, Spy};
    match (attacker, defender) {
        (Flag, Flag) => Outcome::Attacker,
        (Flag, _) => Outcome::Defender,
        (_, Flag) => Outcome::Attacker,
        (Spy, Spy) => Outcome::Tie,
        (Spy, Private) => Outcome::Defender,
        (Spy, _) => Outcome::Attacker,
        (Private, Spy) => Outcome::Attacker,
        (_, Spy) => Outcome::Defender,
        (a, d) => compare_strength(a, d),
    }
}

fn compare_strength(attacker: Rank, defender: Rank) -> Outcome {
    // Flag and Spy never reach this point.
    let a = attacker.strength().unwrap_or(0);
    let d = defender.strength().unwrap_or(0);
    match a.cmp(&d) {
        Ordering::Greater => Outcome::Attacker,
        Ordering::Less => Outcome::Defender,
        Ordering::Equal => Outcome::Tie,
    }
}

/// Precomputed outcome matrix indexed by `[attacker][defender]`.
#[derive(Debug, Clone)]
pub struct CombatTable {
    outcomes: [[Outcome; 15]; 15],
}

impl CombatTable {
    pub fn build() -> Self {
        let mut outcomes = [[Outcome::Tie; 15]; 15];
        for attacker in Rank::ALL {
            for defender in Rank::ALL {
                outcomes[attacker.index()][defender.index()] = derive_outcome(attacker, defender);
            }
        }
        Self { outcomes }
    }

    pub fn outcome(&self, attacker: Rank, defender: Rank) -> Outcome {
        self.outcomes[attacker.index()][defender.index()]
    }
}

static TABLE: OnceLock<CombatTable> = OnceLock::new();

pub fn table() -> &'static CombatTable {
    TABLE.get_or_init(CombatTable::build)
}

/// Resolves a challenge between two ranks.
///
/// ```
/// use gotg_engine::combat::{resolve, Outcome};
/// use gotg_engine::pieces::Rank;
///
/// assert_eq!(resolve(Rank::Private, Rank::Spy), Outcome::Attacker);
/// assert_eq!(resolve(Rank::Spy, Rank::FiveStarGeneral), Outcome::Attacker);
/// assert_eq!(resolve(Rank::Captain, Rank::Captain), Outcome::Tie);
/// ```
pub fn resolve(attacker: Rank, defender: Rank) -> Outcome {
    table().outcome(attacker, defender)
}
