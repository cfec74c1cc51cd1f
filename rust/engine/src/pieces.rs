use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Piece identity. Flag and Spy sit outside the numeric ordering; every
/// other rank carries a strength from 1 (Private) to 13 (5-star General).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    Flag,
    Spy,
    Private,
    Sergeant,
    SecondLieutenant,
    FirstLieutenant,
    Captain,
    Major,
    LieutenantColonel,
    Colonel,
    OneStarGeneral,
    TwoStarGeneral,
    ThreeStarGeneral,
    FourStarGeneral,
    FiveStarGeneral,
}

impl Rank {
    pub const ALL: [Rank; 15] = [
        Rank::Flag,
        Rank::Spy,
        Rank::Private,
        Rank::Sergeant,
        Rank::SecondLieutenant,
        Rank::FirstLieutenant,
        Rank::Captain,
        Rank::Major,
        Rank::LieutenantColonel,
        Rank::Colonel,
        Rank::OneStarGeneral,
        Rank::TwoStarGeneral,
        Rank::ThreeStarGeneral,
        Rank::FourStarGeneral,
        Rank::FiveStarGeneral,
    ];

    /// Numeric strength used by the default combat comparison.
    pub fn strength(self) -> Option<u8> {
        match self {
            Rank::Flag | Rank::Spy => None,
            Rank::Private => Some(1),
            Rank::Sergeant => Some(2),
            Rank::SecondLieutenant => Some(3),
            Rank::FirstLieutenant => Some(4),
            Rank::Captain => Some(5),
            Rank::Major => Some(6),
            Rank::LieutenantColonel => Some(7),
            Rank::Colonel => Some(8),
            Rank::OneStarGeneral => Some(9),
            Rank::TwoStarGeneral => Some(10),
            Rank::ThreeStarGeneral => Some(11),
            Rank::FourStarGeneral => Some(12),
            Rank::FiveStarGeneral => Some(13),
        }
    }

    /// Sergeant through 5-star General.
    pub fn is_officer(self) -> bool {
        matches!(self.strength(), Some(s) if s >= 2)
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// One of the two seats at the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Player1,
    Player2,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Player1 => Side::Player2,
            Side::Player2 => Side::Player1,
        }
    }

    /// Rows a side may place pieces on during setup.
    pub fn home_rows(self) -> RangeInclusive<u8> {
        match self {
            Side::Player1 => 5..=7,
            Side::Player2 => 0..=2,
        }
    }

    /// The opponent's back row, where this side's Flag scores.
    pub fn target_row(self) -> u8 {
        match self {
            Side::Player1 => 0,
            Side::Player2 => 7,
        }
    }
}

/// Fixed per-side piece roster.
pub const ROSTER: [(Rank, usize); 15] = [
    (Rank::Flag, 1),
    (Rank::Spy, 2),
    (Rank::Private, 6),
    (Rank::Sergeant, 1),
    (Rank::SecondLieutenant, 1),
    (Rank::FirstLieutenant, 1),
    (Rank::Captain, 1),
    (Rank::Major, 1),
    (Rank::LieutenantColonel, 1),
    (Rank::Colonel, 1),
    (Rank::OneStarGeneral, 1),
    (Rank::TwoStarGeneral, 1),
    (Rank::ThreeStarGeneral, 1),
    (Rank::FourStarGeneral, 1),
    (Rank::FiveStarGeneral, 1),
];

pub const PIECES_PER_SIDE: usize = 21;

pub fn roster_count(rank: Rank) -> usize {
    ROSTER
        .iter()
        .find(|(r, _)| *r == rank)
        .map(|(_, n)| *n)
        .unwrap_or(0)
}
