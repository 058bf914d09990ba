use crate::flows::{CHANNELS, CellSeries};
use std::fmt;

/// Dominant flow direction of a river cell. Discriminants follow the stored
/// channel order, which differs from SHETRAN's internal face numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

impl Direction {
    pub const ALL: [Direction; CHANNELS] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn channel(self) -> usize {
        self as usize
    }

    pub fn from_channel(channel: usize) -> Option<Self> {
        Self::ALL.get(channel).copied()
    }

    /// SHETRAN face numbering: east=1, north=2, west=3, south=4.
    pub fn from_shetran_face(face: u8) -> Option<Self> {
        match face {
            1 => Some(Direction::East),
            2 => Some(Direction::North),
            3 => Some(Direction::West),
            4 => Some(Direction::South),
            _ => None,
        }
    }

    /// Return-period flows towards the south or west are reported negative.
    pub fn sign(self) -> f64 {
        match self {
            Direction::South | Direction::West => -1.0,
            Direction::North | Direction::East => 1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::North => write!(f, "north"),
            Direction::East => write!(f, "east"),
            Direction::South => write!(f, "south"),
            Direction::West => write!(f, "west"),
        }
    }
}

/// Pick the channel with the largest absolute net flow over the first
/// `lead` timesteps. Ties (including an all-zero cell) go to the lowest
/// channel, so an idle cell resolves to north.
pub fn resolve_direction(series: &CellSeries<'_>, lead: usize) -> Direction {
    let lead = lead.min(series.len());
    let mut best = Direction::North;
    let mut best_sum = f64::NEG_INFINITY;
    for direction in Direction::ALL {
        let net: f64 = series.channel(direction.channel())[..lead]
            .iter()
            .map(|&q| q as f64)
            .sum();
        let magnitude = net.abs();
        if magnitude > best_sum {
            best = direction;
            best_sum = magnitude;
        }
    }
    best
}
