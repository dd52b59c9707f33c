//! Port directions and per-direction flag pairs.
//!
//! A MIDI endpoint has two independent halves: an **input** side (messages
//! arriving from the device) and an **output** side (messages sent to it).
//! Activation and capability are tracked per half.
//!
//! Internally both halves are plain named booleans ([`DirectionSet`]). The wire
//! format packs them into a small integer (bit0 = input, bit1 = output); that
//! packing only happens at the config boundary via [`DirectionSet::from_mask`]
//! and [`DirectionSet::to_mask`].

use std::fmt;

/// One half of a MIDI endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    /// Both directions, input first.
    pub const ALL: [Direction; 2] = [Direction::Input, Direction::Output];
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => f.write_str("input"),
            Direction::Output => f.write_str("output"),
        }
    }
}

/// Direction selector used by state queries.
///
/// `Either` is the coarse form: it matches when *any* half is set, not both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortQuery {
    Input,
    Output,
    Either,
}

impl From<Direction> for PortQuery {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Input => PortQuery::Input,
            Direction::Output => PortQuery::Output,
        }
    }
}

/// A pair of flags, one per direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DirectionSet {
    pub input: bool,
    pub output: bool,
}

impl DirectionSet {
    pub const NONE: DirectionSet = DirectionSet {
        input: false,
        output: false,
    };

    pub const BOTH: DirectionSet = DirectionSet {
        input: true,
        output: true,
    };

    const INPUT_BIT: i64 = 0b01;
    const OUTPUT_BIT: i64 = 0b10;

    /// Decode the wire bitmask. Bits above bit1 are ignored.
    pub fn from_mask(mask: i64) -> Self {
        Self {
            input: mask & Self::INPUT_BIT != 0,
            output: mask & Self::OUTPUT_BIT != 0,
        }
    }

    /// Encode as the wire bitmask.
    pub fn to_mask(self) -> i64 {
        let mut mask = 0;
        if self.input {
            mask |= Self::INPUT_BIT;
        }
        if self.output {
            mask |= Self::OUTPUT_BIT;
        }
        mask
    }

    #[inline]
    pub fn get(self, direction: Direction) -> bool {
        match direction {
            Direction::Input => self.input,
            Direction::Output => self.output,
        }
    }

    #[inline]
    pub fn set(&mut self, direction: Direction, value: bool) {
        match direction {
            Direction::Input => self.input = value,
            Direction::Output => self.output = value,
        }
    }

    /// Evaluate a query. `Either` is true when any flag is set.
    pub fn matches(self, query: PortQuery) -> bool {
        match query {
            PortQuery::Input => self.input,
            PortQuery::Output => self.output,
            PortQuery::Either => self.input || self.output,
        }
    }

    pub fn any(self) -> bool {
        self.input || self.output
    }
}
