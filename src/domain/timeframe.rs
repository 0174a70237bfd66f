//! Timeframe and period identifiers.
//!
//! A timeframe is the sampling interval of a bar series (`1D`, `2H`, `1W`,
//! `1M`). A period indexes into the most recent history of that series:
//! `P0` is the current bar, `P1`..`P5` step one interval further back each.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of periods a timeframe series can hold (`P0`..`P5`).
pub const MAX_PERIODS: usize = 6;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Timeframe {
    #[serde(rename = "1D")]
    Daily,
    #[serde(rename = "2H")]
    TwoHour,
    #[serde(rename = "1W")]
    Weekly,
    #[serde(rename = "1M")]
    Monthly,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [
        Timeframe::Daily,
        Timeframe::TwoHour,
        Timeframe::Weekly,
        Timeframe::Monthly,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Timeframe::Daily => "1D",
            Timeframe::TwoHour => "2H",
            Timeframe::Weekly => "1W",
            Timeframe::Monthly => "1M",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1D" => Some(Timeframe::Daily),
            "2H" => Some(Timeframe::TwoHour),
            "1W" => Some(Timeframe::Weekly),
            "1M" => Some(Timeframe::Monthly),
            _ => None,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Timeframe::from_code(s)
            .ok_or_else(|| format!("unknown timeframe '{}' (expected 1D, 2H, 1W or 1M)", s))
    }
}

/// Index into a timeframe's recent history. Always in `0..MAX_PERIODS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period(u8);

impl Period {
    pub const CURRENT: Period = Period(0);

    pub fn new(index: usize) -> Option<Self> {
        if index < MAX_PERIODS {
            Some(Period(index as u8))
        } else {
            None
        }
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn is_current(&self) -> bool {
        self.0 == 0
    }

    /// The period one interval further into the past, if it is still tracked.
    pub fn previous(&self) -> Option<Self> {
        Period::new(self.index() + 1)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix('P')
            .ok_or_else(|| format!("invalid period '{}' (expected P0..P5)", s))?;
        digits
            .parse::<usize>()
            .ok()
            .and_then(Period::new)
            .ok_or_else(|| format!("invalid period '{}' (expected P0..P5)", s))
    }
}

impl Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
