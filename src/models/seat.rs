use serde::{Deserialize, Serialize};
use std::fmt;

use super::SeatId;

/// Статус места. Меняется только через SeatLedger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeatStatus {
    Available,
    Held,
    Booked,
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeatStatus::Available => write!(f, "AVAILABLE"),
            SeatStatus::Held => write!(f, "HELD"),
            SeatStatus::Booked => write!(f, "BOOKED"),
        }
    }
}

/// Категория места — открытое множество меток.
/// Новые категории регистрируются в таблице цен, без правок кода.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeatCategory(String);

impl SeatCategory {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn gold() -> Self {
        Self::new("gold")
    }

    pub fn premium() -> Self {
        Self::new("premium")
    }

    pub fn standard() -> Self {
        Self::new("standard")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub id: SeatId,
    pub row: i32,
    pub number: i32,
    pub category: SeatCategory,
}

impl Seat {
    pub fn new(id: SeatId, row: i32, number: i32, category: SeatCategory) -> Self {
        Self {
            id,
            row,
            number,
            category,
        }
    }
}
