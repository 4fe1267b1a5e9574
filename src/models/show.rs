use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashSet;

use super::{Seat, SeatId, ShowId};
use crate::error::{Result, TicketError};

/// Показ: фиксированное временное окно и фиксированный набор мест.
/// Набор мест после создания не меняется.
#[derive(Debug, Clone, Serialize)]
pub struct Show {
    pub id: ShowId,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    seats: Vec<Seat>,
}

impl Show {
    /// Валидация на месте конструктора: окно корректно, места есть,
    /// идентификаторы мест уникальны.
    pub fn new(
        id: ShowId,
        starts_at: NaiveDateTime,
        ends_at: NaiveDateTime,
        seats: Vec<Seat>,
    ) -> Result<Self> {
        if ends_at <= starts_at {
            return Err(TicketError::InvalidInput(format!(
                "окончание показа {} должно быть позже начала",
                id
            )));
        }
        if seats.is_empty() {
            return Err(TicketError::InvalidInput(format!(
                "показ {} без мест",
                id
            )));
        }
        let mut seen = HashSet::with_capacity(seats.len());
        for seat in &seats {
            if !seen.insert(seat.id) {
                return Err(TicketError::InvalidInput(format!(
                    "дублирующийся id места {} в показе {}",
                    seat.id, id
                )));
            }
        }
        Ok(Self {
            id,
            starts_at,
            ends_at,
            seats,
        })
    }

    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    pub fn seat(&self, seat_id: SeatId) -> Option<&Seat> {
        self.seats.iter().find(|s| s.id == seat_id)
    }

    pub fn contains(&self, seat_id: SeatId) -> bool {
        self.seat(seat_id).is_some()
    }
}
