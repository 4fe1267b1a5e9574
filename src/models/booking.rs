use chrono::{NaiveDateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{CustomerId, SeatId, ShowId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Failed,
}

/// Запись о покупке. Создаётся только BookingService; после подтверждения
/// единственная допустимая мутация — переход Confirmed -> Cancelled.
#[derive(Debug, Clone, Serialize)]
pub struct Booking {
    pub id: Uuid,
    pub customer_id: CustomerId,
    pub show_id: ShowId,
    pub seat_ids: Vec<SeatId>,
    pub total_price: f64,
    pub status: BookingStatus,
    pub created_at: NaiveDateTime,
}

impl Booking {
    pub fn pending(
        id: Uuid,
        customer_id: CustomerId,
        show_id: ShowId,
        mut seat_ids: Vec<SeatId>,
        total_price: f64,
    ) -> Self {
        seat_ids.sort_unstable();
        Self {
            id,
            customer_id,
            show_id,
            seat_ids,
            total_price,
            status: BookingStatus::Pending,
            created_at: Utc::now().naive_utc(),
        }
    }
}
