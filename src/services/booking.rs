//! booking.rs
//!
//! Оркестрация одной попытки бронирования от начала до конца:
//! claim -> цена -> платёжный оракул -> commit/release -> запись в истории.
//!
//! Ледгер — единственный мутатор статусов мест; ошибки ледгера проходят
//! сквозь сервис без изменений. Единственное локальное правило
//! восстановления: после успешного try_claim любой дальнейший сбой
//! обязан освободить удержание до возврата из `book`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::catalog::ShowCatalog;
use crate::error::{Result, TicketError};
use crate::ledger::{ClaimToken, SeatLedger};
use crate::models::{Booking, BookingStatus, CustomerId, SeatId, ShowId};
use crate::pricing::PricingPolicy;
use crate::services::payment::{ChargeOutcome, PaymentGateway};

/// История бронирований: подтверждённые, отменённые и неудавшиеся
/// попытки доступны по id и по владельцу.
pub struct BookingStore {
    bookings: RwLock<HashMap<Uuid, Booking>>,
}

impl BookingStore {
    pub fn new() -> Self {
        Self {
            bookings: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, booking_id: Uuid) -> Option<Booking> {
        self.bookings.read().unwrap().get(&booking_id).cloned()
    }

    pub fn for_customer(&self, customer_id: CustomerId) -> Vec<Booking> {
        self.bookings
            .read()
            .unwrap()
            .values()
            .filter(|b| b.customer_id == customer_id)
            .cloned()
            .collect()
    }

    fn insert(&self, booking: Booking) {
        self.bookings.write().unwrap().insert(booking.id, booking);
    }

    /// Проверка владельца и статуса, освобождение мест и переход в
    /// Cancelled выполняются под одной write-блокировкой: двойная отмена
    /// и гонка с перепродажей отменённых мест исключены.
    fn cancel(
        &self,
        customer_id: CustomerId,
        booking_id: Uuid,
        release: impl FnOnce(&Booking) -> Result<()>,
    ) -> Result<Booking> {
        let mut bookings = self.bookings.write().unwrap();
        let booking = bookings
            .get_mut(&booking_id)
            .filter(|b| b.customer_id == customer_id)
            .ok_or(TicketError::BookingNotFound)?;

        if booking.status != BookingStatus::Confirmed {
            return Err(TicketError::InvalidTransition(format!(
                "бронирование {} в статусе {:?}, отменить нельзя",
                booking_id, booking.status
            )));
        }

        // Сбой ледгера оставляет запись нетронутой.
        release(booking)?;
        booking.status = BookingStatus::Cancelled;
        Ok(booking.clone())
    }
}

impl Default for BookingStore {
    fn default() -> Self {
        Self::new()
    }
}

pub struct BookingService {
    catalog: Arc<ShowCatalog>,
    ledger: Arc<SeatLedger>,
    pricing: Arc<PricingPolicy>,
    store: Arc<BookingStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl BookingService {
    pub fn new(
        catalog: Arc<ShowCatalog>,
        ledger: Arc<SeatLedger>,
        pricing: Arc<PricingPolicy>,
        store: Arc<BookingStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            catalog,
            ledger,
            pricing,
            store,
            gateway,
        }
    }

    /// Одна попытка бронирования. `SeatUnavailable` от ледгера проходит
    /// без изменений; отклонённый или сбойный платёж возвращает
    /// `PaymentDeclined`, и места к этому моменту уже освобождены.
    pub async fn book(
        &self,
        customer_id: CustomerId,
        show_id: ShowId,
        seat_ids: &[SeatId],
        base_price: f64,
    ) -> Result<Booking> {
        if seat_ids.is_empty() {
            return Err(TicketError::InvalidInput(
                "пустой набор мест".to_string(),
            ));
        }
        if !base_price.is_finite() || base_price <= 0.0 {
            return Err(TicketError::InvalidInput(
                "базовая цена должна быть > 0".to_string(),
            ));
        }

        let token = self.ledger.try_claim(show_id, seat_ids)?;

        let total = match self.total_price(show_id, token.seat_ids(), base_price) {
            Ok(total) => total,
            Err(e) => {
                self.abort_claim(token);
                return Err(e);
            }
        };

        let booking_id = Uuid::new_v4();

        // Вызов оракула строго вне критических секций ледгера: медленный
        // шлюз не задерживает чужие заявки на непересекающиеся места.
        match self.gateway.charge(total, &booking_id.to_string()).await {
            Ok(ChargeOutcome::Approved) => {
                let seat_ids = token.seat_ids().to_vec();
                if let Err(e) = self.ledger.commit(token) {
                    // Деньги списаны, а удержание истекло до коммита:
                    // деградация, требуется вмешательство оператора.
                    error!(
                        customer_id,
                        %booking_id,
                        "payment approved but commit failed, refund required: {}",
                        e
                    );
                    self.record(booking_id, customer_id, show_id, seat_ids, total, BookingStatus::Failed);
                    return Err(e);
                }

                let booking = self.record(
                    booking_id,
                    customer_id,
                    show_id,
                    seat_ids,
                    total,
                    BookingStatus::Confirmed,
                );
                info!(
                    customer_id,
                    %booking_id,
                    total,
                    seats = ?booking.seat_ids,
                    "booking confirmed"
                );
                Ok(booking)
            }
            outcome => {
                if let Err(gateway_err) = &outcome {
                    warn!(
                        customer_id,
                        %booking_id,
                        "payment gateway failure treated as decline: {}",
                        gateway_err
                    );
                }
                let seat_ids = token.seat_ids().to_vec();
                self.abort_claim(token);
                self.record(booking_id, customer_id, show_id, seat_ids, total, BookingStatus::Failed);
                Err(TicketError::PaymentDeclined)
            }
        }
    }

    /// Отмена подтверждённого бронирования. Места освобождаются до
    /// возврата успеха; сбой ледгера оставляет бронирование как было.
    pub fn cancel(&self, customer_id: CustomerId, booking_id: Uuid) -> Result<()> {
        let cancelled = self.store.cancel(customer_id, booking_id, |booking| {
            self.ledger.cancel_booked(booking.show_id, &booking.seat_ids)
        })?;
        info!(
            customer_id,
            %booking_id,
            seats = ?cancelled.seat_ids,
            "booking cancelled"
        );
        Ok(())
    }

    fn total_price(&self, show_id: ShowId, seat_ids: &[SeatId], base_price: f64) -> Result<f64> {
        let show = self.catalog.get(show_id).ok_or_else(|| {
            TicketError::InvalidInput(format!("показ {} не найден в каталоге", show_id))
        })?;

        let mut total = 0.0;
        for &seat_id in seat_ids {
            let seat = show.seat(seat_id).ok_or_else(|| {
                TicketError::InvalidInput(format!(
                    "место {} не принадлежит показу {}",
                    seat_id, show_id
                ))
            })?;
            total += self.pricing.price(base_price, &seat.category)?;
        }
        Ok(total)
    }

    /// Обязательное освобождение удержания после неудавшейся попытки.
    /// Единственная легитимная причина отказа здесь — удержание уже
    /// снято по таймауту, то есть места и так свободны.
    fn abort_claim(&self, token: ClaimToken) {
        let show_id = token.show_id();
        let seats = token.seat_ids().to_vec();
        if let Err(e) = self.ledger.release(token) {
            warn!(show_id, seats = ?seats, "release after failed attempt: {}", e);
        }
    }

    fn record(
        &self,
        booking_id: Uuid,
        customer_id: CustomerId,
        show_id: ShowId,
        seat_ids: Vec<SeatId>,
        total: f64,
        status: BookingStatus,
    ) -> Booking {
        let mut booking = Booking::pending(booking_id, customer_id, show_id, seat_ids, total);
        booking.status = status;
        self.store.insert(booking.clone());
        booking
    }
}
