use thiserror::Error;

use crate::models::SeatId;

/// Общая таксономия ошибок ядра бронирования.
///
/// `SeatUnavailable` и `NotBooked` несут точный список конфликтных мест,
/// чтобы вызывающая сторона могла предложить альтернативу.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TicketError {
    /// Некорректный запрос — не ретраится, исправляет вызывающий.
    #[error("некорректный запрос: {0}")]
    InvalidInput(String),

    /// Конкуренция за места: часть запрошенных мест уже занята.
    #[error("места недоступны: {seat_ids:?}")]
    SeatUnavailable { seat_ids: Vec<SeatId> },

    /// Токен удержания уже использован или просрочен.
    #[error("токен удержания недействителен")]
    InvalidToken,

    /// Недопустимый переход состояния — ошибка интеграции, а не данных.
    #[error("недопустимый переход: {0}")]
    InvalidTransition(String),

    /// Платёж отклонён шлюзом. Места уже освобождены.
    #[error("платёж отклонён")]
    PaymentDeclined,

    /// Бронирование не найдено или принадлежит другому пользователю.
    #[error("бронирование не найдено")]
    BookingNotFound,

    /// Отмена мест, которые не находятся в статусе BOOKED.
    #[error("места не выкуплены: {seat_ids:?}")]
    NotBooked { seat_ids: Vec<SeatId> },

    /// Для категории не зарегистрирован множитель цены.
    #[error("неизвестная категория мест: {0}")]
    UnknownCategory(String),
}

pub type Result<T> = std::result::Result<T, TicketError>;
