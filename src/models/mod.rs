pub mod booking;
pub mod seat;
pub mod show;

pub use booking::{Booking, BookingStatus};
pub use seat::{Seat, SeatCategory, SeatStatus};
pub use show::Show;

pub type SeatId = i64;
pub type ShowId = i64;
pub type CustomerId = i64;
