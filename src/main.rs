use std::time::Duration;

use chrono::Utc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use theater_booking::{
    config::Config,
    models::{Seat, SeatCategory, Show},
    services::sweeper::HoldSweeper,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting theater booking core");

    let sweep_interval = Duration::from_secs(config.hold.sweep_interval_seconds);
    let state = AppState::new(config)?;

    // Фоновая очистка просроченных удержаний
    let _sweeper = HoldSweeper::new(state.ledger.clone(), sweep_interval).spawn();

    // Демонстрационный показ: два места, 10:00-12:00
    let today = Utc::now().date_naive();
    let show = Show::new(
        1,
        today.and_hms_opt(10, 0, 0).expect("valid time"),
        today.and_hms_opt(12, 0, 0).expect("valid time"),
        vec![
            Seat::new(1, 1, 1, SeatCategory::gold()),
            Seat::new(2, 1, 2, SeatCategory::premium()),
        ],
    )?;
    state.register_show(show)?;
    info!("Registered demo show 1 with 2 seats");

    let customer_id = 42;
    let booking = state
        .booking_service
        .book(customer_id, 1, &[1], 200.0)
        .await?;
    info!(
        booking_id = %booking.id,
        total = booking.total_price,
        status = ?booking.status,
        "Demo booking completed"
    );

    for (seat_id, status) in state.ledger.snapshot(1)? {
        info!("Seat {}: {}", seat_id, status);
    }

    state.booking_service.cancel(customer_id, booking.id)?;
    info!("Demo booking cancelled, seats back in inventory");

    for (seat_id, status) in state.ledger.snapshot(1)? {
        info!("Seat {}: {}", seat_id, status);
    }

    Ok(())
}
