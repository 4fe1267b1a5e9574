pub mod catalog;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod pricing;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use crate::services::booking::{BookingService, BookingStore};
use crate::services::payment::{gateway_from_config, PaymentGateway};

// Shared state для всего приложения
pub struct AppState {
    pub config: config::Config,
    pub catalog: Arc<catalog::ShowCatalog>,
    pub ledger: Arc<ledger::SeatLedger>,
    pub pricing: Arc<pricing::PricingPolicy>,
    pub bookings: Arc<BookingStore>,
    pub booking_service: Arc<BookingService>,
}

impl AppState {
    /// Композиционный корень: все сервисные объекты создаются здесь один
    /// раз и дальше передаются только явно, без глобального состояния.
    pub fn new(config: config::Config) -> error::Result<Arc<Self>> {
        let gateway = gateway_from_config(&config.payment, &config.circuit_breaker);
        Self::with_gateway(config, gateway)
    }

    /// Тот же корень, но с явным шлюзом (тесты, демо).
    pub fn with_gateway(
        config: config::Config,
        gateway: Arc<dyn PaymentGateway>,
    ) -> error::Result<Arc<Self>> {
        let catalog = Arc::new(catalog::ShowCatalog::new());
        let ledger = Arc::new(ledger::SeatLedger::new(Duration::from_secs(
            config.hold.ttl_seconds,
        )));
        let pricing = Arc::new(pricing::PricingPolicy::from_config(&config.pricing)?);
        let bookings = Arc::new(BookingStore::new());
        let booking_service = Arc::new(BookingService::new(
            catalog.clone(),
            ledger.clone(),
            pricing.clone(),
            bookings.clone(),
            gateway,
        ));

        Ok(Arc::new(Self {
            config,
            catalog,
            ledger,
            pricing,
            bookings,
            booking_service,
        }))
    }

    /// Показ регистрируется сразу и в каталоге, и в ледгере: каталог
    /// отвечает на вопросы «какие места и какой категории», ледгер — «в
    /// каком они статусе».
    pub fn register_show(&self, show: models::Show) -> error::Result<()> {
        self.ledger.register_show(&show)?;
        self.catalog.register(show)
    }
}
