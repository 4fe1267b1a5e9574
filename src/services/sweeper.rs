//! sweeper.rs
//!
//! Фоновая очистка просроченных удержаний. Удержание без последующего
//! commit/release — брошенная попытка бронирования; чтобы места не
//! голодали, ледгер снимает такие удержания сам. Сам ледгер делает это
//! лениво при каждом обращении к показу, а этот процесс подметает
//! показы, к которым давно никто не обращался.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::ledger::SeatLedger;

pub struct HoldSweeper {
    ledger: Arc<SeatLedger>,
    interval: Duration,
}

impl HoldSweeper {
    pub fn new(ledger: Arc<SeatLedger>, interval: Duration) -> Self {
        Self { ledger, interval }
    }

    /// Один проход очистки; возвращает число снятых удержаний.
    pub fn sweep_once(&self) -> usize {
        self.ledger.sweep_expired()
    }

    pub async fn run(self) {
        info!("🧹 Hold sweeper started, interval {:?}", self.interval);
        loop {
            let released = self.sweep_once();
            if released > 0 {
                info!("🧹 Released {} expired holds", released);
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::task::spawn(self.run())
    }
}
