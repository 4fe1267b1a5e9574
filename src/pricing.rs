use std::collections::HashMap;

use crate::config::PricingConfig;
use crate::error::{Result, TicketError};
use crate::models::SeatCategory;

/// Таблица множителей цены по категории места.
/// Чистая функция без состояния выполнения: новая категория — это запись
/// в таблице на этапе сборки, а не новый подтип.
pub struct PricingPolicy {
    multipliers: HashMap<SeatCategory, f64>,
}

impl PricingPolicy {
    pub fn new() -> Self {
        Self {
            multipliers: HashMap::new(),
        }
    }

    /// Стандартная таблица из конфигурации: gold, premium, standard.
    pub fn from_config(config: &PricingConfig) -> Result<Self> {
        let mut policy = Self::new();
        policy.register(SeatCategory::gold(), config.gold_multiplier)?;
        policy.register(SeatCategory::premium(), config.premium_multiplier)?;
        policy.register(SeatCategory::standard(), config.standard_multiplier)?;
        Ok(policy)
    }

    /// Регистрирует категорию. Множитель обязан быть положительным.
    pub fn register(&mut self, category: SeatCategory, multiplier: f64) -> Result<()> {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(TicketError::InvalidInput(format!(
                "множитель категории {} должен быть > 0",
                category
            )));
        }
        self.multipliers.insert(category, multiplier);
        Ok(())
    }

    /// Цена места: base_price * множитель категории.
    pub fn price(&self, base_price: f64, category: &SeatCategory) -> Result<f64> {
        if !base_price.is_finite() || base_price <= 0.0 {
            return Err(TicketError::InvalidInput(
                "базовая цена должна быть > 0".to_string(),
            ));
        }
        let multiplier = self
            .multipliers
            .get(category)
            .ok_or_else(|| TicketError::UnknownCategory(category.to_string()))?;
        Ok(base_price * multiplier)
    }
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self::new()
    }
}
