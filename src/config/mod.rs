use serde::Deserialize;
use std::env;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub hold: HoldConfig,
    pub pricing: PricingConfig,
    pub payment: PaymentConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

// Настройки приложения
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub environment: String,
    pub rust_log: String,
}

// Настройки удержания мест: TTL и период фоновой очистки
#[derive(Debug, Clone, Deserialize)]
pub struct HoldConfig {
    pub ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
}

// Множители цены по категориям мест
#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    pub gold_multiplier: f64,
    pub premium_multiplier: f64,
    pub standard_multiplier: f64,
}

// Настройки платежного шлюза
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    pub merchant_id: String,
    pub merchant_password: String,
    // Пустой URL означает локальный автоподтверждающий шлюз (демо/тесты)
    pub gateway_url: String,
    pub currency: String,
}

// Настройки Circuit Breaker
#[derive(Debug, Clone, Deserialize)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub timeout_seconds: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            app: AppConfig {
                environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
                rust_log: env::var("RUST_LOG")
                    .unwrap_or_else(|_| "theater_booking=debug".to_string()),
            },
            hold: HoldConfig {
                ttl_seconds: env::var("HOLD_TTL_SECONDS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .expect("HOLD_TTL_SECONDS must be a valid number"),
                sweep_interval_seconds: env::var("HOLD_SWEEP_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .expect("HOLD_SWEEP_INTERVAL_SECONDS must be a valid number"),
            },
            pricing: PricingConfig {
                gold_multiplier: env::var("PRICING_GOLD_MULTIPLIER")
                    .unwrap_or_else(|_| "1.5".to_string())
                    .parse()
                    .expect("PRICING_GOLD_MULTIPLIER must be a valid number"),
                premium_multiplier: env::var("PRICING_PREMIUM_MULTIPLIER")
                    .unwrap_or_else(|_| "2.0".to_string())
                    .parse()
                    .expect("PRICING_PREMIUM_MULTIPLIER must be a valid number"),
                standard_multiplier: env::var("PRICING_STANDARD_MULTIPLIER")
                    .unwrap_or_else(|_| "1.0".to_string())
                    .parse()
                    .expect("PRICING_STANDARD_MULTIPLIER must be a valid number"),
            },
            payment: PaymentConfig {
                merchant_id: env::var("MERCHANT_ID").unwrap_or_else(|_| "demo-theater".to_string()),
                merchant_password: env::var("MERCHANT_PASSWORD")
                    .unwrap_or_else(|_| "demo-password".to_string()),
                gateway_url: env::var("PAYMENT_GATEWAY_URL").unwrap_or_default(),
                currency: env::var("PAYMENT_CURRENCY").unwrap_or_else(|_| "USD".to_string()),
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: env::var("CIRCUIT_BREAKER_FAILURE_THRESHOLD")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .expect("CIRCUIT_BREAKER_FAILURE_THRESHOLD must be a valid number"),
                timeout_seconds: env::var("CIRCUIT_BREAKER_TIMEOUT_SECONDS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .expect("CIRCUIT_BREAKER_TIMEOUT_SECONDS must be a valid number"),
            },
        }
    }
}
