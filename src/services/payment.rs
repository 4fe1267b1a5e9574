//! payment.rs
//!
//! Сервисный слой для взаимодействия с внешним платёжным оракулом.
//!
//! Ключевые компоненты:
//! 1.  **PaymentGateway**: трейт-шов между ядром бронирования и оракулом.
//!     Сервису бронирования важен только исход: Approved или Declined.
//! 2.  **CircuitBreaker**: "Автоматический выключатель" для защиты от
//!     неработающего внешнего API — блокирует запросы после серии сбоев.
//! 3.  **HttpPaymentGateway**: HTTP-клиент шлюза с токеном запроса на
//!     SHA-256; все сетевые вызовы проходят через `CircuitBreaker`.
//! 4.  **StaticGateway**: локальный шлюз со сценарием исходов — для демо
//!     и тестов, когда внешний шлюз не сконфигурирован.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{CircuitBreakerConfig, PaymentConfig};

/// Исход списания. Любой сбой транспорта трактуется сервисом
/// бронирования так же, как отказ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeOutcome {
    Approved,
    Declined,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("circuit breaker is open - payment gateway temporarily unavailable")]
    Open,
    #[error("payment gateway error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Оракул оплаты. Внутренняя логика шлюза не моделируется:
/// результат — данность.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, amount: f64, order_id: &str) -> Result<ChargeOutcome, GatewayError>;
}

/// Состояния "Автоматического выключателя" (Circuit Breaker).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Нормальный режим: запросы разрешены.
    Closed,
    /// Режим блокировки после серии сбоев.
    Open,
    /// Тестовый режим: один пробный запрос после таймаута.
    HalfOpen,
}

pub struct CircuitBreaker {
    state: RwLock<CircuitState>,
    failure_count: AtomicU32,
    last_failure: Mutex<Option<Instant>>,
    failure_threshold: u32,
    timeout_duration: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, timeout_seconds: u64) -> Self {
        Self {
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            last_failure: Mutex::new(None),
            failure_threshold,
            timeout_duration: Duration::from_secs(timeout_seconds),
        }
    }

    /// Проверяет, можно ли выполнить следующий запрос к шлюзу.
    pub fn can_execute(&self) -> bool {
        let state = self.state.read().unwrap();
        match *state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooled = self
                    .last_failure
                    .lock()
                    .unwrap()
                    .map(|at| at.elapsed() >= self.timeout_duration)
                    .unwrap_or(true);
                if cooled {
                    drop(state); // освобождаем read-блокировку перед записью
                    *self.state.write().unwrap() = CircuitState::HalfOpen;
                    info!("Circuit breaker transitioning to HalfOpen state");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => true,
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.write().unwrap();
        match *state {
            CircuitState::HalfOpen => {
                *state = CircuitState::Closed;
                self.failure_count.store(0, Ordering::Relaxed);
                info!("Circuit breaker recovered - transitioning to Closed state");
            }
            CircuitState::Closed => {
                self.failure_count.store(0, Ordering::Relaxed);
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let failure_count = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        *self.last_failure.lock().unwrap() = Some(Instant::now());

        let mut state = self.state.write().unwrap();
        match *state {
            CircuitState::Closed => {
                if failure_count >= self.failure_threshold {
                    *state = CircuitState::Open;
                    error!(
                        "Circuit breaker OPENED - {} failures reached threshold {}",
                        failure_count, self.failure_threshold
                    );
                }
            }
            CircuitState::HalfOpen => {
                *state = CircuitState::Open;
                warn!("Circuit breaker test failed - returning to Open state");
            }
            CircuitState::Open => {}
        }
    }

    pub fn get_state(&self) -> CircuitState {
        *self.state.read().unwrap()
    }
}

// --- Модели данных для API платёжного шлюза ---

/// Запрос на списание.
#[derive(Debug, Serialize)]
struct ChargeRequest {
    #[serde(rename = "merchantId")]
    merchant_id: String,
    token: String,
    /// Сумма в минорных единицах валюты.
    amount: i64,
    #[serde(rename = "orderId")]
    order_id: String,
    currency: String,
}

/// Ответ шлюза на списание.
#[derive(Debug, Deserialize)]
struct ChargeResponse {
    success: bool,
    code: Option<i32>,
    message: Option<String>,
}

/// Клиент платёжного шлюза поверх HTTP.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    /// Идентификатор продавца.
    merchant_id: String,
    /// Секретный пароль для генерации токенов.
    password: String,
    /// Базовый URL платёжного шлюза.
    base_url: String,
    currency: String,
    http_client: reqwest::Client,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl HttpPaymentGateway {
    pub fn from_config(payment: &PaymentConfig, breaker: &CircuitBreakerConfig) -> Self {
        Self {
            merchant_id: payment.merchant_id.clone(),
            password: payment.merchant_password.clone(),
            base_url: payment.gateway_url.clone(),
            currency: payment.currency.clone(),
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            circuit_breaker: Arc::new(CircuitBreaker::new(
                breaker.failure_threshold,
                breaker.timeout_seconds,
            )),
        }
    }

    /// Выполняет асинхронную операцию, пропуская её через Circuit Breaker.
    async fn execute_with_circuit_breaker<F, T>(&self, operation: F) -> Result<T, GatewayError>
    where
        F: std::future::Future<Output = Result<T, reqwest::Error>>,
    {
        if !self.circuit_breaker.can_execute() {
            warn!("Circuit breaker is OPEN - blocking payment gateway request");
            return Err(GatewayError::Open);
        }

        match operation.await {
            Ok(result) => {
                self.circuit_breaker.record_success();
                Ok(result)
            }
            Err(e) => {
                error!("Payment gateway request failed: {:?}", e);
                self.circuit_breaker.record_failure();
                Err(GatewayError::Transport(e))
            }
        }
    }

    /// Токен запроса: sha256(amount + currency + orderId + password + merchantId).
    fn generate_token(&self, amount: i64, order_id: &str) -> String {
        let token_string = format!(
            "{}{}{}{}{}",
            amount, self.currency, order_id, self.password, self.merchant_id
        );
        let mut hasher = Sha256::new();
        hasher.update(token_string.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn get_circuit_breaker_status(&self) -> (CircuitState, u32) {
        (
            self.circuit_breaker.get_state(),
            self.circuit_breaker.failure_count.load(Ordering::Relaxed),
        )
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn charge(&self, amount: f64, order_id: &str) -> Result<ChargeOutcome, GatewayError> {
        let amount_minor = (amount * 100.0).round() as i64;
        let request = ChargeRequest {
            merchant_id: self.merchant_id.clone(),
            token: self.generate_token(amount_minor, order_id),
            amount: amount_minor,
            order_id: order_id.to_string(),
            currency: self.currency.clone(),
        };

        info!(
            "Charging payment gateway: amount={}, currency={}, order_id={}",
            amount_minor, self.currency, order_id
        );

        let operation = async {
            self.http_client
                .post(format!("{}/api/v1/charge", self.base_url))
                .json(&request)
                .send()
                .await?
                .json::<ChargeResponse>()
                .await
        };

        let response = self.execute_with_circuit_breaker(operation).await?;
        if response.success {
            Ok(ChargeOutcome::Approved)
        } else {
            info!(
                "Payment declined: code={:?}, message={:?}",
                response.code, response.message
            );
            Ok(ChargeOutcome::Declined)
        }
    }
}

/// Локальный шлюз со сценарием исходов. После исчерпания сценария
/// возвращает исход по умолчанию.
pub struct StaticGateway {
    script: Mutex<VecDeque<ChargeOutcome>>,
    fallback: ChargeOutcome,
}

impl StaticGateway {
    pub fn approving() -> Self {
        Self::with_script([], ChargeOutcome::Approved)
    }

    pub fn declining() -> Self {
        Self::with_script([], ChargeOutcome::Declined)
    }

    pub fn with_script(
        outcomes: impl IntoIterator<Item = ChargeOutcome>,
        fallback: ChargeOutcome,
    ) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
            fallback,
        }
    }
}

#[async_trait]
impl PaymentGateway for StaticGateway {
    async fn charge(&self, _amount: f64, _order_id: &str) -> Result<ChargeOutcome, GatewayError> {
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);
        Ok(outcome)
    }
}

/// Выбор шлюза по конфигурации: без URL работаем через локальный
/// автоподтверждающий шлюз.
pub fn gateway_from_config(
    payment: &PaymentConfig,
    breaker: &CircuitBreakerConfig,
) -> Arc<dyn PaymentGateway> {
    if payment.gateway_url.is_empty() {
        info!("PAYMENT_GATEWAY_URL not set - using in-process auto-approve gateway");
        Arc::new(StaticGateway::approving())
    } else {
        Arc::new(HttpPaymentGateway::from_config(payment, breaker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway_for(url: &str, failure_threshold: u32) -> HttpPaymentGateway {
        HttpPaymentGateway::from_config(
            &PaymentConfig {
                merchant_id: "demo-theater".to_string(),
                merchant_password: "demo-password".to_string(),
                gateway_url: url.to_string(),
                currency: "USD".to_string(),
            },
            &CircuitBreakerConfig {
                failure_threshold,
                timeout_seconds: 60,
            },
        )
    }

    #[tokio::test]
    async fn approved_charge() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/charge"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server.uri(), 5);
        let outcome = gateway.charge(300.0, "order-1").await.unwrap();
        assert_eq!(outcome, ChargeOutcome::Approved);
    }

    #[tokio::test]
    async fn declined_charge() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/charge"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "code": 1001,
                "message": "insufficient funds"
            })))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server.uri(), 5);
        let outcome = gateway.charge(300.0, "order-1").await.unwrap();
        assert_eq!(outcome, ChargeOutcome::Declined);
    }

    #[tokio::test]
    async fn breaker_opens_after_repeated_transport_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/charge"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let gateway = gateway_for(&server.uri(), 2);
        assert!(matches!(
            gateway.charge(300.0, "order-1").await,
            Err(GatewayError::Transport(_))
        ));
        assert!(matches!(
            gateway.charge(300.0, "order-2").await,
            Err(GatewayError::Transport(_))
        ));
        // Порог достигнут: третий запрос блокируется без похода в сеть.
        assert!(matches!(
            gateway.charge(300.0, "order-3").await,
            Err(GatewayError::Open)
        ));
        assert_eq!(gateway.get_circuit_breaker_status().0, CircuitState::Open);
    }

    #[test]
    fn breaker_half_open_after_cooldown_then_recovers() {
        let breaker = CircuitBreaker::new(1, 0);
        breaker.record_failure();
        assert_eq!(breaker.get_state(), CircuitState::Open);

        // Таймаут нулевой: следующий запрос пробный.
        assert!(breaker.can_execute());
        assert_eq!(breaker.get_state(), CircuitState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.get_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn static_gateway_follows_script() {
        let gateway = StaticGateway::with_script(
            [ChargeOutcome::Declined, ChargeOutcome::Approved],
            ChargeOutcome::Approved,
        );
        assert_eq!(
            gateway.charge(1.0, "a").await.unwrap(),
            ChargeOutcome::Declined
        );
        assert_eq!(
            gateway.charge(1.0, "b").await.unwrap(),
            ChargeOutcome::Approved
        );
        // Сценарий исчерпан - работает fallback.
        assert_eq!(
            gateway.charge(1.0, "c").await.unwrap(),
            ChargeOutcome::Approved
        );
    }
}
