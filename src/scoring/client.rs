use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config as BreakerConfig, Error as FailsafeError, StateMachine};
use reqwest::Client;
use std::time::Duration;

use crate::config::ScoringConfig;
use crate::scoring::{FraudPrediction, FraudScorer, ScoreOutcome, ScoringError, ScoringRequest};

/// Whether the breaker currently lets requests through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
}

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

/// HTTP client for the scoring collaborator's `/predict` endpoint.
#[derive(Clone)]
pub struct ScoringClient {
    client: Client,
    base_url: String,
    circuit_breaker: Breaker,
}

impl ScoringClient {
    pub fn new(config: &ScoringConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();

        let reset = config.breaker_reset.max(Duration::from_secs(1));
        let backoff = backoff::equal_jittered(reset, reset * 2);
        let policy = failure_policy::consecutive_failures(config.breaker_failures.max(1), backoff);
        let circuit_breaker = BreakerConfig::new().failure_policy(policy).build();

        ScoringClient {
            client,
            base_url: config.base_url.clone(),
            circuit_breaker,
        }
    }

    pub fn circuit_state(&self) -> CircuitState {
        if self.circuit_breaker.is_call_permitted() {
            CircuitState::Closed
        } else {
            CircuitState::Open
        }
    }

    async fn request(&self, request: &ScoringRequest) -> Result<FraudPrediction, ScoringError> {
        let url = format!("{}/predict", self.base_url.trim_end_matches('/'));
        let client = self.client.clone();
        let body = request.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client.post(&url).json(&body).send().await?;

                if !response.status().is_success() {
                    return Err(ScoringError::Status(response.status().as_u16()));
                }

                let bytes = response.bytes().await?;
                serde_json::from_slice::<FraudPrediction>(&bytes)
                    .map_err(|e| ScoringError::InvalidResponse(e.to_string()))
            })
            .await;

        match result {
            Ok(prediction) => Ok(prediction),
            Err(FailsafeError::Rejected) => Err(ScoringError::CircuitOpen),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

#[async_trait]
impl FraudScorer for ScoringClient {
    async fn score(&self, request: &ScoringRequest) -> ScoreOutcome {
        match self.request(request).await {
            Ok(prediction) => {
                tracing::debug!(
                    score = %prediction.fraud_risk_score,
                    flagged = prediction.is_flagged,
                    "Scoring service responded"
                );
                ScoreOutcome::Scored(prediction)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Scoring service unavailable, using fallback score");
                ScoreOutcome::fallback(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ScoringRequest {
        ScoringRequest {
            amount: 15000.0,
            currency: "USD".to_string(),
            transaction_type: "purchase".to_string(),
            payment_method: "bank_transfer".to_string(),
            location_country: "RU".to_string(),
            device_type: "unknown".to_string(),
            hour_of_day: 3,
            day_of_week: 2,
        }
    }

    fn config(url: String) -> ScoringConfig {
        ScoringConfig {
            timeout: Duration::from_millis(500),
            ..ScoringConfig::new(url)
        }
    }

    #[tokio::test]
    async fn test_score_success() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/predict")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "location_country": "RU",
                "hour_of_day": 3
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"fraud_risk_score": 92, "is_flagged": true, "reasons": ["high amount"]}"#)
            .create_async()
            .await;

        let client = ScoringClient::new(&config(server.url()));
        let outcome = client.score(&request()).await;

        assert!(!outcome.is_fallback());
        let prediction = outcome.into_prediction();
        assert_eq!(prediction.fraud_risk_score.value(), 92.0);
        assert!(prediction.is_flagged);
        assert_eq!(prediction.reasons, vec!["high amount".to_string()]);
    }

    #[tokio::test]
    async fn test_server_error_falls_back() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/predict")
            .with_status(500)
            .create_async()
            .await;

        let client = ScoringClient::new(&config(server.url()));
        let outcome = client.score(&request()).await;

        assert!(matches!(
            outcome,
            ScoreOutcome::Fallback {
                cause: ScoringError::Status(500),
                ..
            }
        ));
        assert_eq!(outcome.prediction().fraud_risk_score.value(), 50.0);
    }

    #[tokio::test]
    async fn test_out_of_range_score_falls_back() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/predict")
            .with_status(200)
            .with_body(r#"{"fraud_risk_score": 140, "is_flagged": true}"#)
            .create_async()
            .await;

        let client = ScoringClient::new(&config(server.url()));
        let outcome = client.score(&request()).await;

        assert!(matches!(
            outcome,
            ScoreOutcome::Fallback {
                cause: ScoringError::InvalidResponse(_),
                ..
            }
        ));
        assert!(!outcome.prediction().is_flagged);
    }

    #[tokio::test]
    async fn test_malformed_body_falls_back() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/predict")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let client = ScoringClient::new(&config(server.url()));
        assert!(client.score(&request()).await.is_fallback());
    }

    #[tokio::test]
    async fn test_unreachable_service_falls_back() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = ScoringClient::new(&config(format!("http://127.0.0.1:{}", port)));
        let outcome = client.score(&request()).await;

        assert!(outcome.is_fallback());
        assert_eq!(
            outcome.prediction().reasons,
            vec!["AI service unavailable".to_string()]
        );
    }

    #[tokio::test]
    async fn test_circuit_opens_after_consecutive_failures() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/predict")
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let client = ScoringClient::new(&ScoringConfig {
            breaker_failures: 2,
            breaker_reset: Duration::from_secs(60),
            ..config(server.url())
        });
        assert_eq!(client.circuit_state(), CircuitState::Closed);

        for _ in 0..2 {
            assert!(client.score(&request()).await.is_fallback());
        }
        assert_eq!(client.circuit_state(), CircuitState::Open);

        let outcome = client.score(&request()).await;
        assert!(matches!(
            outcome,
            ScoreOutcome::Fallback {
                cause: ScoringError::CircuitOpen,
                ..
            }
        ));
        mock.assert_async().await;
    }
}
