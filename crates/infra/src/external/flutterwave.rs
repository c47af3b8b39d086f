//! Flutterwave (Rave) transaction verification over HTTP.
//!
//! Uses the v2 `verify` endpoint: `POST {base}/flwv3-pug/getpaidx/api/v2/verify`
//! with `{"txref", "SECKEY"}`. The response body is interpreted by
//! [`interpret_verify_response`], which is independent of the transport.

use core::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::{Value, json};
use tracing::instrument;

use convey_billing::{GatewayError, GatewayVerifier, VerifiedTransaction};

const VERIFY_PATH: &str = "/flwv3-pug/getpaidx/api/v2/verify";

/// Charge codes meaning the card was actually charged.
const COMPLETE_CHARGE_CODES: [&str; 2] = ["00", "0"];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FlutterwaveEnvironment {
    Live,
    Sandbox,
}

impl FlutterwaveEnvironment {
    /// `production`/`prod` (any case) select the live API; anything else is sandbox.
    pub fn from_app_env(app_env: Option<&str>) -> Self {
        match app_env.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "production" || v == "prod" => FlutterwaveEnvironment::Live,
            _ => FlutterwaveEnvironment::Sandbox,
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            FlutterwaveEnvironment::Live => "https://api.ravepay.co",
            FlutterwaveEnvironment::Sandbox => "https://ravesandboxapi.flutterwave.com",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlutterwaveClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl FlutterwaveClient {
    pub fn new(
        environment: FlutterwaveEnvironment,
        secret_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        Self::with_base_url(environment.base_url(), secret_key, timeout)
    }

    /// Point the client at an arbitrary host, such as a local gateway double.
    pub fn with_base_url(
        base_url: impl Into<String>,
        secret_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    fn verify_url(&self) -> String {
        format!("{}{}", self.base_url, VERIFY_PATH)
    }
}

#[async_trait::async_trait]
impl GatewayVerifier for FlutterwaveClient {
    #[instrument(skip(self), fields(gateway = "flutterwave"), err(Display))]
    async fn verify(&self, tx_ref: &str) -> Result<VerifiedTransaction, GatewayError> {
        let response = self
            .http
            .post(self.verify_url())
            .json(&json!({ "txref": tx_ref, "SECKEY": self.secret_key }))
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(format!("HTTP {status}: {e}")))?;

        interpret_verify_response(status.is_success(), &body)
    }
}

/// Map a verify response body to the gateway's view of the transaction.
///
/// `http_ok` is false for non-2xx answers, which are always treated as rejections.
pub fn interpret_verify_response(http_ok: bool, body: &Value) -> Result<VerifiedTransaction, GatewayError> {
    let status = body.get("status").and_then(Value::as_str).unwrap_or_default();
    let data = body.get("data").unwrap_or(&Value::Null);

    if !http_ok || status == "error" {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| data.get("message").and_then(Value::as_str))
            .unwrap_or("verification failed");
        let reference = data
            .get("flwref")
            .and_then(Value::as_str)
            .unwrap_or_default();
        return Err(GatewayError::Rejected {
            message: message.to_string(),
            reference: reference.to_string(),
        });
    }

    let tx_ref = data
        .get("txref")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Malformed("missing data.txref".to_string()))?;

    let charge_code = data.get("chargecode").map(scalar_text).unwrap_or_default();
    let transaction_complete = COMPLETE_CHARGE_CODES.contains(&charge_code.as_str());

    let price = data
        .get("amount")
        .map(scalar_text)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| GatewayError::Malformed("missing data.amount".to_string()))
        .and_then(|raw| {
            Decimal::from_str(&raw)
                .map_err(|e| GatewayError::Malformed(format!("data.amount {raw:?}: {e}")))
        })?;

    let currency = data
        .get("currency")
        .and_then(Value::as_str)
        .unwrap_or_default();

    Ok(VerifiedTransaction {
        tx_ref: tx_ref.to_string(),
        status: status.to_string(),
        transaction_complete,
        price,
        currency: currency.to_string(),
    })
}

/// Text of a JSON string or number; empty for anything else.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn success_body() -> Value {
        json!({
            "status": "success",
            "message": "Tx Fetched",
            "data": {
                "txref": "0191f2a4-user",
                "flwref": "FLW-MOCK-7d1e",
                "chargecode": "00",
                "amount": 5000,
                "currency": "NGN"
            }
        })
    }

    #[test]
    fn environment_picks_base_url() {
        assert_eq!(
            FlutterwaveEnvironment::from_app_env(Some("production")).base_url(),
            "https://api.ravepay.co"
        );
        assert_eq!(
            FlutterwaveEnvironment::from_app_env(None).base_url(),
            "https://ravesandboxapi.flutterwave.com"
        );
    }

    #[test]
    fn success_response_is_mapped() {
        let verified = interpret_verify_response(true, &success_body()).unwrap();
        assert_eq!(verified.tx_ref, "0191f2a4-user");
        assert_eq!(verified.status, "success");
        assert!(verified.transaction_complete);
        assert_eq!(verified.price, dec!(5000));
        assert_eq!(verified.currency, "NGN");
    }

    #[test]
    fn numeric_and_string_charge_codes_are_understood() {
        let mut body = success_body();
        body["data"]["chargecode"] = json!(0);
        assert!(interpret_verify_response(true, &body).unwrap().transaction_complete);

        body["data"]["chargecode"] = json!("02");
        assert!(!interpret_verify_response(true, &body).unwrap().transaction_complete);
    }

    #[test]
    fn fractional_and_string_amounts_keep_precision() {
        let mut body = success_body();
        body["data"]["amount"] = json!("4999.99");
        assert_eq!(interpret_verify_response(true, &body).unwrap().price, dec!(4999.99));

        body["data"]["amount"] = json!(12.5);
        assert_eq!(interpret_verify_response(true, &body).unwrap().price, dec!(12.5));
    }

    #[test]
    fn error_status_becomes_rejection_with_reference() {
        let body = json!({
            "status": "error",
            "message": "No transaction found",
            "data": { "flwref": "FLW-MOCK-404" }
        });
        let err = interpret_verify_response(true, &body).unwrap_err();
        assert_eq!(err.to_string(), "Error: No transaction found [FLW-MOCK-404].");
    }

    #[test]
    fn non_success_http_status_is_a_rejection_even_with_success_body() {
        let err = interpret_verify_response(false, &success_body()).unwrap_err();
        assert!(matches!(err, GatewayError::Rejected { .. }));
    }

    #[test]
    fn missing_fields_are_malformed() {
        let mut body = success_body();
        body["data"].as_object_mut().unwrap().remove("amount");
        assert!(matches!(
            interpret_verify_response(true, &body).unwrap_err(),
            GatewayError::Malformed(_)
        ));

        let body = json!({ "status": "success" });
        assert!(matches!(
            interpret_verify_response(true, &body).unwrap_err(),
            GatewayError::Malformed(_)
        ));
    }

    mod http {
        use std::time::Duration;

        use convey_billing::{GatewayError, GatewayVerifier};
        use rust_decimal_macros::dec;
        use serde_json::json;
        use wiremock::matchers::{body_json, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        use super::super::{FlutterwaveClient, VERIFY_PATH};
        use super::success_body;

        const SECRET: &str = "FLWSECK_TEST-abc";

        async fn client_for(server: &MockServer, timeout: Duration) -> FlutterwaveClient {
            FlutterwaveClient::with_base_url(format!("{}/", server.uri()), SECRET, timeout).unwrap()
        }

        #[tokio::test]
        async fn posts_reference_and_secret_and_maps_success() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(VERIFY_PATH))
                .and(body_json(json!({ "txref": "0191f2a4-user", "SECKEY": SECRET })))
                .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
                .expect(1)
                .mount(&server)
                .await;

            let client = client_for(&server, Duration::from_secs(5)).await;
            let verified = client.verify("0191f2a4-user").await.unwrap();
            assert_eq!(verified.price, dec!(5000));
            assert!(verified.transaction_complete);
        }

        #[tokio::test]
        async fn error_status_with_json_body_is_rejected() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(VERIFY_PATH))
                .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                    "status": "error",
                    "message": "Invalid secret key passed",
                    "data": { "flwref": "FLW-AUTH-1" }
                })))
                .mount(&server)
                .await;

            let err = client_for(&server, Duration::from_secs(5))
                .await
                .verify("ref")
                .await
                .unwrap_err();
            assert_eq!(
                err,
                GatewayError::Rejected {
                    message: "Invalid secret key passed".to_string(),
                    reference: "FLW-AUTH-1".to_string(),
                }
            );
        }

        #[tokio::test]
        async fn html_error_page_is_malformed() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(VERIFY_PATH))
                .respond_with(
                    ResponseTemplate::new(500).set_body_string("<html><body>Bad Gateway</body></html>"),
                )
                .mount(&server)
                .await;

            let err = client_for(&server, Duration::from_secs(5))
                .await
                .verify("ref")
                .await
                .unwrap_err();
            assert!(matches!(err, GatewayError::Malformed(msg) if msg.starts_with("HTTP 500")));
        }

        #[tokio::test]
        async fn slow_gateway_hits_the_configured_timeout() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(VERIFY_PATH))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(success_body())
                        .set_delay(Duration::from_secs(3)),
                )
                .mount(&server)
                .await;

            let err = client_for(&server, Duration::from_millis(200))
                .await
                .verify("ref")
                .await
                .unwrap_err();
            assert!(matches!(err, GatewayError::Transport(_)));
        }
    }
}
