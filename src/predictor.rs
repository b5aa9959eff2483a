use crate::error::{Error, Result};
use crate::results::PredictionResponse;
use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;
use std::time::Duration;

/// Prediction endpoint used when none is configured
pub const DEFAULT_API_URL: &str = "https://honest-tuna-striking.ngrok-free.app/api/predict";

/// Confidence interval (percent) requested for AC50 ranges by default
pub const DEFAULT_PERCENTAGE: u8 = 95;

/// Body of a prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Compound identifiers, in submission order
    pub compound: Vec<String>,

    /// Confidence interval for the AC50 range, 1 to 99
    pub percentage: u8,
}

impl PredictionRequest {
    pub fn new(compound: Vec<String>, percentage: u8) -> Result<Self> {
        Ok(Self {
            compound,
            percentage: validate_percentage(percentage)?,
        })
    }
}

/// Check a confidence interval is within 1..=99
pub fn validate_percentage(percentage: u8) -> Result<u8> {
    if (1..=99).contains(&percentage) {
        Ok(percentage)
    } else {
        Err(Error::InvalidPercentage(percentage.to_string()))
    }
}

/// The external classification/regression service
///
/// Implementations return the parsed response body on success and
/// `Error::Network` for anything the service or transport got wrong.
#[async_trait]
pub trait PredictionClient: Send + Sync {
    async fn predict(&self, request: &PredictionRequest) -> Result<PredictionResponse>;
}

/// [`PredictionClient`] talking JSON over HTTP with reqwest
pub struct HttpPredictionClient {
    client: reqwest::Client,
    url: String,
}

impl HttpPredictionClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PredictionClient for HttpPredictionClient {
    async fn predict(&self, request: &PredictionRequest) -> Result<PredictionResponse> {
        debug!(
            "POST {} with {} compounds at {}%",
            self.url,
            request.compound.len(),
            request.percentage
        );

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(parsing_error)?;

        let status = response.status().as_u16();
        // The body is JSON even for failures; its `error` field is preferred
        // over the bare status code.
        let body: Value = response.json().await.map_err(parsing_error)?;

        interpret_response(status, body)
    }
}

/// Turn a status code and JSON body into a response or a service error
pub(crate) fn interpret_response(status: u16, body: Value) -> Result<PredictionResponse> {
    if !(200..300).contains(&status) {
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .filter(|message| !message.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Server Error: {}", status));
        warn!("Prediction service returned {}: {}", status, message);
        return Err(Error::Network(message));
    }

    let response: PredictionResponse = serde_json::from_value(body).map_err(parsing_error)?;
    if let Some(message) = response.service_error() {
        warn!("Prediction service reported a batch error: {}", message);
        return Err(Error::Network(message.to_string()));
    }

    Ok(response)
}

fn parsing_error(error: impl Display) -> Error {
    Error::Network(format!("Network/Parsing Error: {}", error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn percentage_bounds() {
        assert!(PredictionRequest::new(vec!["CCO".to_string()], 95).is_ok());
        assert!(PredictionRequest::new(vec!["CCO".to_string()], 1).is_ok());
        assert!(matches!(
            PredictionRequest::new(vec!["CCO".to_string()], 0),
            Err(Error::InvalidPercentage(_))
        ));
        assert!(matches!(validate_percentage(100), Err(Error::InvalidPercentage(_))));
    }

    #[test]
    fn request_serializes_to_wire_shape() {
        let request = PredictionRequest::new(vec!["CCO".to_string(), "CCN".to_string()], 90).unwrap();
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"compound": ["CCO", "CCN"], "percentage": 90})
        );
    }

    #[test]
    fn non_success_prefers_body_error() {
        let err = interpret_response(422, json!({"error": "Too many compounds"})).unwrap_err();
        assert_eq!(err.to_string(), "Too many compounds");

        let err = interpret_response(503, json!({"detail": "down"})).unwrap_err();
        assert_eq!(err.to_string(), "Server Error: 503");
    }

    #[test]
    fn success_with_error_field_is_an_error() {
        let err = interpret_response(200, json!({"error": "Model not loaded"})).unwrap_err();
        assert!(matches!(err, Error::Network(ref message) if message == "Model not loaded"));
    }

    #[test]
    fn malformed_success_body_is_a_parsing_error() {
        let err = interpret_response(200, json!({"classification_results": []})).unwrap_err();
        assert!(err.to_string().starts_with("Network/Parsing Error:"));
    }

    #[test]
    fn malformed_regression_entries_keep_the_batch() {
        let response = interpret_response(
            200,
            json!({
                "classification_results": {"A": "Activator", "B": "Inhibitor"},
                "regression_results": {
                    "A": {
                        "regression_AC50_median": "n/a",
                        "regression_AC50_lower_bound": 1.0,
                        "regression_AC50_upper_bound": 3.0
                    },
                    "B": null
                }
            }),
        )
        .unwrap();

        assert_eq!(response.classification_results.len(), 2);
        let entry = response.regression("A").unwrap();
        assert_eq!(entry.median, None);
        assert_eq!(entry.lower_bound, Some(1.0));
        assert!(response.regression("B").is_none());
    }

    #[test]
    fn success_body_parses() {
        let response = interpret_response(
            200,
            json!({"classification_results": {"CCO": "Decoy"}}),
        )
        .unwrap();
        assert_eq!(response.classification_results.len(), 1);
    }
}
