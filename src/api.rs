use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::record::Record;

/// What went wrong talking to the backend. `Network` means the server was
/// unreachable; `Backend` carries the server's own error message. Both leave
/// caller state untouched and are shown to the user as-is.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Server not reachable: {0}")]
    Network(String),
    #[error("{0}")]
    Backend(String),
    #[error("Malformed response from server: {0}")]
    Decode(String),
}

/// The JSON envelope every endpoint answers with. `status` discriminates
/// success from error; `data` carries page rows where applicable.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub data: Option<Vec<Record>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Envelope {
    /// Accept `status == "success"`, or a bare ack with no status field
    /// (the submit endpoint answers `{"message": "Stored", ...}`).
    fn into_result(self) -> Result<Option<Vec<Record>>, ApiError> {
        match self.status.as_deref() {
            Some("success") | None => Ok(self.data),
            _ => Err(ApiError::Backend(
                self.error.unwrap_or_else(|| "Unknown error".to_string()),
            )),
        }
    }
}

/// Blocking client for the prediction backend. Cheap to clone; worker
/// threads each take their own copy.
#[derive(Clone)]
pub struct ApiClient {
    agent: ureq::Agent,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// One page of stored SKU sales records.
    pub fn fetch_table_data(&self, skip: usize) -> Result<Vec<Record>, ApiError> {
        self.fetch_page("/fetch-table-data", skip)
    }

    /// One page of bulk prediction output.
    pub fn fetch_results(&self, skip: usize) -> Result<Vec<Record>, ApiError> {
        self.fetch_page("/fetch-results", skip)
    }

    fn fetch_page(&self, path: &str, skip: usize) -> Result<Vec<Record>, ApiError> {
        let response = self
            .agent
            .get(&self.url(path))
            .query("skip", &skip.to_string())
            .call();
        let envelope = read_envelope(response)?;
        Ok(envelope.into_result()?.unwrap_or_default())
    }

    /// Store one feature-engineered item record.
    pub fn submit_input(&self, record: &Record) -> Result<(), ApiError> {
        let response = self
            .agent
            .post(&self.url("/submit-input"))
            .send_json(serde_json::Value::Object(record.clone()));
        let envelope = read_envelope(response)?;
        envelope.into_result()?;
        Ok(())
    }

    /// Kick off model training on the backend. Blocks until the server
    /// acknowledges, so call from a worker thread.
    pub fn train_model(&self) -> Result<(), ApiError> {
        let response = self.agent.post(&self.url("/train-model")).call();
        let envelope = read_envelope(response)?;
        envelope.into_result()?;
        Ok(())
    }

    /// Run bulk prediction and return the predicted rows.
    pub fn run_prediction(&self) -> Result<Vec<Record>, ApiError> {
        let response = self.agent.post(&self.url("/run-prediction")).call();
        let envelope = read_envelope(response)?;
        Ok(envelope.into_result()?.unwrap_or_default())
    }
}

/// Map a ureq response into the envelope, folding transport failures into
/// `Network` and non-2xx answers into `Backend` (preferring the server's own
/// error message when its body still parses).
fn read_envelope(
    response: Result<ureq::Response, ureq::Error>,
) -> Result<Envelope, ApiError> {
    match response {
        Ok(resp) => resp
            .into_json::<Envelope>()
            .map_err(|e| ApiError::Decode(e.to_string())),
        Err(ureq::Error::Status(code, resp)) => {
            let envelope = resp.into_json::<Envelope>().ok();
            let message = envelope
                .and_then(|e| e.error)
                .unwrap_or_else(|| format!("Server returned status {}", code));
            Err(ApiError::Backend(message))
        }
        Err(ureq::Error::Transport(t)) => Err(ApiError::Network(t.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(json: &str) -> Envelope {
        serde_json::from_str(json).expect("envelope should parse")
    }

    #[test]
    fn test_success_envelope_with_data() {
        let env = envelope(r#"{"status":"success","data":[{"item_id":"A","predicted_sales":3.2}]}"#);
        let data = env.into_result().unwrap().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["item_id"], serde_json::json!("A"));
    }

    #[test]
    fn test_error_envelope_carries_message() {
        let env = envelope(r#"{"status":"error","error":"No data found in MongoDB"}"#);
        match env.into_result() {
            Err(ApiError::Backend(msg)) => assert_eq!(msg, "No data found in MongoDB"),
            other => panic!("expected backend error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_error_envelope_without_message() {
        let env = envelope(r#"{"status":"error"}"#);
        match env.into_result() {
            Err(ApiError::Backend(msg)) => assert_eq!(msg, "Unknown error"),
            other => panic!("expected backend error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_bare_ack_is_success() {
        let env = envelope(r#"{"message":"Stored","id":"abc123"}"#);
        assert!(env.into_result().unwrap().is_none());
    }

    #[test]
    fn test_record_order_preserved() {
        let env = envelope(r#"{"status":"success","data":[{"z_last":1,"a_first":2,"m_mid":3}]}"#);
        let data = env.into_result().unwrap().unwrap();
        let keys: Vec<&String> = data[0].keys().collect();
        assert_eq!(keys, ["z_last", "a_first", "m_mid"]);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new("http://localhost:5050/", Duration::from_secs(5));
        assert_eq!(client.url("/train-model"), "http://localhost:5050/train-model");
    }
}
