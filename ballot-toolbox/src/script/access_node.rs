use super::{BlockSelector, ScriptArg, ScriptClient, ScriptError};
use crate::chain_value::ChainValue;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct ScriptRequest {
    script: String,
    arguments: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// [`ScriptClient`] talking to the REST API of an access node.
pub struct AccessNodeClient {
    base_url: String,
    client: Client,
}

impl AccessNodeClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ScriptError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ScriptError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScriptError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn encode_request(script: &str, args: &[ScriptArg]) -> Result<ScriptRequest, ScriptError> {
        let arguments = args
            .iter()
            .map(|arg| serde_json::to_vec(arg).map(|json| STANDARD.encode(json)))
            .collect::<Result<_, _>>()
            .map_err(ScriptError::Arguments)?;
        Ok(ScriptRequest {
            script: STANDARD.encode(script),
            arguments,
        })
    }
}

impl ScriptClient for AccessNodeClient {
    fn execute(
        &self,
        script: &str,
        args: &[ScriptArg],
        at: BlockSelector,
    ) -> Result<ChainValue, ScriptError> {
        let url = format!("{}/v1/scripts", self.base_url);
        debug!(%url, %at, ?args, "executing script");
        let request = Self::encode_request(script, args)?;

        let response = self
            .client
            .post(&url)
            .query(&[("block_height", at.to_string())])
            .json(&request)
            .send()
            .map_err(|e| ScriptError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ScriptError::Transport(format!("access node answered {}", status)));
        }
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .map(|body| body.message)
                .unwrap_or_default();
            return Err(ScriptError::Execution(format!("{}: {}", status, message)));
        }

        let encoded: String = response
            .json()
            .map_err(|e| ScriptError::Transport(e.to_string()))?;
        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ScriptError::Execution(format!("result is not base64: {}", e)))?;
        trace!(result = %String::from_utf8_lossy(&decoded), "script result");
        Ok(ChainValue::from_json_slice(&decoded)?)
    }
}
