//! Client for the ledger's HTTP JSON API.

use contract_registry::{Contract, ExerciseCommand, TemplateId};
use futures::{FutureExt, Stream, StreamExt};
use ledger_core::ledger::{CommandFuture, ContractStream, LedgerCommand, LedgerError, LedgerQuery};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("ledger answered {status}: {}", .errors.join("; "))]
    Status { status: u16, errors: Vec<String> },
    #[error("cannot decode ledger response: {0}")]
    Decode(String),
}

impl From<ClientError> for LedgerError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Http(e) => LedgerError::Transport(e.to_string()),
            ClientError::Status { status, .. } if status >= 500 => {
                LedgerError::Transport(err_text(status, &[]))
            }
            ClientError::Status { status, errors } => LedgerError::Rejected(err_text(status, &errors)),
            ClientError::Decode(msg) => LedgerError::Protocol(msg),
        }
    }
}

fn err_text(status: u16, errors: &[String]) -> String {
    if errors.is_empty() {
        format!("status {status}")
    } else {
        errors.join("; ")
    }
}

#[derive(Deserialize)]
struct Envelope {
    status: Option<u16>,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    errors: Vec<Value>,
}

/// Unwraps `{"status", "result", "errors"}`. The body's status wins over
/// the HTTP one when present.
pub fn decode_response(http_status: u16, body: &str) -> Result<Value, ClientError> {
    let envelope: Envelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(_) if http_status != 200 => {
            return Err(ClientError::Status {
                status: http_status,
                errors: Some(body.trim())
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .into_iter()
                    .collect(),
            })
        }
        Err(e) => return Err(ClientError::Decode(e.to_string())),
    };
    let status = envelope.status.unwrap_or(http_status);
    if status != 200 {
        return Err(ClientError::Status {
            status,
            errors: envelope
                .errors
                .into_iter()
                .map(|e| match e {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
        });
    }
    Ok(envelope.result)
}

pub fn decode_contracts(result: Value) -> Result<Vec<Contract>, ClientError> {
    serde_json::from_value(result).map_err(|e| ClientError::Decode(e.to_string()))
}

pub fn decode_exercise(result: Value) -> Value {
    match result {
        Value::Object(mut fields) => fields.remove("exerciseResult").unwrap_or(Value::Object(fields)),
        other => other,
    }
}

pub fn query_body(template: TemplateId) -> Value {
    json!({ "templateIds": [template.qualified_name()] })
}

pub fn exercise_body(command: &ExerciseCommand) -> Value {
    json!({
        "templateId": command.template_id.qualified_name(),
        "contractId": command.contract_id,
        "choice": command.choice,
        "argument": command.argument,
    })
}

#[derive(Clone, Debug)]
pub struct JsonApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl JsonApiClient {
    pub fn http_client() -> Result<reqwest::Client, ClientError> {
        Ok(reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()?)
    }

    pub fn new(http: reqwest::Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    pub async fn query(&self, template: TemplateId) -> Result<Vec<Contract>, ClientError> {
        let result = self.post("/v1/query", &query_body(template)).await?;
        decode_contracts(result)
    }

    pub async fn exercise(&self, command: &ExerciseCommand) -> Result<Value, ClientError> {
        tracing::info!(contract_id = %command.contract_id, choice = %command.choice, "exercise");
        let result = self.post("/v1/exercise", &exercise_body(command)).await?;
        Ok(decode_exercise(result))
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        let mut request = self.http.post(format!("{}{path}", self.base_url)).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        tracing::debug!(path, status, "ledger response");
        decode_response(status, &text)
    }

    /// Polls `template` every `interval`, yielding only when the active set
    /// changed. A failure is reported once per outage.
    pub fn poll(
        self,
        template: TemplateId,
        interval: Duration,
    ) -> impl Stream<Item = Result<Vec<Contract>, ClientError>> + Send + 'static {
        struct PollState {
            client: JsonApiClient,
            last: Option<Vec<Contract>>,
            failing: bool,
            started: bool,
        }

        let initial = PollState {
            client: self,
            last: None,
            failing: false,
            started: false,
        };
        futures::stream::unfold(initial, move |mut st| async move {
            loop {
                if st.started {
                    tokio::time::sleep(interval).await;
                }
                st.started = true;
                match st.client.query(template).await {
                    Ok(contracts) => {
                        st.failing = false;
                        if st.last.as_ref() == Some(&contracts) {
                            continue;
                        }
                        st.last = Some(contracts.clone());
                        return Some((Ok(contracts), st));
                    }
                    Err(err) => {
                        st.last = None;
                        if st.failing {
                            continue;
                        }
                        st.failing = true;
                        return Some((Err(err), st));
                    }
                }
            }
        })
    }
}

/// Default interval for the trait-level live query.
const STREAM_INTERVAL: Duration = Duration::from_millis(crate::config::DEFAULT_POLL_MS);

impl LedgerQuery for JsonApiClient {
    fn stream_query(&self, template: TemplateId) -> ContractStream {
        self.clone()
            .poll(template, STREAM_INTERVAL)
            .map(|update| update.map_err(LedgerError::from))
            .boxed_local()
    }
}

impl LedgerCommand for JsonApiClient {
    fn exercise(&self, command: ExerciseCommand) -> CommandFuture {
        let client = self.clone();
        async move { client.exercise(&command).await.map_err(LedgerError::from) }.boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contract_registry::{Choice, ContractId};

    #[test]
    fn decodes_query_result() {
        let body = r##"{"status":200,"result":[{"contractId":"#1:0","templateId":"abc123:DA.RefApps.Bond.Auction:Auction","payload":{"size":"10.0"}}]}"##;
        let contracts = decode_contracts(decode_response(200, body).expect("ok")).expect("contracts");
        assert_eq!(contracts.len(), 1);
        assert_eq!(contracts[0].template_id, TemplateId::Auction);
        assert_eq!(contracts[0].contract_id, ContractId::new("#1:0"));
    }

    #[test]
    fn error_bodies_map_to_ledger_errors() {
        let body = r#"{"status":400,"errors":["not a signatory"]}"#;
        let err = decode_response(400, body).expect_err("rejected");
        assert_eq!(
            LedgerError::from(err),
            LedgerError::Rejected("not a signatory".into())
        );

        let err = decode_response(503, "upstream down").expect_err("unavailable");
        assert!(matches!(LedgerError::from(err), LedgerError::Transport(_)));

        let err = decode_response(200, "not json").expect_err("garbage");
        assert!(matches!(LedgerError::from(err), LedgerError::Protocol(_)));
    }

    #[test]
    fn exercise_body_uses_qualified_template() {
        let cmd = ExerciseCommand::new(
            Choice::AuctionInviteBidders,
            ContractId::new("#4:1"),
            json!({"bidders": ["Bank1"]}),
        );
        assert_eq!(
            exercise_body(&cmd),
            json!({
                "templateId": TemplateId::Auction.qualified_name(),
                "contractId": "#4:1",
                "choice": "Auction_InviteBidders",
                "argument": {"bidders": ["Bank1"]}
            })
        );
        assert_eq!(
            decode_exercise(json!({"exerciseResult": ["#5:0"], "events": []})),
            json!(["#5:0"])
        );
    }

    #[tokio::test]
    async fn unreachable_ledger_is_a_transport_error() {
        let http = JsonApiClient::http_client().expect("client");
        let client = JsonApiClient::new(http, "http://127.0.0.1:9", None);
        let err = client.query(TemplateId::Auction).await.expect_err("no ledger");
        assert!(matches!(LedgerError::from(err), LedgerError::Transport(_)));
    }

    #[tokio::test]
    async fn poll_reports_outage_once() {
        let http = JsonApiClient::http_client().expect("client");
        let client = JsonApiClient::new(http, "http://127.0.0.1:9", None);
        let mut updates = Box::pin(client.poll(TemplateId::Auction, Duration::from_millis(5)));
        assert!(updates.next().await.expect("first").is_err());
        let second = tokio::time::timeout(Duration::from_millis(100), updates.next()).await;
        assert!(second.is_err(), "a continuing outage is not reported again");
    }
}
