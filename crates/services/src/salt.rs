//! Salt API (rest_cherrypy) client.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;

use invsync_connector::{CollaboratorError, GrainsSource};
use invsync_core::config::SaltConfig;
use invsync_core::profile::TargetType;
use invsync_core::MinionGrains;

use crate::http::ApiClient;

const SERVICE: &str = "salt";
const TOKEN_HEADER: &str = "X-Auth-Token";
const POLL_INTERVAL: Duration = Duration::from_secs(2);
const JOB_TIMEOUT: Duration = Duration::from_secs(120);

pub struct SaltClient {
    api: ApiClient,
    username: String,
    password: String,
    eauth: String,
    token: RwLock<Option<String>>,
}

impl SaltClient {
    pub fn new(config: &SaltConfig, timeout_secs: u64) -> Result<Self, CollaboratorError> {
        let api = ApiClient::new(SERVICE, &config.api_url, &[], timeout_secs, config.verify_ssl)?;
        Ok(Self {
            api,
            username: config.username.clone().unwrap_or_default(),
            password: config.password.clone().unwrap_or_default(),
            eauth: config.eauth.clone(),
            token: RwLock::new(None),
        })
    }

    /// Authenticate and keep the session token for later calls.
    pub async fn login(&self) -> Result<(), CollaboratorError> {
        tracing::info!(url = %self.api.url("/login"), "Authenticating with Salt API");
        let body = json!({
            "username": self.username,
            "password": self.password,
            "eauth": self.eauth,
        });
        let response = self.api.post("/login", &body).await?;
        let token = session_token(&response)?;
        *self.token.write().await = Some(token);
        tracing::info!("Authenticated with Salt API");
        Ok(())
    }

    async fn token(&self) -> Result<String, CollaboratorError> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        self.login().await?;
        self.token.read().await.clone().ok_or(CollaboratorError::Auth {
            service: SERVICE,
            status: 401,
        })
    }

    async fn authed(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, CollaboratorError> {
        let token = self.token().await?;
        let request = self.api.request(method, path).header(TOKEN_HEADER, token);
        let request = match body {
            Some(body) => request.json(body),
            None => request,
        };
        self.api.send(path, request).await
    }

    /// Submit `fun` asynchronously and poll the job until every targeted minion returned.
    ///
    /// Returns the per-minion results keyed by minion id.
    pub async fn run_command(
        &self,
        fun: &str,
        target: &str,
        target_type: TargetType,
        args: &[Value],
    ) -> Result<Map<String, Value>, CollaboratorError> {
        let lowstate = json!([{
            "client": "local_async",
            "tgt": target,
            "fun": fun,
            "tgt_type": target_type.as_str(),
            "arg": args,
            "kwarg": {},
        }]);
        tracing::debug!(fun, target, %target_type, "Submitting Salt job");
        let submitted = self.authed(Method::POST, "/minions", Some(&lowstate)).await?;
        let jid = job_id(&submitted)?;
        tracing::info!(jid = %jid, fun, "Submitted Salt job");

        let path = format!("/jobs/{jid}");
        let started = tokio::time::Instant::now();
        loop {
            let job = self.authed(Method::GET, &path, None).await?;
            match job_progress(&job) {
                JobProgress::NoTargets => {
                    tracing::warn!(jid = %jid, "Job did not target any minions");
                    return Ok(Map::new());
                }
                JobProgress::Complete(results) => {
                    tracing::info!(jid = %jid, minions = results.len(), "Job complete");
                    return Ok(results);
                }
                JobProgress::Pending { returned, targeted } => {
                    tracing::debug!(jid = %jid, returned, targeted, "Job running");
                }
            }
            if started.elapsed() + POLL_INTERVAL > JOB_TIMEOUT {
                return Err(CollaboratorError::Timeout {
                    service: SERVICE,
                    secs: JOB_TIMEOUT.as_secs(),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl GrainsSource for SaltClient {
    async fn minion_grains(&self, target: &str, target_type: TargetType) -> Result<Vec<MinionGrains>, CollaboratorError> {
        let results = self.run_command("grains.items", target, target_type, &[]).await?;
        Ok(MinionGrains::from_return(&results))
    }
}

fn session_token(response: &Value) -> Result<String, CollaboratorError> {
    response
        .pointer("/return/0/token")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CollaboratorError::Decode {
            service: SERVICE,
            message: "login response carries no token".to_string(),
        })
}

fn job_id(response: &Value) -> Result<String, CollaboratorError> {
    response
        .pointer("/return/0/jid")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CollaboratorError::Decode {
            service: SERVICE,
            message: format!("job submission response carries no jid: {response}"),
        })
}

#[derive(Debug, PartialEq)]
enum JobProgress {
    NoTargets,
    Pending { returned: usize, targeted: usize },
    Complete(Map<String, Value>),
}

fn job_progress(job: &Value) -> JobProgress {
    let targeted: BTreeSet<&str> = job
        .pointer("/info/0/Minions")
        .and_then(Value::as_array)
        .map(|minions| minions.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if targeted.is_empty() {
        return JobProgress::NoTargets;
    }
    let returned = job
        .pointer("/return/0")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    if targeted.iter().all(|m| returned.contains_key(*m)) {
        JobProgress::Complete(returned)
    } else {
        JobProgress::Pending {
            returned: returned.len(),
            targeted: targeted.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_and_jid_are_extracted() {
        let login = json!({ "return": [{ "token": "6d1b722e", "expire": 1700000000.0, "eauth": "pam" }] });
        assert_eq!(session_token(&login).unwrap(), "6d1b722e");
        assert!(session_token(&json!({ "return": [] })).is_err());

        let submitted = json!({ "return": [{ "jid": "20240101120000123456", "minions": ["web01"] }] });
        assert_eq!(job_id(&submitted).unwrap(), "20240101120000123456");
        assert!(matches!(job_id(&json!({})), Err(CollaboratorError::Decode { .. })));
    }

    #[test]
    fn job_completes_when_all_targets_returned() {
        let pending = json!({
            "info": [{ "Minions": ["db01", "web01"] }],
            "return": [{ "web01": { "saltversion": "3006.9" } }]
        });
        assert_eq!(job_progress(&pending), JobProgress::Pending { returned: 1, targeted: 2 });

        let done = json!({
            "info": [{ "Minions": ["db01", "web01"] }],
            "return": [{ "web01": { "saltversion": "3006.9" }, "db01": false }]
        });
        match job_progress(&done) {
            JobProgress::Complete(results) => assert_eq!(results["db01"], json!(false)),
            other => panic!("expected complete, got {other:?}"),
        }
    }

    #[test]
    fn job_without_targets_is_empty() {
        assert_eq!(job_progress(&json!({ "info": [{ "Minions": [] }], "return": [{}] })), JobProgress::NoTargets);
        assert_eq!(job_progress(&json!({})), JobProgress::NoTargets);
    }
}
