use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

use super::schema_service::API_TOKEN_HEADER;
use crate::error::{AdapterError, AdapterResult};
use crate::models::Credentials;

pub const JOB_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Lifecycle state of a Spark application run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationState {
    Enqueued,
    Submitted,
    Running,
    Completed,
    Failed,
    Aborted,
    Aborting,
    Unknown(String),
}

impl ApplicationState {
    pub fn from_status(status: &str) -> Self {
        match status.trim().to_ascii_uppercase().as_str() {
            "ENQUEUED" => ApplicationState::Enqueued,
            "SUBMITTED" => ApplicationState::Submitted,
            "RUNNING" => ApplicationState::Running,
            "COMPLETED" => ApplicationState::Completed,
            "FAILED" => ApplicationState::Failed,
            "ABORTED" => ApplicationState::Aborted,
            "ABORTING" => ApplicationState::Aborting,
            _ => ApplicationState::Unknown(status.to_string()),
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(
            self,
            ApplicationState::Completed | ApplicationState::Failed | ApplicationState::Aborted
        )
    }

    pub fn is_successful(&self) -> bool {
        *self == ApplicationState::Completed
    }
}

impl fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApplicationState::Enqueued => "ENQUEUED",
            ApplicationState::Submitted => "SUBMITTED",
            ApplicationState::Running => "RUNNING",
            ApplicationState::Completed => "COMPLETED",
            ApplicationState::Failed => "FAILED",
            ApplicationState::Aborted => "ABORTED",
            ApplicationState::Aborting => "ABORTING",
            ApplicationState::Unknown(status) => status.as_str(),
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobOverrides {
    #[serde(default)]
    pub arguments: Option<Vec<String>>,
    #[serde(rename = "envVars", default)]
    pub env_vars: Option<HashMap<String, String>>,
    #[serde(rename = "sparkConf", default)]
    pub spark_conf: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PythonModelConfig {
    #[serde(default)]
    pub spark_job_id: Option<String>,
    #[serde(default)]
    pub spark_job_overrides: Option<JobOverrides>,
}

/// The parts of a parsed Python model the job submission needs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PythonModel {
    pub alias: String,
    pub schema: String,
    #[serde(default)]
    pub config: PythonModelConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRunRequest {
    #[serde(rename = "pythonScript")]
    pub python_script: String,
    pub arguments: Option<Vec<String>>,
    #[serde(rename = "envVars")]
    pub env_vars: Option<HashMap<String, String>>,
    #[serde(rename = "sparkConf")]
    pub spark_conf: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobRun {
    pub id: String,
    #[serde(rename = "driverStatus", default)]
    pub driver_status: Option<String>,
}

impl JobRun {
    pub fn state(&self) -> ApplicationState {
        ApplicationState::from_status(self.driver_status.as_deref().unwrap_or_default())
    }
}

/// REST client for Spark job runs of one domain
#[derive(Debug, Clone)]
pub struct SparkJobClient {
    client: Client,
    base: Url,
    domain: String,
    token: Option<String>,
}

impl SparkJobClient {
    pub fn new(base: Url, domain: impl Into<String>, token: Option<String>) -> AdapterResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AdapterError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base,
            domain: domain.into(),
            token,
        })
    }

    pub fn from_credentials(creds: &Credentials) -> AdapterResult<Self> {
        let domain = creds.domain().ok_or_else(|| {
            AdapterError::Configuration("domain is required for submitting python models.".to_string())
        })?;
        let host = creds.host().ok_or_else(|| {
            AdapterError::Configuration("host is required for submitting python models.".to_string())
        })?;
        let raw = format!("{}://{}:{}", creds.scheme(), host, creds.port());
        let base = Url::parse(&raw)
            .map_err(|e| AdapterError::Configuration(format!("Invalid job API URL '{}': {}", raw, e)))?;
        Self::new(base, domain, creds.token().map(str::to_string))
    }

    fn runs_url(&self, job_id: &str, run_id: Option<&str>) -> AdapterResult<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                AdapterError::Configuration(format!("Job API URL '{}' cannot be a base", self.base))
            })?;
            segments.pop_if_empty();
            segments.extend(["api", "v1", "domains", self.domain.as_str(), "spark", "jobs", job_id, "runs"]);
            if let Some(run_id) = run_id {
                segments.push(run_id);
            }
        }
        Ok(url)
    }

    pub async fn submit_job_run(&self, job_id: &str, request: &JobRunRequest) -> AdapterResult<JobRun> {
        let url = self.runs_url(job_id, None)?;
        let mut builder = self.client.post(url).json(request);
        if let Some(token) = &self.token {
            builder = builder.header(API_TOKEN_HEADER, token);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| AdapterError::Runtime(format!("Failed to submit run of job {}: {}", job_id, e)))?;
        Self::parse(response, job_id).await
    }

    pub async fn get_job_run(&self, job_id: &str, run_id: &str) -> AdapterResult<JobRun> {
        let url = self.runs_url(job_id, Some(run_id))?;
        let mut builder = self.client.get(url);
        if let Some(token) = &self.token {
            builder = builder.header(API_TOKEN_HEADER, token);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| AdapterError::Runtime(format!("Failed to get run {} of job {}: {}", run_id, job_id, e)))?;
        Self::parse(response, job_id).await
    }

    async fn parse(response: reqwest::Response, job_id: &str) -> AdapterResult<JobRun> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AdapterError::Runtime(format!(
                "Job API request for {} failed ({}): {}",
                job_id, status, body
            )));
        }
        response
            .json::<JobRun>()
            .await
            .map_err(|e| AdapterError::Runtime(format!("Failed to parse job API response: {}", e)))
    }
}

/// Runs a compiled Python model as a run of a pre-registered Spark job
pub struct PythonJobHelper {
    client: SparkJobClient,
    model: PythonModel,
    poll_interval: Duration,
}

impl PythonJobHelper {
    pub fn new(client: SparkJobClient, model: PythonModel) -> Self {
        Self {
            client,
            model,
            poll_interval: JOB_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn job_id(&self) -> AdapterResult<&str> {
        self.model
            .config
            .spark_job_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AdapterError::Configuration(
                    "spark_job_id is required for submitting python models.".to_string(),
                )
            })
    }

    /// Submit `compiled_code` and wait for the run to reach a final state
    pub async fn submit(&self, compiled_code: &str, cancel: &CancellationToken) -> AdapterResult<JobRun> {
        let job_id = self.job_id()?;
        let overrides = self.model.config.spark_job_overrides.clone().unwrap_or_default();

        let request = JobRunRequest {
            python_script: compiled_code.to_string(),
            arguments: overrides.arguments,
            env_vars: overrides.env_vars,
            spark_conf: overrides.spark_conf,
        };
        let run = self.client.submit_job_run(job_id, &request).await?;
        info!(
            "Spark job ({}) for {}.{} triggered with run_id: {}",
            job_id, self.model.schema, self.model.alias, run.id
        );

        self.monitor_state(job_id, &run.id, cancel).await
    }

    async fn monitor_state(&self, job_id: &str, run_id: &str, cancel: &CancellationToken) -> AdapterResult<JobRun> {
        loop {
            let run = self.client.get_job_run(job_id, run_id).await?;
            let state = run.state();

            if state.is_final() {
                if state.is_successful() {
                    info!("{} completed successfully.", job_id);
                    return Ok(run);
                }
                return Err(AdapterError::Runtime(format!(
                    "Job {} failed with terminal state: {}",
                    job_id, state
                )));
            }

            info!("{} in app state: {}", job_id, state);
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(AdapterError::Runtime(format!(
                        "Monitoring of job {} run {} was cancelled",
                        job_id, run_id
                    )));
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }
}
