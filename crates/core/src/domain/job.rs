// Job Domain Model

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Numeric job id supplied by the submitter
pub type JobId = u64;

/// Execution identity (session and principal the job runs on behalf of)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionIdentity {
    pub session_id: String,
    pub principal: String,
}

impl ExecutionIdentity {
    pub fn new(session_id: impl Into<String>, principal: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            principal: principal.into(),
        }
    }
}

impl fmt::Display for ExecutionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.principal, self.session_id)
    }
}

/// Locale tag (BCP 47, e.g. "de-CH")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locale(String);

impl Locale {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// User agent of the caller (UI layer / device description)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAgent(String);

impl UserAgent {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Transport request/response pair. Opaque to the engine.
#[derive(Clone)]
pub struct TransportContext {
    request: Arc<dyn Any + Send + Sync>,
    response: Arc<dyn Any + Send + Sync>,
}

impl TransportContext {
    pub fn new<Req, Resp>(request: Req, response: Resp) -> Self
    where
        Req: Any + Send + Sync,
        Resp: Any + Send + Sync,
    {
        Self {
            request: Arc::new(request),
            response: Arc::new(response),
        }
    }

    pub fn request<Req: Any>(&self) -> Option<&Req> {
        self.request.downcast_ref()
    }

    pub fn response<Resp: Any>(&self) -> Option<&Resp> {
        self.response.downcast_ref()
    }
}

impl fmt::Debug for TransportContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportContext").finish_non_exhaustive()
    }
}

/// How a job relates to a transaction bound on the submitting thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionScope {
    /// Join the submitter's transaction, or start a new one if none is bound
    Required,
    /// Always start and own a new transaction
    #[default]
    RequiresNew,
    /// Join the submitter's transaction; submission fails if none is bound
    Mandatory,
}

/// Job input descriptor. Built by the submitter, read-only once submitted.
#[derive(Debug, Clone, Default)]
pub struct JobInput {
    pub job_id: JobId,
    pub name: Option<String>,
    pub identity: Option<ExecutionIdentity>,
    pub locale: Option<Locale>,
    pub user_agent: Option<UserAgent>,
    pub transport: Option<TransportContext>,
    pub transaction_scope: TransactionScope,
    pub extensions: HashMap<String, serde_json::Value>,
}

impl JobInput {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_identity(mut self, identity: ExecutionIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = Some(locale);
        self
    }

    pub fn with_user_agent(mut self, user_agent: UserAgent) -> Self {
        self.user_agent = Some(user_agent);
        self
    }

    pub fn with_transport(mut self, transport: TransportContext) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_transaction_scope(mut self, scope: TransactionScope) -> Self {
        self.transaction_scope = scope;
        self
    }

    pub fn with_extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    pub fn extension(&self, key: &str) -> Option<&serde_json::Value> {
        self.extensions.get(key)
    }

    /// Human readable job name; falls back to `job-<id>`
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("job-{}", self.job_id),
        }
    }
}

/// Job State
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Scheduled,
    Running,
    Done,
    Cancelled,
}

impl JobState {
    /// Done or cancelled; no further transition possible
    pub fn is_finished(self) -> bool {
        matches!(self, JobState::Done | JobState::Cancelled)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Scheduled => write!(f, "SCHEDULED"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Done => write!(f, "DONE"),
            JobState::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Snapshot of an active job, as listed by the job manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInfo {
    pub job_id: JobId,
    pub name: String,
    pub identity: Option<ExecutionIdentity>,
    pub state: JobState,
    pub submitted_at: i64, // epoch ms
}
