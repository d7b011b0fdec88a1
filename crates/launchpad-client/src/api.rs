//! Typed platform endpoints
//!
//! Only the fields the launcher consumes are modelled; everything else in a
//! response is ignored (or kept as raw JSON where it is shown to the user).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};
use std::fmt;
use tracing::info;

use crate::client::PlatformClient;
use crate::config::Environment;
use crate::error::ClientError;
use crate::Result;

/// Run-request status meaning every test case has finished
pub const RUN_COMPLETED: &str = "completed";

/// The only test-case status counted as a pass
pub const TEST_SUCCEEDED: &str = "succeeded";

/// Deployment state meaning the deploy finished successfully
pub const DEPLOYMENT_SUCCESS: &str = "success";

/// Deployment states that end a deploy without success
pub const DEPLOYMENT_FAILURE_STATES: &[&str] = &["failed", "error"];

/// Identifier assigned by the platform. Integers and strings are both
/// accepted and carried as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RemoteId(pub String);

impl RemoteId {
    pub fn new(id: impl Into<String>) -> Self {
        RemoteId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for RemoteId {
    fn from(id: u64) -> Self {
        RemoteId(id.to_string())
    }
}

impl Serialize for RemoteId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        // Numeric ids go back out as JSON numbers, like the platform sends them.
        match self.0.parse::<u64>() {
            Ok(n) => serializer.serialize_u64(n),
            Err(_) => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for RemoteId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(serde_json::Number),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => RemoteId(n.to_string()),
            Raw::Text(s) => RemoteId(s),
        })
    }
}

/// Handle of a long-running operation, bound to the environment whose
/// credentials created it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestHandle {
    pub id: RemoteId,
    pub env: Environment,
}

impl fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.env)
    }
}

/// `environment_type` query value for a deploy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentType {
    Test,
    Prod,
}

impl EnvironmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentType::Test => "test",
            EnvironmentType::Prod => "prod",
        }
    }
}

impl fmt::Display for EnvironmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeRef {
    #[serde(default)]
    pub id: Option<RemoteId>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRef {
    #[serde(default)]
    pub id: Option<RemoteId>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestCaseRef {
    #[serde(default)]
    pub name: Option<String>,
}

/// One executed test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recipe: RecipeRef,
    #[serde(default, deserialize_with = "null_as_default")]
    pub job: JobRef,
    #[serde(default, deserialize_with = "null_as_default")]
    pub test_case: TestCaseRef,
}

impl TestResult {
    /// Anything other than the success literal is a failure.
    pub fn succeeded(&self) -> bool {
        self.status == TEST_SUCCEEDED
    }

    pub fn recipe_name(&self) -> &str {
        self.recipe.name.as_deref().unwrap_or("")
    }

    pub fn test_case_name(&self) -> &str {
        self.test_case.name.as_deref().unwrap_or("")
    }
}

/// Snapshot of a test-case run request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub id: Option<RemoteId>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    /// Reported verbatim; the platform decides its type
    #[serde(default)]
    pub coverage: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<TestResult>,
}

impl RunRequest {
    pub fn is_completed(&self) -> bool {
        self.status == RUN_COMPLETED
    }
}

/// Snapshot of a deployment. `details` is the full response, shown to the
/// user when the deployment fails.
#[derive(Debug, Clone, PartialEq)]
pub struct Deployment {
    pub state: String,
    pub details: Value,
}

impl Deployment {
    pub fn from_value(details: Value) -> Self {
        let state = details
            .get("state")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Deployment { state, details }
    }

    pub fn succeeded(&self) -> bool {
        self.state == DEPLOYMENT_SUCCESS
    }

    pub fn is_terminal(&self) -> bool {
        self.succeeded() || DEPLOYMENT_FAILURE_STATES.contains(&self.state.as_str())
    }
}

/// Build metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectBuild {
    #[serde(default)]
    pub id: Option<RemoteId>,
    pub project_id: RemoteId,
}

/// Project as listed by `GET /api/projects`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: RemoteId,
    pub name: String,
    #[serde(default)]
    pub folder_id: Option<RemoteId>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct Launched {
    id: RemoteId,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProjectList {
    Bare(Vec<Project>),
    Wrapped { data: Vec<Project> },
}

/// Typed access to the endpoints the launcher consumes
#[derive(Clone)]
pub struct PlatformApi {
    client: PlatformClient,
}

impl PlatformApi {
    pub fn new(client: PlatformClient) -> Self {
        PlatformApi { client }
    }

    pub fn client(&self) -> &PlatformClient {
        &self.client
    }

    /// `POST /api/test_cases/run_requests` in the test environment
    pub async fn launch_run_request(&self, project_id: &RemoteId) -> Result<RequestHandle> {
        let env = Environment::Test;
        let body = json!({ "project_id": project_id });
        let launched: Envelope<Launched> = self
            .client
            .post_json(env, "/api/test_cases/run_requests", Some(&body))
            .await?;

        info!(project_id = %project_id, run_request_id = %launched.data.id, "Launched test run");
        Ok(RequestHandle {
            id: launched.data.id,
            env,
        })
    }

    /// `GET /api/test_cases/run_requests/{id}`
    pub async fn fetch_run_request(&self, handle: &RequestHandle) -> Result<RunRequest> {
        let path = format!("/api/test_cases/run_requests/{}", handle.id);
        let envelope: Envelope<RunRequest> = self.client.get_json(handle.env, &path).await?;
        Ok(envelope.data)
    }

    /// `POST /api/project_builds/{id}/deploy?environment_type={env_type}` with
    /// the origin credentials
    pub async fn launch_deployment(
        &self,
        build_id: &RemoteId,
        env_type: EnvironmentType,
        description: Option<&str>,
    ) -> Result<RequestHandle> {
        let env = Environment::Dev;
        let path = format!(
            "/api/project_builds/{}/deploy?environment_type={}",
            build_id, env_type
        );
        let body = match description {
            Some(text) => json!({ "description": text }),
            None => json!({}),
        };
        let launched: Launched = self.client.post_json(env, &path, Some(&body)).await?;

        info!(
            build_id = %build_id,
            environment_type = %env_type,
            deployment_id = %launched.id,
            "Launched deployment"
        );
        Ok(RequestHandle {
            id: launched.id,
            env,
        })
    }

    /// `GET /api/deployments/{id}`
    pub async fn fetch_deployment(&self, handle: &RequestHandle) -> Result<Deployment> {
        let path = format!("/api/deployments/{}", handle.id);
        let details: Value = self.client.get_json(handle.env, &path).await?;
        if !details.is_object() {
            return Err(ClientError::Decode {
                url: self.client.config().url(&path),
                source: serde::de::Error::custom("deployment response is not an object"),
            });
        }
        Ok(Deployment::from_value(details))
    }

    /// `GET /api/project_builds/{id}`
    pub async fn fetch_project_build(
        &self,
        env: Environment,
        build_id: &RemoteId,
    ) -> Result<ProjectBuild> {
        let path = format!("/api/project_builds/{}", build_id);
        self.client.get_json(env, &path).await
    }

    /// `GET /api/projects`
    pub async fn list_projects(&self, env: Environment) -> Result<Vec<Project>> {
        let list: ProjectList = self.client.get_json(env, "/api/projects").await?;
        Ok(match list {
            ProjectList::Bare(projects) => projects,
            ProjectList::Wrapped { data } => data,
        })
    }
}
