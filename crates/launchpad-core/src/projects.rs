//! Cross-environment project resolution.
//!
//! Project ids are local to an environment. The only identity shared between
//! the origin and the target environment is the project name, so the join is
//! done by exact name match:
//!
//! 1. build metadata (origin) gives the origin project id
//! 2. origin project list maps that id to a name
//! 3. target project list must contain exactly one project with that name
//!
//! Renamed or duplicated projects break step 3. That is reported as
//! [`LaunchError::AmbiguousOrMissingMatch`] instead of guessing.

use launchpad_client::{Environment, PlatformApi, Project, RemoteId};
use tracing::{debug, info};

use crate::error::{LaunchError, Result};

/// Environment builds are created in
pub const ORIGIN: Environment = Environment::Dev;

/// Environment test runs execute in
pub const TARGET: Environment = Environment::Test;

/// Name of the project with `id`
pub fn find_project_name<'a>(projects: &'a [Project], id: &RemoteId) -> Result<&'a str> {
    projects
        .iter()
        .find(|p| &p.id == id)
        .map(|p| p.name.as_str())
        .ok_or_else(|| LaunchError::ProjectNotFound { id: id.to_string() })
}

/// The single project named `name`
pub fn match_project_by_name<'a>(projects: &'a [Project], name: &str) -> Result<&'a Project> {
    let matches: Vec<&Project> = projects.iter().filter(|p| p.name == name).collect();
    match matches.as_slice() {
        [project] => Ok(*project),
        _ => Err(LaunchError::AmbiguousOrMissingMatch {
            name: name.to_string(),
            matches: matches.len(),
        }),
    }
}

/// Name of the origin project a build belongs to
pub async fn resolve_project_name(api: &PlatformApi, build_id: &RemoteId) -> Result<String> {
    let build = api.fetch_project_build(ORIGIN, build_id).await?;
    let projects = api.list_projects(ORIGIN).await?;
    let name = find_project_name(&projects, &build.project_id)?.to_string();

    debug!(
        build_id = %build_id,
        project_id = %build.project_id,
        project_name = %name,
        "Resolved origin project"
    );
    Ok(name)
}

/// Id, in the target environment, of the project a build belongs to
pub async fn resolve_target_project_id(api: &PlatformApi, build_id: &RemoteId) -> Result<RemoteId> {
    let name = resolve_project_name(api, build_id).await?;
    let projects = api.list_projects(TARGET).await?;
    let project = match_project_by_name(&projects, &name)?;

    info!(project_name = %name, target_project_id = %project.id, "Resolved target project by name");
    Ok(project.id.clone())
}
