//! [`ProjectClient`] over the project-management REST API.
//!
//! Requests carry a bearer token and the configured user agent. Transport
//! errors and 5xx responses are retried up to [`ProviderConfig::retry_count`]
//! times with a fixed pause; every other response is final.
//!
//! Names are sent as single percent-encoded path segments, so a `/`, `?` or
//! `#` inside a member, role or repository name never changes the route.
//!
//! Failed responses become [`ProviderError::Remote`] carrying status, method,
//! URL and body, or [`ProviderError::PermissionDenied`] for 401 and 403.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::client::{EnvironmentBody, MembershipBody, ProjectBody, ProjectClient, RoleBody};
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::model::MembershipKind;

const PROJECTS: [&str; 4] = ["access", "api", "v1", "projects"];
const REPOSITORIES: [&str; 3] = ["artifactory", "api", "repositories"];

#[derive(Debug, Deserialize)]
struct MembershipList {
    #[serde(default)]
    members: Vec<MembershipBody>,
}

#[derive(Debug, Deserialize)]
struct RepositorySummary {
    key: String,
}

/// HTTP implementation of [`ProjectClient`].
#[derive(Debug, Clone)]
pub struct HttpProjectClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl HttpProjectClient {
    /// Build a client from the provider configuration.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }

    /// `/access/api/v1/projects` followed by `segments`.
    fn projects_url(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        self.config.endpoint(PROJECTS.iter().chain(segments))
    }

    /// Send one request, retrying transport errors and 5xx responses.
    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Response, ProviderError> {
        let attempts = self.config.retry_count.saturating_add(1);

        for attempt in 1..=attempts {
            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .bearer_auth(&self.config.access_token)
                .header(ACCEPT, "application/json");
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) if response.status().is_server_error() && attempt < attempts => {
                    warn!(
                        %method,
                        %url,
                        status = response.status().as_u16(),
                        attempt,
                        "retrying after server error"
                    );
                },
                Ok(response) => return check_status(&method, &url, response).await,
                Err(err) if attempt < attempts => {
                    warn!(%method, %url, error = %err, attempt, "retrying after transport error");
                },
                Err(err) => return Err(ProviderError::Transport(err)),
            }
            tokio::time::sleep(self.config.retry_wait).await;
        }

        Err(ProviderError::InvalidRequest(format!(
            "no attempts made for {} {}",
            method, url
        )))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ProviderError> {
        let response = self.execute(Method::GET, url, None).await?;
        Ok(response.json().await?)
    }

    /// Send a JSON body; the response body is not read.
    async fn send_json<B: Serialize>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> Result<(), ProviderError> {
        let body = serde_json::to_value(body)?;
        self.execute(method, url, Some(&body)).await?;
        Ok(())
    }

    async fn send_empty(&self, method: Method, url: Url) -> Result<(), ProviderError> {
        self.execute(method, url, None).await?;
        Ok(())
    }
}

async fn check_status(
    method: &Method,
    url: &Url,
    response: Response,
) -> Result<Response, ProviderError> {
    let status = response.status();
    debug!(%method, %url, status = status.as_u16(), "response");
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ProviderError::PermissionDenied(
            format!("{} {} {}: {}", status.as_u16(), method, url, body),
        )),
        _ => Err(ProviderError::Remote {
            status: status.as_u16(),
            method: method.to_string(),
            url: url.to_string(),
            body,
        }),
    }
}

#[async_trait]
impl ProjectClient for HttpProjectClient {
    #[instrument(skip(self))]
    async fn project_exists(&self, key: &str) -> Result<bool, ProviderError> {
        match self.send_empty(Method::HEAD, self.projects_url(&[key])?).await {
            Ok(()) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    #[instrument(skip(self))]
    async fn get_project(&self, key: &str) -> Result<ProjectBody, ProviderError> {
        self.get_json(self.projects_url(&[key])?).await
    }

    #[instrument(skip(self, body), fields(key = %body.project_key))]
    async fn create_project(&self, body: &ProjectBody) -> Result<(), ProviderError> {
        self.send_json(Method::POST, self.projects_url(&[])?, body)
            .await
    }

    #[instrument(skip(self, body))]
    async fn update_project(&self, key: &str, body: &ProjectBody) -> Result<(), ProviderError> {
        self.send_json(Method::PUT, self.projects_url(&[key])?, body)
            .await
    }

    #[instrument(skip(self))]
    async fn delete_project(&self, key: &str) -> Result<(), ProviderError> {
        self.send_empty(Method::DELETE, self.projects_url(&[key])?)
            .await
    }

    #[instrument(skip(self))]
    async fn list_memberships(
        &self,
        key: &str,
        kind: MembershipKind,
    ) -> Result<Vec<MembershipBody>, ProviderError> {
        let url = self.projects_url(&[key, kind.path_segment()])?;
        let list: MembershipList = self.get_json(url).await?;
        Ok(list.members)
    }

    #[instrument(skip(self, body), fields(name = %body.name))]
    async fn put_membership(
        &self,
        key: &str,
        kind: MembershipKind,
        body: &MembershipBody,
    ) -> Result<(), ProviderError> {
        let url = self.projects_url(&[key, kind.path_segment(), &body.name])?;
        self.send_json(Method::PUT, url, body).await
    }

    #[instrument(skip(self))]
    async fn delete_membership(
        &self,
        key: &str,
        kind: MembershipKind,
        name: &str,
    ) -> Result<(), ProviderError> {
        let url = self.projects_url(&[key, kind.path_segment(), name])?;
        self.send_empty(Method::DELETE, url).await
    }

    #[instrument(skip(self))]
    async fn list_roles(&self, key: &str) -> Result<Vec<RoleBody>, ProviderError> {
        self.get_json(self.projects_url(&[key, "roles"])?).await
    }

    #[instrument(skip(self, body), fields(name = %body.name))]
    async fn create_role(&self, key: &str, body: &RoleBody) -> Result<(), ProviderError> {
        let url = self.projects_url(&[key, "roles"])?;
        self.send_json(Method::POST, url, body).await
    }

    #[instrument(skip(self, body), fields(name = %body.name))]
    async fn update_role(&self, key: &str, body: &RoleBody) -> Result<(), ProviderError> {
        let url = self.projects_url(&[key, "roles", &body.name])?;
        self.send_json(Method::PUT, url, body).await
    }

    #[instrument(skip(self))]
    async fn delete_role(&self, key: &str, name: &str) -> Result<(), ProviderError> {
        let url = self.projects_url(&[key, "roles", name])?;
        self.send_empty(Method::DELETE, url).await
    }

    #[instrument(skip(self))]
    async fn list_repos(&self, key: &str) -> Result<Vec<String>, ProviderError> {
        let mut url = self.config.endpoint(REPOSITORIES)?;
        url.query_pairs_mut().append_pair("project", key);
        let repos: Vec<RepositorySummary> = self.get_json(url).await?;
        Ok(repos.into_iter().map(|r| r.key).collect())
    }

    #[instrument(skip(self))]
    async fn attach_repo(&self, key: &str, repo: &str) -> Result<(), ProviderError> {
        let mut url = self.projects_url(&["_", "attach", "repositories", repo, key])?;
        url.query_pairs_mut().append_pair("force", "true");
        self.send_empty(Method::PUT, url).await
    }

    #[instrument(skip(self))]
    async fn detach_repo(&self, repo: &str) -> Result<(), ProviderError> {
        let url = self.projects_url(&["_", "attach", "repositories", repo])?;
        self.send_empty(Method::DELETE, url).await
    }

    #[instrument(skip(self))]
    async fn list_environments(&self, key: &str) -> Result<Vec<EnvironmentBody>, ProviderError> {
        self.get_json(self.projects_url(&[key, "environments"])?)
            .await
    }

    #[instrument(skip(self, body), fields(name = %body.name))]
    async fn create_environment(
        &self,
        key: &str,
        body: &EnvironmentBody,
    ) -> Result<(), ProviderError> {
        let url = self.projects_url(&[key, "environments"])?;
        self.send_json(Method::POST, url, body).await
    }

    #[instrument(skip(self))]
    async fn rename_environment(
        &self,
        key: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<(), ProviderError> {
        let url = self.projects_url(&[key, "environments", old_name, "rename"])?;
        self.send_json(Method::POST, url, &json!({ "new_name": new_name }))
            .await
    }

    #[instrument(skip(self))]
    async fn delete_environment(&self, key: &str, name: &str) -> Result<(), ProviderError> {
        let url = self.projects_url(&[key, "environments", name])?;
        self.send_empty(Method::DELETE, url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> HttpProjectClient {
        let config = ProviderConfig::new(&server.uri(), "test-token")
            .unwrap()
            .with_retry(2, Duration::from_millis(1));
        HttpProjectClient::new(config).unwrap()
    }

    fn project_json() -> Value {
        json!({
            "project_key": "proj",
            "display_name": "Proj",
            "description": "",
            "admin_privileges": {
                "manage_members": true,
                "manage_resources": true,
                "index_resources": true
            },
            "storage_quota_bytes": -1,
            "soft_limit": true,
            "storage_quota_email_notification": false
        })
    }

    #[tokio::test]
    async fn test_get_project_sends_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/access/api/v1/projects/proj"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(project_json()))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let project = client.get_project("proj").await.unwrap();
        assert_eq!(project.project_key, "proj");
        assert_eq!(project.storage_quota_bytes, -1);
    }

    #[tokio::test]
    async fn test_project_exists() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/access/api/v1/projects/proj"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/access/api/v1/projects/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert!(client.project_exists("proj").await.unwrap());
        assert!(!client.project_exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/access/api/v1/projects/proj"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/access/api/v1/projects/proj"))
            .respond_with(ResponseTemplate::new(200).set_body_json(project_json()))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert!(client.get_project("proj").await.is_ok());
    }

    #[tokio::test]
    async fn test_gives_up_after_retry_budget() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(3)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.get_project("proj").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_transport_failure_exhausts_retries() {
        // Bind and release a port so nothing is listening on it.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let retry_wait = Duration::from_millis(50);
        let config = ProviderConfig::new(&format!("http://127.0.0.1:{}", port), "test-token")
            .unwrap()
            .with_retry(2, retry_wait);
        let client = HttpProjectClient::new(config).unwrap();

        let started = std::time::Instant::now();
        let err = client.get_project("proj").await.unwrap_err();

        assert!(matches!(err, ProviderError::Transport(_)));
        // Three attempts means two pauses.
        assert!(started.elapsed() >= retry_wait * 2);
    }

    #[tokio::test]
    async fn test_zero_retries_makes_one_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .expect(1)
            .mount(&server)
            .await;

        let config = ProviderConfig::new(&server.uri(), "test-token")
            .unwrap()
            .with_retry(0, Duration::from_millis(1));
        let client = HttpProjectClient::new(config).unwrap();
        assert_eq!(client.get_project("proj").await.unwrap_err().status(), Some(502));
    }

    #[tokio::test]
    async fn test_project_writes_ignore_response_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/access/api/v1/projects"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/access/api/v1/projects/proj"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"project_key\""))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let body: ProjectBody = serde_json::from_value(project_json()).unwrap();
        client.create_project(&body).await.unwrap();
        client.update_project("proj", &body).await.unwrap();
    }

    #[tokio::test]
    async fn test_names_stay_in_one_path_segment() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/access/api/v1/projects/proj/users/ci%2Fbot"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/access/api/v1/projects/proj/roles/qa%3Flead%23x"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let member = MembershipBody {
            name: "ci/bot".to_string(),
            roles: vec!["Developer".to_string()],
        };
        client
            .put_membership("proj", MembershipKind::User, &member)
            .await
            .unwrap();
        client.delete_role("proj", "qa?lead#x").await.unwrap();
    }

    #[tokio::test]
    async fn test_conflict_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/access/api/v1/projects"))
            .respond_with(ResponseTemplate::new(409).set_body_string("exists"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let body: ProjectBody = serde_json::from_value(project_json()).unwrap();
        let err = client.create_project(&body).await.unwrap_err();

        assert!(err.is_conflict());
        let message = err.to_string();
        assert!(message.starts_with("\n409 POST http://"));
        assert!(message.ends_with("/access/api/v1/projects\nexists"));
    }

    #[tokio::test]
    async fn test_forbidden_is_permission_denied() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.delete_project("proj").await.unwrap_err();
        assert!(matches!(err, ProviderError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn test_list_memberships_and_repos() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/access/api/v1/projects/proj/groups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "members": [{"name": "group1", "roles": ["qa"]}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/artifactory/api/repositories"))
            .and(query_param("project", "proj"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"key": "repo1", "type": "LOCAL"},
                {"key": "repo2", "type": "REMOTE"}
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let groups = client
            .list_memberships("proj", MembershipKind::Group)
            .await
            .unwrap();
        assert_eq!(groups[0].name, "group1");
        assert_eq!(client.list_repos("proj").await.unwrap(), vec!["repo1", "repo2"]);
    }

    #[tokio::test]
    async fn test_attach_repo_forces() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/access/api/v1/projects/_/attach/repositories/repo1/proj"))
            .and(query_param("force", "true"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client.attach_repo("proj", "repo1").await.unwrap();
    }

    #[tokio::test]
    async fn test_rename_environment_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/access/api/v1/projects/proj/environments/proj-dev/rename"))
            .and(body_json(json!({"new_name": "proj-qa"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        client
            .rename_environment("proj", "proj-dev", "proj-qa")
            .await
            .unwrap();
    }
}
