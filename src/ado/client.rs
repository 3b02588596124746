use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::WorkItemTracking;
use crate::config::AdoConfig;
use crate::error::{AdoError, ServiceError};
use crate::model::state_catalog::WorkItemTypeInfo;
use crate::model::work_item::{PatchOperation, RawWorkItem};

const API_VERSION: &str = "7.1";
const JSON_PATCH: &str = "application/json-patch+json";

/// REST client for the Azure DevOps Work Item Tracking API.
pub struct AdoClient {
    base_url: String,
    client: reqwest::Client,
}

impl AdoClient {
    pub fn connect(config: &AdoConfig) -> Result<Self, AdoError> {
        let url = Url::parse(config.organization_url.trim()).map_err(|e| {
            AdoError::Connection(format!(
                "invalid organization URL '{}': {e}",
                config.organization_url
            ))
        })?;

        let creds = format!(":{}", config.pat);
        let encoded = base64::engine::general_purpose::STANDARD.encode(creds);
        let mut auth = HeaderValue::from_str(&format!("Basic {encoded}"))
            .map_err(|_| AdoError::Connection("credential contains invalid characters".into()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| AdoError::Connection(e.to_string()))?;

        tracing::info!(organization = %url, "Connected to Azure DevOps");
        Ok(Self {
            base_url: url.as_str().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn wit_url(&self, project: &str, path: &str) -> String {
        format!(
            "{}/{}/_apis/wit/{path}",
            self.base_url,
            urlencoding::encode(project)
        )
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T, AdoError> {
        let resp = request
            .query(&[("api-version", API_VERSION)])
            .send()
            .await
            .map_err(|e| transport_error(e, what))?;

        let status = resp.status();
        if status == StatusCode::NON_AUTHORITATIVE_INFORMATION || status == StatusCode::UNAUTHORIZED {
            return Err(ServiceError {
                status: status.as_u16(),
                type_key: None,
                message: format!(
                    "Azure DevOps rejected the personal access token (HTTP {})",
                    status.as_u16()
                ),
            }
            .into());
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(service_error(status, &body).into());
        }

        let body = resp
            .text()
            .await
            .map_err(|e| transport_error(e, what))?;
        let parsed = serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse Azure DevOps {what} response"))?;
        Ok(parsed)
    }
}

fn transport_error(err: reqwest::Error, what: &str) -> AdoError {
    if err.is_connect() || err.is_timeout() {
        AdoError::Connection(err.to_string())
    } else {
        AdoError::Other(anyhow::Error::new(err).context(format!("Azure DevOps {what} request failed")))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    message: String,
    type_key: Option<String>,
}

fn service_error(status: StatusCode, body: &str) -> ServiceError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => ServiceError {
            status: status.as_u16(),
            type_key: parsed.type_key,
            message: parsed.message,
        },
        Err(_) => {
            let snippet: String = body.chars().take(200).collect();
            ServiceError {
                status: status.as_u16(),
                type_key: None,
                message: format!("Azure DevOps returned HTTP {}: {}", status.as_u16(), snippet.trim()),
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WiqlResponse {
    #[serde(default)]
    work_items: Vec<WorkItemReference>,
}

#[derive(Deserialize)]
struct WorkItemReference {
    id: i64,
}

#[derive(Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[async_trait]
impl WorkItemTracking for AdoClient {
    async fn query_by_wiql(
        &self,
        project: &str,
        query: &str,
        top: usize,
    ) -> Result<Vec<i64>, AdoError> {
        let request = self
            .client
            .post(self.wit_url(project, "wiql"))
            .query(&[("$top", top.to_string())])
            .json(&serde_json::json!({ "query": query }));
        let resp: WiqlResponse = self.send(request, "WIQL").await?;
        Ok(resp.work_items.into_iter().map(|r| r.id).collect())
    }

    async fn get_work_items(
        &self,
        project: &str,
        ids: &[i64],
        fields: &[&str],
    ) -> Result<Vec<RawWorkItem>, AdoError> {
        let ids = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let request = self
            .client
            .get(self.wit_url(project, "workitems"))
            .query(&[("ids", ids), ("fields", fields.join(","))]);
        let resp: ListResponse<RawWorkItem> = self.send(request, "work items").await?;
        Ok(resp.value)
    }

    async fn create_work_item(
        &self,
        project: &str,
        work_item_type: &str,
        document: &[PatchOperation],
    ) -> Result<RawWorkItem, AdoError> {
        let path = format!("workitems/${}", urlencoding::encode(work_item_type));
        let body = serde_json::to_vec(document).context("Failed to encode patch document")?;
        let request = self
            .client
            .post(self.wit_url(project, &path))
            .header(CONTENT_TYPE, JSON_PATCH)
            .body(body);
        self.send(request, "create work item").await
    }

    async fn update_work_item(
        &self,
        project: &str,
        id: i64,
        document: &[PatchOperation],
    ) -> Result<RawWorkItem, AdoError> {
        let body = serde_json::to_vec(document).context("Failed to encode patch document")?;
        let request = self
            .client
            .patch(self.wit_url(project, &format!("workitems/{id}")))
            .header(CONTENT_TYPE, JSON_PATCH)
            .body(body);
        self.send(request, "update work item").await
    }

    async fn get_work_item_types(&self, project: &str) -> Result<Vec<WorkItemTypeInfo>, AdoError> {
        let request = self.client.get(self.wit_url(project, "workitemtypes"));
        let resp: ListResponse<WorkItemTypeInfo> = self.send(request, "work item types").await?;
        Ok(resp.value)
    }

    async fn get_work_item_type(
        &self,
        project: &str,
        work_item_type: &str,
    ) -> Result<WorkItemTypeInfo, AdoError> {
        let path = format!("workitemtypes/{}", urlencoding::encode(work_item_type));
        let request = self.client.get(self.wit_url(project, &path));
        self.send(request, "work item type").await
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    fn config(url: &str) -> AdoConfig {
        AdoConfig {
            pat: "pat".into(),
            organization_url: url.into(),
            project: "proj".into(),
        }
    }

    #[test]
    fn invalid_org_url_is_connection_error() {
        let err = AdoClient::connect(&config("not a url")).err().unwrap();
        assert!(matches!(err, AdoError::Connection(_)));
    }

    #[test]
    fn wit_urls_encode_project() {
        let client = AdoClient::connect(&config("https://dev.azure.com/org/")).unwrap();
        assert_eq!(
            client.wit_url("My Project", "wiql"),
            "https://dev.azure.com/org/My%20Project/_apis/wit/wiql"
        );
    }

    #[test]
    fn service_error_parses_ado_body() {
        let body = r#"{"$id":"1","innerException":null,"message":"TF401232: Work item 99 does not exist.","typeName":"Microsoft.TeamFoundation.WorkItemTracking.Server.WorkItemUnauthorizedAccessException","typeKey":"WorkItemUnauthorizedAccessException","errorCode":0,"eventId":3200}"#;
        let err = service_error(StatusCode::NOT_FOUND, body);
        assert_eq!(err.status, 404);
        assert_eq!(err.message, "TF401232: Work item 99 does not exist.");
        assert_eq!(err.type_key.as_deref(), Some("WorkItemUnauthorizedAccessException"));
    }

    #[test]
    fn service_error_without_json_body() {
        let err = service_error(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert_eq!(err.status, 502);
        assert!(err.message.contains("HTTP 502"));
    }
}
