use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde_json::json;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use url::Url;

use crate::auth::Token;
use crate::error::{PulseError, Result};

use super::query::AnalyticalQuery;
use super::types::{
    decode_rows, AccessTokenResponse, JobReference, QueryResponse, QueryRow, TableSchema,
};
use super::Warehouse;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
/// How long a single `jobs.query`/`getQueryResults` call may block server-side
const SERVER_WAIT_MS: u64 = 10_000;
/// Refresh metadata tokens this long before they expire
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

enum Credentials {
    Static(Token),
    Metadata {
        url: String,
        cached: Mutex<Option<(Token, Instant)>>,
    },
}

/// BigQuery REST client running standard-SQL queries with named parameters.
pub struct BigQueryClient {
    client: Client,
    api_url: Url,
    location: String,
    credentials: Credentials,
    query_timeout: Duration,
}

impl BigQueryClient {
    /// Create a client for `project_id`.
    ///
    /// Without a static `token`, access tokens are fetched from the GCE/Cloud Run
    /// metadata server on first use and refreshed before expiry.
    pub fn new(
        base_url: &str,
        project_id: &str,
        location: &str,
        token: Option<Token>,
        query_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("repopulse/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PulseError::Config(format!("Failed to create HTTP client: {e}")))?;

        let api_url = Url::parse(base_url)
            .map_err(|e| PulseError::Config(format!("Invalid BigQuery base URL: {e}")))?
            .join(&format!("bigquery/v2/projects/{project_id}/"))
            .map_err(|e| PulseError::Config(format!("Invalid BigQuery API URL: {e}")))?;

        let credentials = match token {
            Some(token) => Credentials::Static(token),
            None => Credentials::Metadata {
                url: METADATA_TOKEN_URL.to_string(),
                cached: Mutex::new(None),
            },
        };

        Ok(Self {
            client,
            api_url,
            location: location.to_string(),
            credentials,
            query_timeout,
        })
    }

    #[cfg(test)]
    fn with_metadata_url(mut self, url: &str) -> Self {
        self.credentials = Credentials::Metadata {
            url: url.to_string(),
            cached: Mutex::new(None),
        };
        self
    }

    async fn access_token(&self) -> Result<Token> {
        let (url, cached) = match &self.credentials {
            Credentials::Static(token) => return Ok(token.clone()),
            Credentials::Metadata { url, cached } => (url, cached),
        };

        {
            let guard = cached.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some((token, expires_at)) = guard.as_ref() {
                if Instant::now() + TOKEN_REFRESH_MARGIN < *expires_at {
                    return Ok(token.clone());
                }
            }
        }

        debug!("Fetching access token from metadata server");
        let response = self
            .client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PulseError::Api {
                status: status.as_u16(),
                message: format!("metadata token request failed: {message}"),
            });
        }

        let body: AccessTokenResponse = response.json().await?;
        let token = Token::from(body.access_token);
        let expires_at = Instant::now() + Duration::from_secs(body.expires_in);
        *cached.lock().unwrap_or_else(PoisonError::into_inner) = Some((token.clone(), expires_at));

        Ok(token)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<QueryResponse> {
        let token = self.access_token().await?;
        let response = request.bearer_auth(token.as_str()).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(PulseError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: QueryResponse = response.json().await?;
        if !body.errors.is_empty() {
            let messages: Vec<_> = body.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(PulseError::Query(messages.join(", ")));
        }

        Ok(body)
    }

    async fn start_query(&self, query: &AnalyticalQuery) -> Result<QueryResponse> {
        let url = self
            .api_url
            .join("queries")
            .map_err(|e| PulseError::Config(format!("Invalid query URL: {e}")))?;

        let body = json!({
            "query": query.sql,
            "useLegacySql": false,
            "parameterMode": "NAMED",
            "queryParameters": query.parameters_json(),
            "location": self.location,
            "timeoutMs": SERVER_WAIT_MS,
        });

        self.send(self.client.post(url).json(&body)).await
    }

    async fn query_results(
        &self,
        job: &JobReference,
        page_token: Option<&str>,
    ) -> Result<QueryResponse> {
        let mut url = self
            .api_url
            .join(&format!("queries/{}", job.job_id))
            .map_err(|e| PulseError::Config(format!("Invalid results URL: {e}")))?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("location", job.location.as_deref().unwrap_or(&self.location));
            pairs.append_pair("timeoutMs", &SERVER_WAIT_MS.to_string());
            if let Some(token) = page_token {
                pairs.append_pair("pageToken", token);
            }
        }

        self.send(self.client.get(url)).await
    }
}

#[async_trait]
impl Warehouse for BigQueryClient {
    /// Runs the query to completion, following result pages.
    ///
    /// Fails with [`PulseError::Timeout`] when the job is still running after
    /// the configured query timeout.
    async fn query(&self, query: &AnalyticalQuery) -> Result<Vec<QueryRow>> {
        debug!("Running warehouse query:\n{}", query.sql);
        let deadline = Instant::now() + self.query_timeout;

        let mut response = self.start_query(query).await?;
        let job = response.job_reference.clone();
        let mut schema: Option<TableSchema> = None;
        let mut rows = Vec::new();

        loop {
            let mut page_token = None;
            if response.job_complete {
                if schema.is_none() {
                    schema = response.schema.take();
                }
                rows.append(&mut response.rows);
                match response.page_token.take() {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }

            if Instant::now() >= deadline {
                warn!("Warehouse query exceeded {}s", self.query_timeout.as_secs());
                return Err(PulseError::Timeout(self.query_timeout.as_secs()));
            }

            let job = job
                .as_ref()
                .ok_or_else(|| PulseError::Query("response is missing a job reference".into()))?;
            response = self.query_results(job, page_token.as_deref()).await?;
        }

        let rows = match schema {
            Some(schema) => decode_rows(&schema, rows),
            None => Vec::new(),
        };
        debug!("Warehouse query returned {} rows", rows.len());
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(server: &mockito::Server) -> BigQueryClient {
        BigQueryClient::new(
            &server.url(),
            "proj",
            "US",
            Some(Token::from("bq-token")),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn completed_page(rows: serde_json::Value, page_token: Option<&str>) -> String {
        let mut body = json!({
            "jobComplete": true,
            "jobReference": { "jobId": "job_1", "location": "US" },
            "schema": { "fields": [
                { "name": "repo_name", "type": "STRING" },
                { "name": "degree", "type": "INTEGER" }
            ]},
            "rows": rows,
        });
        if let Some(token) = page_token {
            body["pageToken"] = json!(token);
        }
        body.to_string()
    }

    #[tokio::test]
    async fn test_query_sends_named_parameters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/bigquery/v2/projects/proj/queries")
            .match_header("authorization", "Bearer bq-token")
            .match_body(Matcher::PartialJson(json!({
                "useLegacySql": false,
                "parameterMode": "NAMED",
                "location": "US",
                "queryParameters": [
                    { "name": "min_shared", "parameterType": { "type": "INT64" },
                      "parameterValue": { "value": "2" } }
                ]
            })))
            .with_status(200)
            .with_body(completed_page(json!([{ "f": [{ "v": "a/b" }, { "v": "5" }] }]), None))
            .create_async()
            .await;

        let client = client_for(&server);
        let query = AnalyticalQuery::new("SELECT 1").bind("min_shared", 2_i64);
        let rows = client.query(&query).await.unwrap();

        mock.assert_async().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["repo_name"], json!("a/b"));
        assert_eq!(rows[0]["degree"], json!(5));
    }

    #[tokio::test]
    async fn test_query_polls_until_complete_and_follows_pages() {
        let mut server = mockito::Server::new_async().await;
        let _start = server
            .mock("POST", "/bigquery/v2/projects/proj/queries")
            .with_status(200)
            .with_body(
                json!({
                    "jobComplete": false,
                    "jobReference": { "jobId": "job_1", "location": "US" }
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _first_page = server
            .mock("GET", "/bigquery/v2/projects/proj/queries/job_1")
            .match_query(Matcher::Regex("^location=US&timeoutMs=10000$".into()))
            .with_status(200)
            .with_body(completed_page(
                json!([{ "f": [{ "v": "a/a" }, { "v": "1" }] }]),
                Some("page-2"),
            ))
            .create_async()
            .await;
        let _second_page = server
            .mock("GET", "/bigquery/v2/projects/proj/queries/job_1")
            .match_query(Matcher::Regex("pageToken=page-2".into()))
            .with_status(200)
            .with_body(completed_page(json!([{ "f": [{ "v": "b/b" }, { "v": "2" }] }]), None))
            .create_async()
            .await;

        let client = client_for(&server);
        let rows = client.query(&AnalyticalQuery::new("SELECT 1")).await.unwrap();

        let names: Vec<_> = rows.iter().map(|r| r["repo_name"].clone()).collect();
        assert_eq!(names, vec![json!("a/a"), json!("b/b")]);
    }

    #[tokio::test]
    async fn test_query_surfaces_http_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/bigquery/v2/projects/proj/queries")
            .with_status(403)
            .with_body(r#"{"error":{"message":"Access Denied"}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .query(&AnalyticalQuery::new("SELECT 1"))
            .await
            .unwrap_err();

        match err {
            PulseError::Api { status, message } => {
                assert_eq!(status, 403);
                assert!(message.contains("Access Denied"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_query_surfaces_job_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/bigquery/v2/projects/proj/queries")
            .with_status(200)
            .with_body(
                json!({
                    "jobComplete": true,
                    "errors": [{ "message": "Unrecognized name: repo" }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .query(&AnalyticalQuery::new("SELECT repo"))
            .await
            .unwrap_err();
        assert!(matches!(err, PulseError::Query(ref m) if m.contains("Unrecognized name")));
    }

    #[tokio::test]
    async fn test_metadata_token_is_fetched_once() {
        let mut server = mockito::Server::new_async().await;
        let token_mock = server
            .mock("GET", "/token")
            .match_header("metadata-flavor", "Google")
            .with_status(200)
            .with_body(r#"{"access_token":"meta-token","expires_in":3600,"token_type":"Bearer"}"#)
            .expect(1)
            .create_async()
            .await;
        let query_mock = server
            .mock("POST", "/bigquery/v2/projects/proj/queries")
            .match_header("authorization", "Bearer meta-token")
            .with_status(200)
            .with_body(completed_page(json!([]), None))
            .expect(2)
            .create_async()
            .await;

        let client = BigQueryClient::new(&server.url(), "proj", "US", None, Duration::from_secs(5))
            .unwrap()
            .with_metadata_url(&format!("{}/token", server.url()));

        client.query(&AnalyticalQuery::new("SELECT 1")).await.unwrap();
        client.query(&AnalyticalQuery::new("SELECT 1")).await.unwrap();

        token_mock.assert_async().await;
        query_mock.assert_async().await;
    }
}
