// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

//! HTTP calls to the scheduling, series and workflow services

use crate::{document::MetadataDocument, error::FormError, settings::ApiSettings};
use async_trait::async_trait;
use chrono::FixedOffset;
use reqwest::{Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("unexpected status code {status} from {url}")]
    Status { status: StatusCode, url: String },

    #[error("`{0}` was not found")]
    NotFound(String),

    #[error("failed to decode response at `{path}`: {message}")]
    Decode { path: String, message: String },

    #[error(transparent)]
    Document(#[from] FormError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureAgent {
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Configuration a capture agent reports about itself
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    #[serde(default)]
    pub resources: Vec<String>,
    /// Minutes east of UTC
    #[serde(default)]
    pub timezone_offset: Option<i32>,
}

impl AgentCapabilities {
    pub fn offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.timezone_offset?.checked_mul(60)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub id: String,
    pub title: String,
}

/// Time slot to check for overlapping recordings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictQuery {
    Window {
        device: String,
        start: i64,
        end: i64,
    },
    Recurring {
        device: String,
        start: i64,
        end: i64,
        duration: i64,
        rule: String,
    },
}

impl ConflictQuery {
    fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Window { device, start, end } => vec![
                ("device", device.clone()),
                ("start", start.to_string()),
                ("end", end.to_string()),
            ],
            Self::Recurring {
                device,
                start,
                end,
                duration,
                rule,
            } => vec![
                ("device", device.clone()),
                ("start", start.to_string()),
                ("end", end.to_string()),
                ("duration", duration.to_string()),
                ("rrule", rule.clone()),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub start: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[async_trait]
pub trait CaptureAgents: Send + Sync {
    async fn agents(&self) -> Result<Vec<CaptureAgent>, ClientError>;

    async fn capabilities(&self, agent: &str) -> Result<AgentCapabilities, ClientError>;
}

#[async_trait]
pub trait SeriesDirectory: Send + Sync {
    async fn search(&self, text: &str) -> Result<Vec<Series>, ClientError>;

    async fn series(&self, id: &str) -> Result<Option<Series>, ClientError>;

    async fn create(&self, title: &str) -> Result<Series, ClientError>;
}

#[async_trait]
pub trait ConflictCheck: Send + Sync {
    async fn conflicts(&self, query: &ConflictQuery) -> Result<Vec<Conflict>, ClientError>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn fetch(&self, id: &str) -> Result<MetadataDocument, ClientError>;

    /// Returns the id of the new event
    async fn create(&self, document: &MetadataDocument) -> Result<String, ClientError>;

    async fn update(&self, id: &str, document: &MetadataDocument) -> Result<(), ClientError>;

    async fn delete(&self, id: &str) -> Result<(), ClientError>;
}

#[async_trait]
pub trait Workflows: Send + Sync {
    async fn definitions(&self) -> Result<Vec<WorkflowDefinition>, ClientError>;

    /// Markup of the configuration panel of a workflow definition
    async fn configuration_panel(&self, definition: &str) -> Result<String, ClientError>;
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpClient {
    pub fn new(settings: &ApiSettings) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }

    async fn get_json<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        let response = self.client.get(self.url(path)?).query(query).send().await?;
        let body = check_status(response)?.bytes().await?;

        let deserializer = &mut serde_json::Deserializer::from_slice(&body);
        serde_path_to_error::deserialize(deserializer).map_err(|err| ClientError::Decode {
            path: err.path().to_string(),
            message: err.inner().to_string(),
        })
    }
}

fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(response.url().path().to_owned()));
    }
    if !status.is_success() {
        return Err(ClientError::Status {
            status,
            url: response.url().to_string(),
        });
    }

    Ok(response)
}

#[derive(Deserialize)]
struct CreatedEvent {
    id: String,
}

#[async_trait]
impl CaptureAgents for HttpClient {
    async fn agents(&self) -> Result<Vec<CaptureAgent>, ClientError> {
        self.get_json("capture-admin/agents.json", &[]).await
    }

    async fn capabilities(&self, agent: &str) -> Result<AgentCapabilities, ClientError> {
        self.get_json(&format!("capture-admin/agents/{agent}/capabilities.json"), &[])
            .await
    }
}

#[async_trait]
impl SeriesDirectory for HttpClient {
    async fn search(&self, text: &str) -> Result<Vec<Series>, ClientError> {
        self.get_json("series/series.json", &[("q", text.to_owned())])
            .await
    }

    async fn series(&self, id: &str) -> Result<Option<Series>, ClientError> {
        match self.get_json(&format!("series/{id}.json"), &[]).await {
            Ok(series) => Ok(Some(series)),
            Err(ClientError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn create(&self, title: &str) -> Result<Series, ClientError> {
        let response = self
            .client
            .post(self.url("series/")?)
            .form(&[("title", title)])
            .send()
            .await?;

        let series = check_status(response)?.json::<Series>().await?;
        log::info!("created series `{}` with id {}", series.title, series.id);

        Ok(series)
    }
}

#[async_trait]
impl ConflictCheck for HttpClient {
    async fn conflicts(&self, query: &ConflictQuery) -> Result<Vec<Conflict>, ClientError> {
        self.get_json("recordings/conflicts.json", &query.params())
            .await
    }
}

#[async_trait]
impl EventStore for HttpClient {
    async fn fetch(&self, id: &str) -> Result<MetadataDocument, ClientError> {
        let response = self
            .client
            .get(self.url(&format!("recordings/{id}.xml"))?)
            .send()
            .await?;
        let body = check_status(response)?.text().await?;

        Ok(MetadataDocument::from_xml(&body)?)
    }

    async fn create(&self, document: &MetadataDocument) -> Result<String, ClientError> {
        let response = self
            .client
            .post(self.url("recordings/")?)
            .header("content-type", "application/xml")
            .body(document.to_xml()?)
            .send()
            .await?;

        let CreatedEvent { id } = check_status(response)?.json().await?;
        log::info!("created event {id}");

        Ok(id)
    }

    async fn update(&self, id: &str, document: &MetadataDocument) -> Result<(), ClientError> {
        let response = self
            .client
            .put(self.url(&format!("recordings/{id}"))?)
            .header("content-type", "application/xml")
            .body(document.to_xml()?)
            .send()
            .await?;

        check_status(response)?;
        log::info!("updated event {id}");

        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), ClientError> {
        let response = self
            .client
            .delete(self.url(&format!("recordings/{id}"))?)
            .send()
            .await?;

        check_status(response)?;
        Ok(())
    }
}

#[async_trait]
impl Workflows for HttpClient {
    async fn definitions(&self) -> Result<Vec<WorkflowDefinition>, ClientError> {
        self.get_json("workflow/definitions.json", &[]).await
    }

    async fn configuration_panel(&self, definition: &str) -> Result<String, ClientError> {
        let response = self
            .client
            .get(self.url("workflow/configurationPanel")?)
            .query(&[("definitionId", definition)])
            .send()
            .await?;

        Ok(check_status(response)?.text().await?)
    }
}
