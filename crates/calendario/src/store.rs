//! HTTP client for the spreadsheet-backed event store.
//!
//! The store is a single endpoint: `GET` lists events, `POST` with an
//! `action` field adds or deletes, and `GET ?action=exportExcel` returns the
//! sheet as a spreadsheet file.

use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::types::{Category, Event, EventDraft};

pub const EXPORT_FILE_NAME: &str = "eventos-calendario.xlsx";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request to event store failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("event store responded with status {0}")]
    Status(StatusCode),

    #[error("invalid event store response: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

/// The list endpoint answers either with a bare array or wrapped in `events`
#[derive(Deserialize)]
#[serde(untagged)]
enum ListResponse {
    Bare(Vec<Event>),
    Wrapped {
        #[serde(default)]
        events: Vec<Event>,
    },
}

impl ListResponse {
    fn into_events(self) -> Vec<Event> {
        match self {
            ListResponse::Bare(events) => events,
            ListResponse::Wrapped { events } => events,
        }
    }
}

#[derive(Serialize)]
struct AddRequest<'a> {
    action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    date: &'a str,
    title: &'a str,
    category: Category,
    notes: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    action: &'static str,
    event_id: &'a str,
}

/// Client for the remote store
#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: Client,
    endpoint: String,
}

impl RemoteStore {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch every event
    pub async fn list(&self) -> Result<Vec<Event>, StoreError> {
        let response = self
            .client
            .get(&self.endpoint)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        let response = check_status(response)?;

        // Spreadsheet web apps often answer with text/plain, so decode by hand
        let body = response.text().await?;
        let events = serde_json::from_str::<ListResponse>(&body)?.into_events();
        debug!(count = events.len(), "Listed events from store");
        Ok(events)
    }

    /// Add an event. Passing `id` asks the store to replace that record.
    pub async fn add(&self, draft: &EventDraft, id: Option<&str>) -> Result<(), StoreError> {
        let request = AddRequest {
            action: "add",
            id,
            date: &draft.date,
            title: &draft.title,
            category: draft.category,
            notes: &draft.notes,
        };
        let response = self.client.post(&self.endpoint).json(&request).send().await?;
        check_status(response)?;
        Ok(())
    }

    pub async fn delete(&self, event_id: &str) -> Result<(), StoreError> {
        let request = DeleteRequest {
            action: "deleteEvent",
            event_id,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("action", "deleteEvent")])
            .json(&request)
            .send()
            .await?;
        check_status(response)?;
        Ok(())
    }

    /// Download the spreadsheet export
    pub async fn export(&self) -> Result<Vec<u8>, StoreError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("action", "exportExcel")])
            .send()
            .await?;
        let response = check_status(response)?;
        let bytes = response.bytes().await?;
        debug!(size = bytes.len(), "Downloaded export");
        Ok(bytes.to_vec())
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(StoreError::Status(status))
    }
}
