//! HTTP client for the Ulat PH report backend.

use crate::geocoding::{GeocodeError, ReverseGeocoder};
use crate::models::{Location, NewReport, Report, ReportStatus, UserVoteStatus, VoteReceipt};
use crate::votes::VoteKind;
use async_trait::async_trait;
use reqwest::{multipart, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered `success: false` or an error body.
    #[error("{0}")]
    Rejected(String),

    #[error("Unexpected status {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Could not read image {path}: {source}")]
    Image {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Deserialize)]
struct ReportsEnvelope {
    #[serde(default)]
    reports: Vec<Value>,
}

#[derive(Deserialize)]
struct MessageEnvelope {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SavedLocation {
    name: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct SaveLocationEnvelope {
    data: SavedLocation,
}

#[derive(Debug, Deserialize)]
struct AddressEnvelope {
    address: Option<String>,
}

/// Checks the backend's `{success, message}` / `{error}` conventions and
/// decodes the body into `T`.
pub(crate) fn parse_envelope<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
) -> Result<T, ApiError> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        if status.is_success() {
            ApiError::Malformed(e.to_string())
        } else {
            ApiError::Status {
                status,
                message: body.chars().take(200).collect(),
            }
        }
    })?;

    let message = value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string);

    if value.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(ApiError::Rejected(
            message.unwrap_or_else(|| "Request failed".to_string()),
        ));
    }
    if !status.is_success() {
        return match message {
            Some(message) => Err(ApiError::Rejected(message)),
            None => Err(ApiError::Status {
                status,
                message: String::new(),
            }),
        };
    }

    serde_json::from_value(value).map_err(|e| ApiError::Malformed(e.to_string()))
}

#[derive(Clone)]
pub struct UlatClient {
    client: Client,
    base_url: String,
}

impl UlatClient {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read<T: DeserializeOwned>(&self, resp: reqwest::Response) -> Result<T, ApiError> {
        let status = resp.status();
        let body = resp.text().await?;
        parse_envelope(status, &body)
    }

    /// Fetches all reports, optionally narrowed to one status. Records the
    /// client cannot parse are dropped rather than failing the batch.
    pub async fn fetch_reports(
        &self,
        status: Option<ReportStatus>,
    ) -> Result<Vec<Report>, ApiError> {
        let mut req = self.client.get(self.url("/api/reports"));
        if let Some(status) = status {
            req = req.query(&[("status", status.as_wire())]);
        }
        let envelope: ReportsEnvelope = self.read(req.send().await?).await?;
        let total = envelope.reports.len();
        let reports: Vec<Report> = envelope
            .reports
            .into_iter()
            .filter_map(Report::from_value)
            .collect();
        debug!("Fetched {} reports ({} usable)", total, reports.len());
        Ok(reports)
    }

    /// Uploads a new report. Returns the backend's confirmation message.
    pub async fn submit_report(&self, report: &NewReport) -> Result<String, ApiError> {
        let mut form = multipart::Form::new()
            .text("issueType", report.issue_type.as_wire().to_string())
            .text("customIssue", report.custom_issue.clone())
            .text("description", report.description.clone())
            .text("location", report.location.display_name.clone())
            .text("latitude", report.location.latitude.to_string())
            .text("longitude", report.location.longitude.to_string());

        if let Some(path) = &report.image {
            form = form.part("image", image_part(path).await?);
        }

        let resp = self
            .client
            .post(self.url("/api/reports"))
            .multipart(form)
            .send()
            .await?;
        let envelope: MessageEnvelope = self.read(resp).await?;
        let message = envelope
            .message
            .unwrap_or_else(|| "Report submitted successfully".to_string());
        info!("Submitted {} report", report.issue_type.as_wire());
        Ok(message)
    }

    pub async fn update_status(&self, report_id: &str, status: ReportStatus) -> Result<(), ApiError> {
        let resp = self
            .client
            .put(self.url(&format!("/api/reports/{}", report_id)))
            .json(&json!({ "status": status.as_wire() }))
            .send()
            .await?;
        self.read::<Value>(resp).await?;
        info!("Report {} is now {}", report_id, status.as_wire());
        Ok(())
    }

    pub async fn delete_report(&self, report_id: &str) -> Result<(), ApiError> {
        let resp = self
            .client
            .delete(self.url(&format!("/api/reports/{}", report_id)))
            .send()
            .await?;
        self.read::<Value>(resp).await?;
        info!("Deleted report {}", report_id);
        Ok(())
    }

    pub async fn user_status(&self, report_id: &str) -> Result<UserVoteStatus, ApiError> {
        let resp = self
            .client
            .get(self.url(&format!("/api/reports/{}/user-status", report_id)))
            .send()
            .await?;
        self.read(resp).await
    }

    /// Forward-geocodes a typed place name through the backend.
    pub async fn save_location(&self, name: &str) -> Result<Location, ApiError> {
        let resp = self
            .client
            .post(self.url("/save-location"))
            .json(&json!({ "location": name }))
            .send()
            .await?;
        let envelope: SaveLocationEnvelope = self.read(resp).await?;
        let data = envelope.data;
        Ok(Location::new(data.name, data.latitude, data.longitude))
    }

    /// Casts a sighting or resolved vote.
    pub async fn vote(&self, report_id: &str, kind: VoteKind) -> Result<VoteReceipt, ApiError> {
        let resp = self
            .client
            .post(self.url(&format!("/api/reports/{}/{}", report_id, kind.endpoint())))
            .json(&json!({}))
            .send()
            .await?;
        let receipt: VoteReceipt = self.read(resp).await?;
        info!("Recorded {:?} vote on report {}", kind, report_id);
        Ok(receipt)
    }
}

#[async_trait]
impl ReverseGeocoder for UlatClient {
    fn name(&self) -> &'static str {
        "backend"
    }

    async fn reverse(&self, latitude: f64, longitude: f64) -> Result<String, GeocodeError> {
        let resp = self
            .client
            .post(self.url("/reverse-geocode"))
            .json(&json!({ "latitude": latitude, "longitude": longitude }))
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        match parse_envelope::<AddressEnvelope>(status, &body) {
            Ok(AddressEnvelope {
                address: Some(address),
            }) if !address.trim().is_empty() => Ok(address),
            Ok(_) => Err(GeocodeError::NoAddress),
            Err(e) => Err(GeocodeError::Rejected(e.to_string())),
        }
    }
}

fn image_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

async fn image_part(path: &Path) -> Result<multipart::Part, ApiError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| ApiError::Image {
        path: path.display().to_string(),
        source,
    })?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photo.jpg".to_string());
    Ok(multipart::Part::bytes(bytes)
        .file_name(filename)
        .mime_str(image_mime(path))?)
}
