//! Domain types shared by the resolver, the proximity filter and the API client.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

/// A raw coordinate pair in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True when both components are finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A resolved place: coordinates plus the human-readable name shown to the user.
///
/// Serialized as `{"name", "lat", "lng"}`, the shape kept in the location cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lng")]
    pub longitude: f64,
}

impl Location {
    pub fn new(display_name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            display_name: display_name.into(),
            latitude,
            longitude,
        }
    }

    /// Name used when no geocoder could describe the coordinate.
    pub fn fallback_name(latitude: f64, longitude: f64) -> String {
        format!("Lat: {:.6}, Lng: {:.6}", latitude, longitude)
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Report category. The fixed set mirrors the submission form; anything else
/// the backend sends is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IssueType {
    Pothole,
    BrokenStreetlight,
    Graffiti,
    Garbage,
    DamagedSidewalk,
    Custom,
    Other(String),
}

impl IssueType {
    /// Categories offered by the submission form, in display order.
    pub const SELECTABLE: [IssueType; 6] = [
        IssueType::Custom,
        IssueType::Pothole,
        IssueType::BrokenStreetlight,
        IssueType::Graffiti,
        IssueType::Garbage,
        IssueType::DamagedSidewalk,
    ];

    pub fn as_wire(&self) -> &str {
        match self {
            IssueType::Pothole => "pothole",
            IssueType::BrokenStreetlight => "broken-streetlight",
            IssueType::Graffiti => "graffiti",
            IssueType::Garbage => "garbage",
            IssueType::DamagedSidewalk => "damaged-sidewalk",
            IssueType::Custom => "custom",
            IssueType::Other(raw) => raw,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            IssueType::Pothole => "Pothole",
            IssueType::BrokenStreetlight => "Broken Streetlight",
            IssueType::Graffiti => "Graffiti",
            IssueType::Garbage => "Garbage/Litter",
            IssueType::DamagedSidewalk => "Damaged Sidewalk",
            IssueType::Custom => "Custom Issue",
            IssueType::Other(raw) => raw,
        }
    }

    pub fn from_wire(raw: &str) -> Self {
        match raw.trim() {
            "pothole" => IssueType::Pothole,
            "broken-streetlight" => IssueType::BrokenStreetlight,
            "graffiti" => IssueType::Graffiti,
            "garbage" => IssueType::Garbage,
            "damaged-sidewalk" => IssueType::DamagedSidewalk,
            "custom" => IssueType::Custom,
            other => IssueType::Other(other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for IssueType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(IssueType::from_wire(&raw))
    }
}

impl Serialize for IssueType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    #[default]
    Pending,
    InProgress,
    Resolved,
}

impl ReportStatus {
    pub fn as_wire(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::InProgress => "in_progress",
            ReportStatus::Resolved => "resolved",
        }
    }

    /// The status a dashboard "advance" action moves to.
    pub fn next(&self) -> Self {
        match self {
            ReportStatus::Pending => ReportStatus::InProgress,
            ReportStatus::InProgress => ReportStatus::Resolved,
            ReportStatus::Resolved => ReportStatus::Pending,
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReportStatus::Pending => "Pending",
            ReportStatus::InProgress => "In Progress",
            ReportStatus::Resolved => "Resolved",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct VoteTally {
    #[serde(default)]
    pub count: u32,
}

/// A civic issue record as returned by `GET /api/reports`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Report {
    #[serde(deserialize_with = "de_report_id")]
    pub id: String,
    #[serde(default, deserialize_with = "de_coordinate")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "de_coordinate")]
    pub longitude: Option<f64>,
    pub issue_type: IssueType,
    #[serde(default)]
    pub custom_issue: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub image_filename: Option<String>,
    #[serde(default)]
    pub status: ReportStatus,
    #[serde(default)]
    pub sightings: VoteTally,
    #[serde(default, rename = "resolved")]
    pub resolved_votes: VoteTally,
    #[serde(default, rename = "timestamp", deserialize_with = "de_timestamp")]
    pub created_at: Option<NaiveDateTime>,
}

impl Report {
    /// Parses one report, logging and discarding records the client cannot use.
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        match serde_json::from_value::<Report>(value) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("Skipping malformed report: {}", e);
                None
            }
        }
    }

    /// Coordinates of the issue, if both components are present and usable.
    pub fn coordinates(&self) -> Option<Coordinates> {
        let coords = Coordinates::new(self.latitude?, self.longitude?);
        coords.is_valid().then_some(coords)
    }

    /// Title shown in lists: custom text for custom issues, the category otherwise.
    pub fn title(&self) -> &str {
        match self.issue_type {
            IssueType::Custom if !self.custom_issue.trim().is_empty() => &self.custom_issue,
            _ => self.issue_type.label(),
        }
    }
}

fn de_report_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    use serde::de::Error;
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("invalid report id: {}", other))),
    }
}

// Coordinates arrive as numbers, numeric strings or null.
fn de_coordinate<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(parsed.filter(|v| v.is_finite()))
}

// Timestamps come naive from the backend, but RFC 3339 is accepted too.
// Anything unreadable is dropped without losing the report.
fn de_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NaiveDateTime>, D::Error> {
    let Some(raw) = Option::<serde_json::Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let Some(raw) = raw.as_str().map(str::trim) else {
        return Ok(None);
    };
    let parsed = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|t| t.naive_utc()));
    if parsed.is_none() {
        warn!("Ignoring unreadable report timestamp {:?}", raw);
    }
    Ok(parsed)
}

/// Reasons a report form is refused before it reaches the network.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("Please select an issue type")]
    MissingIssueType,
    #[error("Please describe the custom issue")]
    MissingCustomIssue,
    #[error("Please provide a description")]
    MissingDescription,
    #[error("A location is required before submitting")]
    MissingLocation,
    #[error("Unsupported image type: {0} (use png, jpg, jpeg or gif)")]
    UnsupportedImage(String),
}

pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// A report about to be submitted as multipart form data.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub issue_type: IssueType,
    pub custom_issue: String,
    pub description: String,
    pub location: Location,
    pub image: Option<PathBuf>,
}

/// Submission form input, as typed by the user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportDraft {
    pub issue_type: Option<IssueType>,
    pub custom_issue: String,
    pub description: String,
    pub image_path: String,
}

impl ReportDraft {
    /// Checks the draft against the form rules and attaches the current location.
    pub fn validate(&self, location: Option<&Location>) -> Result<NewReport, SubmissionError> {
        let issue_type = self
            .issue_type
            .clone()
            .ok_or(SubmissionError::MissingIssueType)?;
        if issue_type == IssueType::Custom && self.custom_issue.trim().is_empty() {
            return Err(SubmissionError::MissingCustomIssue);
        }
        if self.description.trim().is_empty() {
            return Err(SubmissionError::MissingDescription);
        }
        let location = location.cloned().ok_or(SubmissionError::MissingLocation)?;

        let image = match self.image_path.trim() {
            "" => None,
            path => {
                let path = PathBuf::from(path);
                let ext = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.to_ascii_lowercase())
                    .unwrap_or_default();
                if !ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
                    return Err(SubmissionError::UnsupportedImage(ext));
                }
                Some(path)
            }
        };

        Ok(NewReport {
            custom_issue: if issue_type == IssueType::Custom {
                self.custom_issue.trim().to_string()
            } else {
                String::new()
            },
            issue_type,
            description: self.description.trim().to_string(),
            location,
            image,
        })
    }
}

/// Server answer to `GET /api/reports/:id/user-status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct UserVoteStatus {
    #[serde(default)]
    pub has_sighting_click: bool,
    #[serde(default)]
    pub has_resolved_click: bool,
}

/// Server answer to a sighting or resolved vote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VoteReceipt {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub report_deleted: bool,
}
