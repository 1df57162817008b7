//! Records carried on engine progress and event streams.
//!
//! Build, pull and push endpoints report errors in-band: the HTTP status is
//! 200 and a later record carries `error`/`errorDetail`. [`ProgressRecord`]
//! surfaces those uniformly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Common view over stream records.
pub trait ProgressRecord {
    /// The in-band error reported by this record, if any.
    fn error_message(&self) -> Option<&str>;

    /// One-line human summary.
    fn summary(&self) -> String;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One record of an image build stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_detail: Option<ProgressDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<ErrorDetail>,
    /// Builder-specific payload, e.g. the final image ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aux: Option<serde_json::Value>,
}

/// One record of an image pull (create) stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateImageInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_detail: Option<ProgressDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<ErrorDetail>,
}

/// One record of an image push stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PushImageInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_detail: Option<ProgressDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<ErrorDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventActor {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Attributes")]
    pub attributes: BTreeMap<String, String>,
}

/// One record of the engine event stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventMessage {
    /// Object type: `container`, `image`, `network`, `volume`, ...
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Action")]
    pub action: String,
    #[serde(rename = "Actor")]
    pub actor: EventActor,
    /// `local` or `swarm`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    #[serde(rename = "timeNano", skip_serializing_if = "Option::is_none")]
    pub time_nano: Option<i64>,
}

fn in_band_error<'a>(
    detail: &'a Option<ErrorDetail>,
    error: &'a Option<String>,
) -> Option<&'a str> {
    detail
        .as_ref()
        .and_then(|detail| detail.message.as_deref())
        .or(error.as_deref())
}

fn status_summary(id: Option<&str>, status: Option<&str>, progress: Option<&str>) -> String {
    let mut parts = Vec::new();
    if let Some(id) = id {
        parts.push(format!("{id}:"));
    }
    if let Some(status) = status {
        parts.push(status.to_string());
    }
    if let Some(progress) = progress {
        parts.push(progress.to_string());
    }
    parts.join(" ")
}

impl ProgressRecord for BuildInfo {
    fn error_message(&self) -> Option<&str> {
        in_band_error(&self.error_detail, &self.error)
    }

    fn summary(&self) -> String {
        if let Some(message) = self.error_message() {
            return format!("error: {message}");
        }
        if let Some(stream) = &self.stream {
            return stream.trim_end().to_string();
        }
        if let Some(aux) = &self.aux {
            return format!("aux: {aux}");
        }
        status_summary(
            self.id.as_deref(),
            self.status.as_deref(),
            self.progress.as_deref(),
        )
    }
}

impl ProgressRecord for CreateImageInfo {
    fn error_message(&self) -> Option<&str> {
        in_band_error(&self.error_detail, &self.error)
    }

    fn summary(&self) -> String {
        if let Some(message) = self.error_message() {
            return format!("error: {message}");
        }
        status_summary(
            self.id.as_deref(),
            self.status.as_deref(),
            self.progress.as_deref(),
        )
    }
}

impl ProgressRecord for PushImageInfo {
    fn error_message(&self) -> Option<&str> {
        in_band_error(&self.error_detail, &self.error)
    }

    fn summary(&self) -> String {
        if let Some(message) = self.error_message() {
            return format!("error: {message}");
        }
        status_summary(None, self.status.as_deref(), self.progress.as_deref())
    }
}

impl ProgressRecord for EventMessage {
    fn error_message(&self) -> Option<&str> {
        None
    }

    fn summary(&self) -> String {
        let name = self.actor.attributes.get("name").map(String::as_str);
        match name {
            Some(name) => format!("{} {} {} ({name})", self.kind, self.action, self.actor.id),
            None => format!("{} {} {}", self.kind, self.action, self.actor.id),
        }
    }
}
