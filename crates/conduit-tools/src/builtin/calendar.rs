//! Calendar tools backed by an in-process event book.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::Result;
use crate::tool::{ParamExt, ParamResult, ParameterValidationError, Tool, ToolResult};

/// Domain key for these tools.
pub const DOMAIN: &str = "calendar";

/// A calendar entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    /// Event identifier.
    pub id: String,
    /// Event title.
    pub title: String,
    /// Start time.
    pub start: DateTime<Utc>,
    /// End time, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    /// Where it happens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Free-form notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Shared store of events used by all calendar tools.
#[derive(Debug, Clone, Default)]
pub struct EventBook {
    events: Arc<Mutex<Vec<CalendarEvent>>>,
}

impl EventBook {
    /// Create an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event.
    pub fn insert(&self, event: CalendarEvent) {
        self.events.lock().push(event);
    }

    /// Remove an event by id; returns the removed event.
    pub fn remove(&self, id: &str) -> Option<CalendarEvent> {
        let mut events = self.events.lock();
        let index = events.iter().position(|e| e.id == id)?;
        Some(events.remove(index))
    }

    /// Events starting within `[from, to]`, ordered by start time.
    pub fn range(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Vec<CalendarEvent> {
        let mut matching: Vec<CalendarEvent> = self
            .events
            .lock()
            .iter()
            .filter(|e| from.is_none_or(|f| e.start >= f))
            .filter(|e| to.is_none_or(|t| e.start <= t))
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.start);
        matching
    }

    /// Number of stored events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether the book is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_time(params: &Value, name: &'static str) -> ParamResult<Option<DateTime<Utc>>> {
    match params.optional_str(name) {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| {
                ParameterValidationError::invalid_value(name, raw, format!("not RFC 3339: {}", e))
            }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// create_event
// ─────────────────────────────────────────────────────────────────────────────

/// Adds an event to the book.
#[derive(Debug, Clone)]
pub struct CreateEventTool {
    book: EventBook,
}

impl CreateEventTool {
    /// Create a tool writing into `book`.
    pub fn new(book: EventBook) -> Self {
        Self { book }
    }
}

#[async_trait]
impl Tool for CreateEventTool {
    fn name(&self) -> &str {
        "create_event"
    }

    fn description(&self) -> &str {
        "Create a calendar event. Times are RFC 3339 timestamps."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "start": {"type": "string", "format": "date-time"},
                "end": {"type": "string", "format": "date-time"},
                "location": {"type": "string"},
                "notes": {"type": "string"}
            },
            "required": ["title", "start"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let title = match params.required_str("title", "give the event a title") {
            Ok(t) => t.to_string(),
            Err(e) => return Ok(e.into()),
        };
        let start = match parse_time(&params, "start") {
            Ok(Some(t)) => t,
            Ok(None) => {
                return Ok(ParameterValidationError::missing("start", "RFC 3339 start time").into());
            }
            Err(e) => return Ok(e.into()),
        };
        let end = match parse_time(&params, "end") {
            Ok(t) => t,
            Err(e) => return Ok(e.into()),
        };
        if end.is_some_and(|end| end < start) {
            return Ok(ToolResult::error("Event end is before its start"));
        }

        let event = CalendarEvent {
            id: Uuid::new_v4().to_string(),
            title,
            start,
            end,
            location: params.optional_str("location").map(str::to_string),
            notes: params.optional_str("notes").map(str::to_string),
        };
        self.book.insert(event.clone());
        tracing::debug!(event_id = %event.id, "calendar event created");

        Ok(ToolResult::ok(json!({"event": event})))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// list_events
// ─────────────────────────────────────────────────────────────────────────────

/// Lists events in an optional time window.
#[derive(Debug, Clone)]
pub struct ListEventsTool {
    book: EventBook,
}

impl ListEventsTool {
    /// Create a tool reading from `book`.
    pub fn new(book: EventBook) -> Self {
        Self { book }
    }
}

#[async_trait]
impl Tool for ListEventsTool {
    fn name(&self) -> &str {
        "list_events"
    }

    fn description(&self) -> &str {
        "List calendar events, optionally within a time window."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "from": {"type": "string", "format": "date-time"},
                "to": {"type": "string", "format": "date-time"}
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let from = match parse_time(&params, "from") {
            Ok(t) => t,
            Err(e) => return Ok(e.into()),
        };
        let to = match parse_time(&params, "to") {
            Ok(t) => t,
            Err(e) => return Ok(e.into()),
        };
        let events = self.book.range(from, to);
        Ok(ToolResult::ok(json!({"count": events.len(), "events": events})))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// delete_event
// ─────────────────────────────────────────────────────────────────────────────

/// Removes an event by id.
#[derive(Debug, Clone)]
pub struct DeleteEventTool {
    book: EventBook,
}

impl DeleteEventTool {
    /// Create a tool removing from `book`.
    pub fn new(book: EventBook) -> Self {
        Self { book }
    }
}

#[async_trait]
impl Tool for DeleteEventTool {
    fn name(&self) -> &str {
        "delete_event"
    }

    fn description(&self) -> &str {
        "Delete a calendar event by id."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"id": {"type": "string"}},
            "required": ["id"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolResult> {
        let id = match params.required_str("id", "id returned by create_event") {
            Ok(id) => id,
            Err(e) => return Ok(e.into()),
        };
        match self.book.remove(id) {
            Some(event) => Ok(ToolResult::ok(json!({"deleted": event}))),
            None => Ok(ToolResult::error(format!("Event not found: {}", id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_list_delete() {
        let book = EventBook::new();
        let create = CreateEventTool::new(book.clone());
        let list = ListEventsTool::new(book.clone());
        let delete = DeleteEventTool::new(book.clone());

        let later = create
            .execute(json!({"title": "Review", "start": "2026-03-02T15:00:00Z"}))
            .await
            .unwrap();
        assert!(later.is_success());
        let early = create
            .execute(json!({
                "title": "Standup",
                "start": "2026-03-02T09:00:00+00:00",
                "end": "2026-03-02T09:15:00+00:00",
                "location": "Room 4"
            }))
            .await
            .unwrap();
        assert!(early.is_success());

        let listed = list.execute(json!({})).await.unwrap();
        let events = listed.get("events").unwrap().as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["title"], "Standup");

        let windowed = list
            .execute(json!({"from": "2026-03-02T12:00:00Z"}))
            .await
            .unwrap();
        assert_eq!(windowed.get("count"), Some(&json!(1)));

        let id = later.get("event").unwrap()["id"].as_str().unwrap().to_string();
        assert!(delete.execute(json!({"id": id})).await.unwrap().is_success());
        assert_eq!(book.len(), 1);
        assert!(delete.execute(json!({"id": id})).await.unwrap().is_error());
    }

    #[tokio::test]
    async fn test_rejects_bad_times() {
        let create = CreateEventTool::new(EventBook::new());

        let bad = create
            .execute(json!({"title": "x", "start": "tomorrow"}))
            .await
            .unwrap();
        assert!(bad.error_message().unwrap().contains("RFC 3339"));

        let missing = create.execute(json!({"title": "x"})).await.unwrap();
        assert!(missing.error_message().unwrap().contains("start"));

        let backwards = create
            .execute(json!({
                "title": "x",
                "start": "2026-01-01T10:00:00Z",
                "end": "2026-01-01T09:00:00Z"
            }))
            .await
            .unwrap();
        assert!(backwards.is_error());
    }
}
