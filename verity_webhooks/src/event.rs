use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// What happened to the resource an event describes
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventAction {
    /// The resource was created
    Created,
    /// The resource was changed
    Updated,
    /// The resource was deleted
    Deleted,
    /// Any other action
    Other(String),
}

impl EventAction {
    /// The action as it appears in the event type
    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Other(action) => action,
        }
    }
}

impl From<&str> for EventAction {
    fn from(action: &str) -> Self {
        match action {
            "created" => Self::Created,
            "updated" => Self::Updated,
            "deleted" => Self::Deleted,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// A `resource.action` event type such as `record.created`
///
/// The action is whatever follows the last `.`; a type without one has an
/// empty [`Other`](EventAction::Other) action.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EventType {
    /// The kind of resource affected, such as `record` or `list_entry`
    pub resource: String,
    /// What happened to it
    pub action: EventAction,
}

impl FromStr for EventType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (resource, action) = s.rsplit_once('.').unwrap_or((s, ""));
        Ok(Self {
            resource: resource.to_owned(),
            action: EventAction::from(action),
        })
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.action {
            EventAction::Other(action) if action.is_empty() => f.write_str(&self.resource),
            action => write!(f, "{}.{}", self.resource, action.as_str()),
        }
    }
}

/// A verified webhook payload
///
/// A read-only view over the JSON object that was delivered. Accessors
/// return `None` when a field is absent or has an unexpected shape rather
/// than failing.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct WebhookEvent {
    payload: Map<String, Value>,
}

impl WebhookEvent {
    /// Wraps an already decoded payload
    pub fn new(payload: Map<String, Value>) -> Self {
        Self { payload }
    }

    /// The whole payload
    #[inline]
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// The event's unique ID
    pub fn id(&self) -> Option<&str> {
        self.payload.get("id").and_then(Value::as_str)
    }

    /// The raw event type string
    pub fn raw_type(&self) -> Option<&str> {
        self.payload.get("type").and_then(Value::as_str)
    }

    /// The parsed event type
    pub fn event_type(&self) -> Option<EventType> {
        self.raw_type().and_then(|t| t.parse().ok())
    }

    /// When the event happened, if the payload carries a valid RFC 3339
    /// timestamp
    pub fn occurred_at(&self) -> Option<OffsetDateTime> {
        let raw = self.payload.get("occurred_at").and_then(Value::as_str)?;
        OffsetDateTime::parse(raw, &Rfc3339).ok()
    }

    /// The event's data object
    pub fn data(&self) -> Option<&Map<String, Value>> {
        self.payload.get("data").and_then(Value::as_object)
    }

    /// The type of object the event concerns
    pub fn object_type(&self) -> Option<&str> {
        self.data_field("object_type")
            .or_else(|| self.payload.get("object_type"))
            .and_then(Value::as_str)
    }

    /// The record the event concerns
    pub fn record(&self) -> Option<&Map<String, Value>> {
        self.data_field("record").and_then(Value::as_object)
    }

    /// The ID of the record the event concerns
    ///
    /// Accepts `data.record_id` as either a bare ID or an object carrying
    /// `record_id` or `id`, and falls back to `data.record.id`.
    pub fn record_id(&self) -> Option<&str> {
        let from_record_id = self.data_field("record_id").and_then(|v| match v {
            Value::String(id) => Some(id.as_str()),
            Value::Object(nested) => nested
                .get("record_id")
                .or_else(|| nested.get("id"))
                .and_then(Value::as_str),
            _ => None,
        });

        from_record_id.or_else(|| {
            self.record()
                .and_then(|record| record.get("id"))
                .and_then(Value::as_str)
        })
    }

    /// The changed fields, for update events only
    pub fn changes(&self) -> Option<&Value> {
        if self.is_updated_event() {
            self.data_field("changes")
        } else {
            None
        }
    }

    /// Whether this event reports a creation
    pub fn is_created_event(&self) -> bool {
        self.action_is(EventAction::Created)
    }

    /// Whether this event reports an update
    pub fn is_updated_event(&self) -> bool {
        self.action_is(EventAction::Updated)
    }

    /// Whether this event reports a deletion
    pub fn is_deleted_event(&self) -> bool {
        self.action_is(EventAction::Deleted)
    }

    /// Whether this event concerns a record
    pub fn is_record_event(&self) -> bool {
        matches!(self.event_type(), Some(EventType { resource, .. }) if resource == "record")
    }

    fn action_is(&self, expected: EventAction) -> bool {
        matches!(self.event_type(), Some(EventType { action, .. }) if action == expected)
    }

    fn data_field(&self, key: &str) -> Option<&Value> {
        self.data().and_then(|data| data.get(key))
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;
    use serde_json::json;

    use super::*;

    fn event(value: Value) -> WebhookEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn parses_event_types() {
        let t: EventType = "record.created".parse().unwrap();
        assert_eq!(t.resource, "record");
        assert_eq!(t.action, EventAction::Created);
        assert_eq!(t.to_string(), "record.created");

        let t: EventType = "list.entry.deleted".parse().unwrap();
        assert_eq!(t.resource, "list.entry");
        assert_eq!(t.action, EventAction::Deleted);

        let t: EventType = "workspace.archived".parse().unwrap();
        assert_eq!(t.action, EventAction::Other("archived".into()));

        let t: EventType = "ping".parse().unwrap();
        assert_eq!(t.resource, "ping");
        assert_eq!(t.to_string(), "ping");
    }

    #[test]
    fn created_record_event() -> Result<()> {
        let event = event(json!({
            "id": "evt_1",
            "type": "record.created",
            "occurred_at": "2024-03-01T12:30:00Z",
            "data": {
                "object_type": "people",
                "record": { "id": "rec_9", "name": "Ada" }
            }
        }));

        assert_eq!(event.id(), Some("evt_1"));
        assert!(event.is_created_event());
        assert!(event.is_record_event());
        assert!(!event.is_updated_event());
        assert!(!event.is_deleted_event());
        assert_eq!(event.object_type(), Some("people"));
        assert_eq!(event.record_id(), Some("rec_9"));
        assert!(event.changes().is_none());

        let occurred = event.occurred_at().unwrap();
        assert_eq!(occurred.unix_timestamp(), 1_709_296_200);
        Ok(())
    }

    #[test]
    fn record_id_shapes() {
        let bare = event(json!({ "type": "record.deleted", "data": { "record_id": "rec_1" } }));
        assert_eq!(bare.record_id(), Some("rec_1"));
        assert!(bare.is_deleted_event());

        let nested = event(json!({ "data": { "record_id": { "record_id": "rec_2" } } }));
        assert_eq!(nested.record_id(), Some("rec_2"));

        let nested_id = event(json!({ "data": { "record_id": { "id": "rec_3" } } }));
        assert_eq!(nested_id.record_id(), Some("rec_3"));

        let none = event(json!({ "data": { "record_id": 7 } }));
        assert_eq!(none.record_id(), None);
    }

    #[test]
    fn changes_only_for_updates() {
        let update = event(json!({
            "type": "note.updated",
            "data": { "changes": { "title": ["old", "new"] } }
        }));
        assert!(update.is_updated_event());
        assert!(!update.is_record_event());
        assert_eq!(update.changes(), Some(&json!({ "title": ["old", "new"] })));

        let create = event(json!({
            "type": "note.created",
            "data": { "changes": { "title": ["", "new"] } }
        }));
        assert!(create.changes().is_none());
    }

    #[test]
    fn tolerates_missing_and_malformed_fields() {
        let event = event(json!({ "occurred_at": "yesterday", "type": 3 }));
        assert!(event.id().is_none());
        assert!(event.event_type().is_none());
        assert!(event.occurred_at().is_none());
        assert!(event.data().is_none());
        assert!(!event.is_created_event());
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(serde_json::from_value::<WebhookEvent>(json!([1, 2])).is_err());
    }
}
