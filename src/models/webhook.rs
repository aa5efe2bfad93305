use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Shape of a PayPal webhook delivery, for the API document.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookEventDoc {
    pub id: String,
    pub event_type: String,
    pub resource_type: Option<String>,
    #[schema(value_type = Object)]
    pub resource: Value,
}

/// Accessors over a raw PayPal webhook event.
///
/// The event is only a trigger; none of its resource fields are trusted
/// as subscription state.
#[derive(Debug, Clone, Copy)]
pub struct WebhookEventView<'a> {
    event: &'a Value,
}

impl<'a> WebhookEventView<'a> {
    pub fn new(event: &'a Value) -> Self {
        Self { event }
    }

    pub fn event_id(&self) -> Option<&'a str> {
        self.event.get("id").and_then(Value::as_str)
    }

    pub fn event_type(&self) -> Option<&'a str> {
        self.event
            .get("event_type")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Subscription ids referenced by the resource, `id` first, then
    /// `billing_agreement_id`.
    pub fn subscription_candidates(&self) -> Vec<&'a str> {
        let Some(resource) = self.event.get("resource") else {
            return Vec::new();
        };
        let mut out: Vec<&'a str> = Vec::with_capacity(2);
        for key in ["id", "billing_agreement_id"] {
            if let Some(id) = resource
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                && !out.contains(&id)
            {
                out.push(id);
            }
        }
        out
    }
}
