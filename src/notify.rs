//! Fire-and-forget order notifications over NATS.
//!
//! The client is optional; without one, status changes are only logged.
//! Publish failures are logged and never surfaced to the workflow.

use crate::models::Order;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct Notifier {
    client: Option<async_nats::Client>,
}

impl Notifier {
    pub fn new(client: Option<async_nats::Client>) -> Self {
        Self { client }
    }

    pub fn disabled() -> Self {
        Self { client: None }
    }

    pub async fn order_status(&self, order: &Order) {
        let Some(client) = &self.client else {
            debug!(order = %order.id, status = %order.status, "notification skipped, no broker");
            return;
        };
        let subject = format!("orders.status.{}", order.id);
        let payload = match serde_json::to_vec(order) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(order = %order.id, error = %e, "could not encode notification");
                return;
            }
        };
        if let Err(e) = client.publish(subject, payload.into()).await {
            warn!(order = %order.id, error = %e, "notification publish failed");
        }
    }
}
