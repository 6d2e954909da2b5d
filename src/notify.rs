use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{NotifyConfig, ServicesConfig};
use crate::error::Result;
use crate::remote::ServiceClient;

/// Fire-and-forget message sink. Delivery failures never reach the caller.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: String);
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WebhookMessage {
    pub text: String,
}

/// Posts `{"text": message}` to a webhook on a background task
#[derive(Clone)]
pub struct WebhookNotifier {
    client: ServiceClient,
    url: String,
}

impl WebhookNotifier {
    pub fn new<S: Into<String>>(url: S, client: ServiceClient) -> Self {
        Self { client, url: url.into() }
    }

    /// Sink for the configured webhook, if any
    pub fn from_config(notify: &NotifyConfig, services: &ServicesConfig) -> Option<Arc<dyn NotificationSink>> {
        notify
            .webhook_url
            .as_ref()
            .filter(|url| !url.is_empty())
            .map(|url| Arc::new(Self::new(url.clone(), ServiceClient::new(services))) as Arc<dyn NotificationSink>)
    }

    pub async fn send(&self, message: String) -> Result<()> {
        self.client.post_json_unit(&self.url, &WebhookMessage { text: message }).await
    }
}

impl NotificationSink for WebhookNotifier {
    fn notify(&self, message: String) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime; dropping notification: {}", message);
            return;
        };

        let notifier = self.clone();
        runtime.spawn(async move {
            match notifier.send(message).await {
                Ok(()) => debug!("Notification delivered to {}", notifier.url),
                Err(e) => warn!("Notification failed: {}", e),
            }
        });
    }
}
