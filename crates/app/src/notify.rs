use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{error, info, warn};

use staffdesk_core::message::{render_admin_alert, render_welcome};
use staffdesk_core::types::EmployeeRecord;
use staffdesk_email::transport::MailTransport;

const MAX_SEND_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Terminal state of a single notification dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The welcome message reached the transport.
    Delivered,
    /// Welcome delivery was exhausted but the administrator was alerted.
    AdminNotified,
    /// Both the welcome message and the administrator alert failed.
    AdminNotifyFailed,
}

impl DispatchOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::AdminNotified => "admin_notified",
            Self::AdminNotifyFailed => "admin_notify_failed",
        }
    }
}

/// Sends welcome notifications on a background task so that request
/// handling never waits on the mail transport.
#[derive(Clone)]
pub struct NotificationDispatcher {
    transport: Arc<dyn MailTransport>,
    admin_email: String,
    retry_delay: Duration,
}

impl NotificationDispatcher {
    pub fn new(transport: Arc<dyn MailTransport>, admin_email: String) -> Self {
        Self {
            transport,
            admin_email,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    #[cfg(test)]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Fires the welcome notification for a freshly created record.
    ///
    /// The caller gets no handle back: the dispatch runs to a terminal
    /// state on its own and reports it through logs and metrics only.
    pub fn dispatch(&self, record: EmployeeRecord) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let outcome = dispatcher.deliver(&record).await;
            counter!("notification_dispatch_total", "outcome" => outcome.as_str()).increment(1);
        });
    }

    /// Drives one dispatch to its terminal state.
    ///
    /// The welcome message gets three attempts with a fixed delay between
    /// them; once exhausted, the administrator alert is a single attempt
    /// whose failure is terminal.
    async fn deliver(&self, record: &EmployeeRecord) -> DispatchOutcome {
        let message = render_welcome(record);
        let mut last_error = None;

        for attempt in 1..=MAX_SEND_ATTEMPTS {
            match self.transport.send_message(&message).await {
                Ok(()) => {
                    info!(
                        stage = "notify",
                        employee = %record.id,
                        recipient = %message.recipient,
                        attempt,
                        "welcome email sent"
                    );
                    return DispatchOutcome::Delivered;
                }
                Err(err) => {
                    warn!(
                        stage = "notify",
                        employee = %record.id,
                        attempt,
                        error = %err,
                        "welcome email attempt failed"
                    );
                    last_error = Some(err);
                    if attempt < MAX_SEND_ATTEMPTS {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }

        let reason = last_error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "unknown error".to_string());
        error!(
            stage = "notify",
            employee = %record.id,
            error = %reason,
            "welcome email exhausted all attempts, alerting administrator"
        );

        let alert = render_admin_alert(&self.admin_email, record, &reason);
        match self.transport.send_admin_alert(&alert).await {
            Ok(()) => {
                info!(
                    stage = "notify",
                    employee = %record.id,
                    admin = %alert.recipient,
                    "administrator alerted about failed welcome email"
                );
                DispatchOutcome::AdminNotified
            }
            Err(err) => {
                error!(
                    stage = "notify",
                    employee = %record.id,
                    error = %err,
                    "administrator alert failed, giving up"
                );
                DispatchOutcome::AdminNotifyFailed
            }
        }
    }
}
