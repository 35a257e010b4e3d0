use async_trait::async_trait;
use mealshare::workflows::donation::notifications::{
    DeliveryError, EmailMessage, Mailer, Notification, PushGateway,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Push transport for local runs: records the delivery in the log stream only.
#[derive(Default)]
pub(crate) struct LoggingPushGateway;

#[async_trait]
impl PushGateway for LoggingPushGateway {
    async fn push(&self, notification: &Notification) -> Result<(), DeliveryError> {
        info!(
            recipient = %notification.recipient,
            kind = ?notification.kind,
            urgent = notification.urgent,
            "push notification delivered"
        );
        Ok(())
    }
}

/// Mail transport for local runs. Codes are never written to the log.
#[derive(Default)]
pub(crate) struct LoggingMailer;

#[async_trait]
impl Mailer for LoggingMailer {
    async fn send(&self, from: &str, message: &EmailMessage) -> Result<(), DeliveryError> {
        info!(
            from,
            to = %message.to,
            subject = %message.subject,
            "email delivered"
        );
        Ok(())
    }
}
