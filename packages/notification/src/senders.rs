//! [`NotificationSender`] implementations.

use serde::{Deserialize, Serialize};

use crate::{NotificationError, NotificationSender, ReportNotification, template};

/// Resend email API endpoint.
pub const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Sends notification emails through the Resend API.
pub struct ResendSender {
    api_key: String,
    from: String,
    site_url: String,
    client: reqwest::Client,
}

impl ResendSender {
    /// Creates a sender that mails from `from` and links to `site_url`.
    #[must_use]
    pub fn new(api_key: String, from: String, site_url: String) -> Self {
        Self {
            api_key,
            from,
            site_url,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[derive(Deserialize)]
struct ResendResponse {
    id: Option<String>,
}

#[derive(Deserialize)]
struct ResendErrorBody {
    message: String,
}

#[async_trait::async_trait]
impl NotificationSender for ResendSender {
    async fn send(
        &self,
        contact_address: &str,
        notification: &ReportNotification,
    ) -> Result<(), NotificationError> {
        let email = template::render(notification, &self.site_url);

        let request = ResendRequest {
            from: &self.from,
            to: [contact_address],
            subject: &email.subject,
            html: &email.html,
        };

        let resp = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ResendErrorBody>(&body)
                .map_or_else(|_| body.clone(), |err| err.message);
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let response: ResendResponse = serde_json::from_str(&body)?;

        let Some(id) = response.id else {
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                message: "response did not include a message id".to_string(),
            });
        };

        log::info!("Email sent to {contact_address} (ID: {id})");

        Ok(())
    }
}

/// Logs notifications instead of delivering them. Used when no delivery
/// service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSender;

#[async_trait::async_trait]
impl NotificationSender for LogSender {
    async fn send(
        &self,
        contact_address: &str,
        notification: &ReportNotification,
    ) -> Result<(), NotificationError> {
        log::info!(
            "Notification for {contact_address}: \"{}\" (report {})",
            template::subject(&notification.neighborhood),
            notification.report_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[tokio::test]
    async fn log_sender_always_succeeds() {
        let notification = ReportNotification {
            report_id: "r-1".to_string(),
            neighborhood: "Centro".to_string(),
            localidad: "Formosa".to_string(),
            description: "x".to_string(),
            category: "General".to_string(),
            lat: 0.0,
            lng: 0.0,
            created_at: Utc::now(),
        };

        assert!(LogSender.send("a@example.com", &notification).await.is_ok());
    }

    #[test]
    fn request_body_shape() {
        let body = serde_json::to_value(ResendRequest {
            from: "Radar <alertas@example.com>",
            to: ["vecino@example.com"],
            subject: "s",
            html: "<p>h</p>",
        })
        .unwrap();

        assert_eq!(body["to"][0], "vecino@example.com");
        assert_eq!(body["from"], "Radar <alertas@example.com>");
    }

    #[test]
    fn response_without_id_parses_as_none() {
        let parsed: ResendResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.id.is_none());
    }
}
