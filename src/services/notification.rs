// src/services/notification.rs

//! Fire-and-forget exam invitations.
//!
//! Handlers hand invitations to a `Notifier`, which forwards them over an
//! unbounded channel to a background task that calls the configured `Mailer`.
//! Delivery failures are logged and dropped; nothing is retried.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use url::Url;

use crate::{error::AppError, models::exam::Exam, utils::glob::is_wildcard};

/// One invitation email for one literal whitelist address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invitation {
    pub email: String,
    pub exam_title: String,
    pub exam_code: String,
    pub start_date: DateTime<Utc>,
}

impl Invitation {
    pub fn subject(&self) -> String {
        format!("You are invited to the exam \"{}\"", self.exam_title)
    }

    pub fn body(&self) -> String {
        format!(
            "Hello,\n\nYou have been invited to take the exam \"{}\".\n\
             Exam code: {}\n\
             Starts at: {}\n\n\
             Sign in with this email address and open the exam using the code above.\n",
            self.exam_title,
            self.exam_code,
            self.start_date.format("%Y-%m-%d %H:%M UTC"),
        )
    }
}

/// Invitations for every literal whitelist entry. Wildcard entries are skipped.
pub fn invitations_for(exam: &Exam) -> Vec<Invitation> {
    exam.whitelist
        .iter()
        .filter(|entry| !is_wildcard(entry))
        .map(|email| Invitation {
            email: email.trim().to_string(),
            exam_title: exam.title.clone(),
            exam_code: exam.exam_code.clone(),
            start_date: exam.start_date,
        })
        .collect()
}

/// Mail transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, invitation: &Invitation) -> Result<(), AppError>;
}

/// Writes invitations to the log. Used when no mail webhook is configured.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, invitation: &Invitation) -> Result<(), AppError> {
        tracing::info!(
            to = %invitation.email,
            exam_code = %invitation.exam_code,
            "Invitation: {}",
            invitation.subject()
        );
        Ok(())
    }
}

/// JSON payload accepted by the mail relay.
#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: String,
    text: String,
}

/// POSTs each invitation as JSON to an HTTP mail relay.
#[derive(Debug, Clone)]
pub struct WebhookMailer {
    client: reqwest::Client,
    url: Url,
    from: String,
}

impl WebhookMailer {
    pub fn new(url: Url, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            from: from.into(),
        }
    }
}

#[async_trait]
impl Mailer for WebhookMailer {
    async fn send(&self, invitation: &Invitation) -> Result<(), AppError> {
        let message = WebhookMessage {
            from: &self.from,
            to: &invitation.email,
            subject: invitation.subject(),
            text: invitation.body(),
        };

        self.client
            .post(self.url.clone())
            .json(&message)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        Ok(())
    }
}

/// Handle for queueing invitations. Cheap to clone; the worker stops once
/// every handle has been dropped and the queue is drained.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Invitation>,
}

impl Notifier {
    /// Spawns the delivery task on the current tokio runtime.
    pub fn spawn(mailer: Arc<dyn Mailer>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Invitation>();

        tokio::spawn(async move {
            while let Some(invitation) = rx.recv().await {
                if let Err(e) = mailer.send(&invitation).await {
                    tracing::warn!(
                        to = %invitation.email,
                        exam_code = %invitation.exam_code,
                        "Failed to send exam invitation: {}",
                        e
                    );
                }
            }
            tracing::debug!("Notification worker stopped");
        });

        Self { tx }
    }

    pub fn enqueue(&self, invitation: Invitation) {
        if self.tx.send(invitation).is_err() {
            tracing::warn!("Notification worker is gone, dropping invitation");
        }
    }

    /// Queues an invitation for each literal whitelist entry of a new exam.
    /// Returns how many were queued.
    pub fn invite_whitelist(&self, exam: &Exam) -> usize {
        let invitations = invitations_for(exam);
        let count = invitations.len();
        for invitation in invitations {
            self.enqueue(invitation);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sqlx::types::Json;

    /// Forwards every sent invitation to a channel the test can drain.
    struct RecordingMailer {
        sent: mpsc::UnboundedSender<Invitation>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, invitation: &Invitation) -> Result<(), AppError> {
            let _ = self.sent.send(invitation.clone());
            Ok(())
        }
    }

    /// Fails for addresses on `down.edu`, records the rest.
    struct FlakyMailer {
        sent: mpsc::UnboundedSender<Invitation>,
    }

    #[async_trait]
    impl Mailer for FlakyMailer {
        async fn send(&self, invitation: &Invitation) -> Result<(), AppError> {
            if invitation.email.ends_with("@down.edu") {
                return Err(AppError::InternalServerError("smtp down".to_string()));
            }
            let _ = self.sent.send(invitation.clone());
            Ok(())
        }
    }

    fn exam(whitelist: &[&str]) -> Exam {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        Exam {
            id: 1,
            user_id: 1,
            title: "Chemistry".to_string(),
            duration_minutes: 45,
            exam_code: "CHEM-7".to_string(),
            created_at: start,
            expiration_date: start,
            whitelist: Json(whitelist.iter().map(|s| s.to_string()).collect()),
            start_date: start,
            group_name: None,
        }
    }

    #[test]
    fn wildcards_are_skipped() {
        let exam = exam(&["alice@uni.edu", "*@uni.edu", "bob?@uni.edu", "s[0-9]@uni.edu", "carol@uni.edu"]);
        let emails: Vec<String> = invitations_for(&exam).into_iter().map(|i| i.email).collect();
        assert_eq!(emails, vec!["alice@uni.edu", "carol@uni.edu"]);
    }

    #[test]
    fn invitation_mentions_code_and_title() {
        let invitation = invitations_for(&exam(&["alice@uni.edu"])).remove(0);
        assert!(invitation.subject().contains("Chemistry"));
        assert!(invitation.body().contains("CHEM-7"));
        assert!(invitation.body().contains("2025-06-01 08:00 UTC"));
    }

    #[tokio::test]
    async fn worker_sends_only_literal_entries() {
        let (sent_tx, mut sent_rx) = mpsc::unbounded_channel();
        let notifier = Notifier::spawn(Arc::new(RecordingMailer { sent: sent_tx }));

        let queued = notifier.invite_whitelist(&exam(&["*", "alice@uni.edu", "*@uni.edu", "bob@uni.edu"]));
        assert_eq!(queued, 2);
        drop(notifier);

        let mut delivered = Vec::new();
        while let Some(invitation) = sent_rx.recv().await {
            delivered.push(invitation.email);
        }
        assert_eq!(delivered, vec!["alice@uni.edu", "bob@uni.edu"]);
    }

    #[tokio::test]
    async fn all_wildcard_whitelist_sends_nothing() {
        let (sent_tx, mut sent_rx) = mpsc::unbounded_channel();
        let notifier = Notifier::spawn(Arc::new(RecordingMailer { sent: sent_tx }));

        assert_eq!(notifier.invite_whitelist(&exam(&["*", "*@uni.edu"])), 0);
        drop(notifier);

        assert!(sent_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_worker() {
        let (sent_tx, mut sent_rx) = mpsc::unbounded_channel();
        let notifier = Notifier::spawn(Arc::new(FlakyMailer { sent: sent_tx }));

        notifier.invite_whitelist(&exam(&["a@down.edu", "b@uni.edu", "c@down.edu", "d@uni.edu"]));
        drop(notifier);

        let mut delivered = Vec::new();
        while let Some(invitation) = sent_rx.recv().await {
            delivered.push(invitation.email);
        }
        assert_eq!(delivered, vec!["b@uni.edu", "d@uni.edu"]);
    }
}
