//! Change notifications.
//!
//! Every message goes to the log. With a Gotify server or an SMTP relay
//! configured, it is also pushed or mailed there.

use anyhow::{Context, Result, anyhow};
use calwatch_core::config::{EmailConfig, GotifyConfig, NotificationConfig};
use calwatch_core::diff::{ChangeKind, ChangeReport, EventChange, FieldDelta};
use calwatch_core::event::{Event, FieldValue};
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{info, warn};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub title: String,
    pub body: String,
}

/// One message per added, removed or modified event.
pub fn messages(source: &str, report: &ChangeReport) -> Vec<Message> {
    let added = report
        .added
        .iter()
        .map(|event| event_message(source, ChangeKind::Added, event));
    let removed = report
        .removed
        .iter()
        .map(|event| event_message(source, ChangeKind::Removed, event));
    let modified = report
        .modified
        .iter()
        .map(|change| change_message(source, change));

    added.chain(removed).chain(modified).collect()
}

fn title(source: &str, kind: ChangeKind) -> String {
    format!("'{source}' -- Event {}", kind.label())
}

fn event_message(source: &str, kind: ChangeKind, event: &Event) -> Message {
    Message {
        title: title(source, kind),
        body: describe_event(event),
    }
}

fn change_message(source: &str, change: &EventChange) -> Message {
    let mut lines = vec![change.new.to_string()];
    lines.extend(change.deltas.iter().map(describe_delta));

    Message {
        title: title(source, ChangeKind::Modified),
        body: lines.join("\n"),
    }
}

fn describe_event(event: &Event) -> String {
    let mut lines = vec![event.to_string()];

    if let Some(start) = &event.start {
        lines.push(format!("Start: {start}"));
    }
    if let Some(end) = &event.end {
        lines.push(format!("End: {end}"));
    }
    if let Some(location) = &event.location {
        lines.push(format!("Location: {location}"));
    }
    if let Some(description) = &event.description {
        lines.push(description.clone());
    }

    lines.join("\n")
}

fn describe_delta(delta: &FieldDelta) -> String {
    let show = |value: &Option<FieldValue>| match value {
        Some(v) => v.to_string(),
        None => "(none)".to_string(),
    };
    format!("{}: {} -> {}", delta.field, show(&delta.old), show(&delta.new))
}

type Mailer = AsyncSmtpTransport<Tokio1Executor>;

pub struct Notifier {
    gotify: Option<GotifyConfig>,
    email: Option<EmailConfig>,
    client: reqwest::Client,
}

impl Notifier {
    pub fn new(config: Option<&NotificationConfig>) -> Self {
        Notifier {
            gotify: config.and_then(|c| c.gotify.clone()),
            email: config.and_then(|c| c.email.clone()),
            client: reqwest::Client::new(),
        }
    }

    /// Deliver all messages. A failed push or mail is logged and does not
    /// stop the remaining messages.
    pub async fn send(&self, messages: &[Message]) {
        if messages.is_empty() {
            return;
        }

        let mailer = match &self.email {
            Some(email) => match smtp_mailer(email) {
                Ok(mailer) => Some((email, mailer)),
                Err(e) => {
                    warn!("Email notifications disabled: {e:#}");
                    None
                }
            },
            None => None,
        };

        for message in messages {
            info!(title = %message.title, "{}", message.body);

            if let Some(gotify) = &self.gotify {
                if let Err(e) = self.push_gotify(gotify, message).await {
                    warn!("Gotify notification failed: {e:#}");
                }
            }

            if let Some((email, mailer)) = &mailer {
                if let Err(e) = send_email(mailer, email, message).await {
                    warn!("Email notification failed: {e:#}");
                }
            }
        }
    }

    async fn push_gotify(&self, gotify: &GotifyConfig, message: &Message) -> Result<()> {
        let priority = gotify.priority.to_string();
        let form = [
            ("title", message.title.as_str()),
            ("message", message.body.as_str()),
            ("priority", priority.as_str()),
        ];

        self.client
            .post(gotify_url(gotify)?)
            .form(&form)
            .send()
            .await
            .context("Failed to reach Gotify server")?
            .error_for_status()
            .context("Gotify rejected the message")?;

        Ok(())
    }
}

fn smtp_mailer(email: &EmailConfig) -> Result<Mailer> {
    let credentials = Credentials::new(email.username.clone(), email.password.clone());
    Ok(Mailer::relay(&email.smtp_server)
        .with_context(|| format!("Invalid SMTP server '{}'", email.smtp_server))?
        .credentials(credentials)
        .build())
}

async fn send_email(mailer: &Mailer, email: &EmailConfig, message: &Message) -> Result<()> {
    let mail = build_email(email, message)?;
    mailer.send(mail).await.context("Failed to send email")?;
    Ok(())
}

/// Plain-text mail from `from` (or the login) to every recipient.
fn build_email(email: &EmailConfig, message: &Message) -> Result<lettre::Message> {
    let sender = email.from.as_deref().unwrap_or(&email.username);
    let from: Mailbox = sender
        .parse()
        .with_context(|| format!("Invalid sender address '{sender}'"))?;

    let mut builder = lettre::Message::builder()
        .from(from)
        .subject(message.title.as_str())
        .header(ContentType::TEXT_PLAIN);
    for recipient in &email.recipients {
        let to: Mailbox = recipient
            .parse()
            .with_context(|| format!("Invalid recipient address '{recipient}'"))?;
        builder = builder.to(to);
    }

    builder
        .body(message.body.clone())
        .context("Failed to construct email")
}

/// `<server>/message?token=<token>`, keeping any path the server lives under.
fn gotify_url(gotify: &GotifyConfig) -> Result<Url> {
    let mut url = gotify.server.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow!("Gotify server URL '{}' cannot have a path", gotify.server))?
        .pop_if_empty()
        .push("message");
    url.query_pairs_mut().append_pair("token", &gotify.token);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use calwatch_core::diff::Detector;
    use calwatch_core::snapshot::CalendarSnapshot;

    fn snapshot(body: &str) -> CalendarSnapshot {
        CalendarSnapshot::parse(format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:test\r\n{body}END:VCALENDAR\r\n"
        ))
        .unwrap()
    }

    #[test]
    fn test_messages_for_each_kind() {
        let old = snapshot(
            "BEGIN:VEVENT\r\nUID:a\r\nSUMMARY:Algebra\r\nLOCATION:Room 1\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nUID:b\r\nSUMMARY:Physics\r\nEND:VEVENT\r\n",
        );
        let new = snapshot(
            "BEGIN:VEVENT\r\nUID:a\r\nSUMMARY:Algebra\r\nLOCATION:Room 2\r\nEND:VEVENT\r\n\
             BEGIN:VEVENT\r\nUID:c\r\nSUMMARY:Chemistry\r\nLOCATION:Lab\r\nEND:VEVENT\r\n",
        );
        let report = Detector::default().compare(&old, &new);

        let messages = messages("semester", &report);
        let titles: Vec<_> = messages.iter().map(|m| m.title.as_str()).collect();

        assert_eq!(
            titles,
            vec![
                "'semester' -- Event added",
                "'semester' -- Event removed",
                "'semester' -- Event modified",
            ]
        );
        assert_eq!(messages[0].body, "Chemistry\nLocation: Lab");
        assert_eq!(messages[1].body, "Physics");
        assert_eq!(messages[2].body, "Algebra\nlocation: Room 1 -> Room 2");
    }

    #[test]
    fn test_missing_side_shows_none() {
        let old = snapshot("BEGIN:VEVENT\r\nUID:a\r\nSUMMARY:Algebra\r\nEND:VEVENT\r\n");
        let new = snapshot(
            "BEGIN:VEVENT\r\nUID:a\r\nSUMMARY:Algebra\r\nLOCATION:Room 2\r\nEND:VEVENT\r\n",
        );
        let report = Detector::default().compare(&old, &new);

        let messages = messages("semester", &report);
        assert_eq!(messages[0].body, "Algebra\nlocation: (none) -> Room 2");
    }

    #[test]
    fn test_empty_report_has_no_messages() {
        assert!(messages("semester", &ChangeReport::default()).is_empty());
    }

    fn email_config(recipients: &[&str]) -> EmailConfig {
        EmailConfig {
            smtp_server: "smtp.example.com".into(),
            username: "calwatch@example.com".into(),
            password: "secret".into(),
            recipients: recipients.iter().map(|r| r.to_string()).collect(),
            from: None,
        }
    }

    #[test]
    fn test_build_email() {
        let message = Message {
            title: "'semester' -- Event added".into(),
            body: "Chemistry\nLocation: Lab".into(),
        };

        let mail = build_email(&email_config(&["a@example.com", "b@example.com"]), &message)
            .unwrap();

        assert_eq!(
            mail.headers().get_raw("Subject"),
            Some("'semester' -- Event added")
        );
        let envelope = mail.envelope();
        assert_eq!(
            envelope.from().map(|a| a.to_string()).as_deref(),
            Some("calwatch@example.com")
        );
        let to: Vec<String> = envelope.to().iter().map(|a| a.to_string()).collect();
        assert_eq!(to, vec!["a@example.com", "b@example.com"]);

        let formatted = String::from_utf8(mail.formatted()).unwrap();
        assert!(formatted.contains("Location: Lab"));
    }

    #[test]
    fn test_email_sender_override() {
        let mut config = email_config(&["a@example.com"]);
        config.from = Some("Calendar Bot <bot@example.com>".into());
        let message = Message {
            title: "t".into(),
            body: "b".into(),
        };

        let mail = build_email(&config, &message).unwrap();
        assert_eq!(
            mail.envelope().from().map(|a| a.to_string()).as_deref(),
            Some("bot@example.com")
        );
    }

    #[test]
    fn test_invalid_recipient_is_rejected() {
        let message = Message {
            title: "t".into(),
            body: "b".into(),
        };
        let err = build_email(&email_config(&["not an address"]), &message).unwrap_err();
        assert!(err.to_string().contains("not an address"));
    }

    #[test]
    fn test_gotify_url() {
        let mut gotify = GotifyConfig {
            server: Url::parse("https://push.example.com").unwrap(),
            token: "abc".into(),
            priority: 5,
        };
        assert_eq!(
            gotify_url(&gotify).unwrap().as_str(),
            "https://push.example.com/message?token=abc"
        );

        gotify.server = Url::parse("https://example.com/gotify/").unwrap();
        assert_eq!(
            gotify_url(&gotify).unwrap().as_str(),
            "https://example.com/gotify/message?token=abc"
        );
    }
}
