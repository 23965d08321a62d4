pub mod calcom;
pub mod calendar;
pub mod mail;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::llm::ChatMessage;

// ── Email search ──

#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    pub query: String,
    pub max_results: u32,
    pub include_body: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailHit {
    pub id: String,
    pub from: String,
    pub subject: String,
    pub date: String,
    #[serde(default)]
    pub body_text: Option<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SearchResponse {
    pub emails: Vec<EmailHit>,
    pub count: usize,
}

#[async_trait]
pub trait EmailSearch: Send + Sync {
    async fn search(&self, user_email: &str, req: &SearchRequest) -> Result<SearchResponse>;
}

// ── AI draft generation ──

#[derive(Debug, Clone)]
pub struct DraftOptions {
    pub user_name: String,
    pub user_email: String,
    pub reply_instructions: String,
    pub conversation_history: Vec<ChatMessage>,
    pub privacy_mode: bool,
}

/// Output of the draft generator. An empty `draft_content` signals semantic
/// failure distinctly from a transport error; the executor treats both as a
/// failed step.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DraftReply {
    #[serde(default, alias = "draftContent")]
    pub draft_content: String,
    #[serde(default)]
    pub thought: String,
    #[serde(default, alias = "recipientName")]
    pub recipient_name: Option<String>,
    #[serde(default, alias = "recipientEmail")]
    pub recipient_email: Option<String>,
    #[serde(default, alias = "senderName")]
    pub sender_name: Option<String>,
}

#[async_trait]
pub trait DraftGenerator: Send + Sync {
    async fn generate_draft_reply(
        &self,
        email_context: &str,
        opts: &DraftOptions,
    ) -> Result<DraftReply>;
}

// ── Calendar booking ──

#[derive(Debug, Clone)]
pub struct MeetingRequest {
    pub summary: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MeetingInfo {
    pub meet_link: Option<String>,
    pub html_link: Option<String>,
    pub summary: String,
}

#[async_trait]
pub trait CalendarService: Send + Sync {
    /// Whether a calendar credential is available for the user at all.
    /// When false the executor skips straight to the booking-link fallback.
    fn is_connected(&self) -> bool;

    async fn create_meeting(&self, req: &MeetingRequest) -> Result<Option<MeetingInfo>>;
}

// ── Fallback booking link ──

#[derive(Debug, Clone)]
pub struct BookingLink {
    pub booking_url: String,
    pub duration_minutes: u32,
    pub title: String,
}

#[async_trait]
pub trait BookingLinks: Send + Sync {
    async fn get_booking_link(
        &self,
        duration_minutes: u32,
        context: &str,
    ) -> Result<Option<BookingLink>>;
}

/// The bundle of external collaborators one chat turn executes against.
/// Handlers own one clone per request; fakes slot in for tests.
#[derive(Clone)]
pub struct Collaborators {
    pub search: Arc<dyn EmailSearch>,
    pub drafts: Arc<dyn DraftGenerator>,
    pub calendar: Arc<dyn CalendarService>,
    pub booking: Arc<dyn BookingLinks>,
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    use super::*;
    use anyhow::anyhow;

    pub fn hit_from(from: &str, subject: &str) -> EmailHit {
        EmailHit {
            id: "msg_1".to_string(),
            from: from.to_string(),
            subject: subject.to_string(),
            date: "2026-08-24T09:00:00Z".to_string(),
            body_text: Some("Hi, following up on the proposal.".to_string()),
            snippet: None,
            thread_id: Some("thr_1".to_string()),
        }
    }

    #[derive(Default)]
    pub struct FakeSearch {
        pub hits: Vec<EmailHit>,
        pub fail_with: Option<String>,
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl EmailSearch for FakeSearch {
        async fn search(&self, _user_email: &str, _req: &SearchRequest) -> Result<SearchResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(msg) = &self.fail_with {
                return Err(anyhow!("{}", msg));
            }
            Ok(SearchResponse {
                count: self.hits.len(),
                emails: self.hits.clone(),
            })
        }
    }

    #[derive(Default)]
    pub struct FakeDrafts {
        pub reply: Option<DraftReply>,
        pub fail_with: Option<String>,
        pub calls: AtomicUsize,
        pub last_context: Mutex<Option<String>>,
    }

    #[async_trait]
    impl DraftGenerator for FakeDrafts {
        async fn generate_draft_reply(
            &self,
            email_context: &str,
            _opts: &DraftOptions,
        ) -> Result<DraftReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_context.lock().unwrap() = Some(email_context.to_string());
            if let Some(msg) = &self.fail_with {
                return Err(anyhow!("{}", msg));
            }
            Ok(self.reply.clone().unwrap_or_default())
        }
    }

    #[derive(Default)]
    pub struct FakeCalendar {
        pub connected: bool,
        pub meeting: Option<MeetingInfo>,
        pub calls: AtomicUsize,
        pub last_request: Mutex<Option<MeetingRequest>>,
    }

    #[async_trait]
    impl CalendarService for FakeCalendar {
        fn is_connected(&self) -> bool {
            self.connected
        }

        async fn create_meeting(&self, req: &MeetingRequest) -> Result<Option<MeetingInfo>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(req.clone());
            Ok(self.meeting.clone())
        }
    }

    #[derive(Default)]
    pub struct FakeBooking {
        pub username: Option<String>,
        pub last_duration: AtomicU32,
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl BookingLinks for FakeBooking {
        async fn get_booking_link(
            &self,
            duration_minutes: u32,
            context: &str,
        ) -> Result<Option<BookingLink>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.last_duration.store(duration_minutes, Ordering::SeqCst);
            Ok(self.username.as_ref().map(|u| BookingLink {
                booking_url: format!("https://cal.com/{}/{}min", u, duration_minutes),
                duration_minutes,
                title: context.chars().take(60).collect(),
            }))
        }
    }

    pub fn collaborators(
        search: FakeSearch,
        drafts: FakeDrafts,
        calendar: FakeCalendar,
        booking: FakeBooking,
    ) -> Collaborators {
        Collaborators {
            search: Arc::new(search),
            drafts: Arc::new(drafts),
            calendar: Arc::new(calendar),
            booking: Arc::new(booking),
        }
    }
}
