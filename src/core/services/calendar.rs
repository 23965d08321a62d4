use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CalendarService, MeetingInfo, MeetingRequest};

const EVENTS_URL: &str =
    "https://www.googleapis.com/calendar/v3/calendars/primary/events?conferenceDataVersion=1";

// ── Google Calendar event insert ──

#[derive(Serialize)]
struct EventBody<'a> {
    summary: &'a str,
    start: EventTime,
    end: EventTime,
    #[serde(rename = "conferenceData")]
    conference_data: ConferenceData,
}

#[derive(Serialize)]
struct EventTime {
    #[serde(rename = "dateTime")]
    date_time: String,
}

#[derive(Serialize)]
struct ConferenceData {
    #[serde(rename = "createRequest")]
    create_request: CreateRequest,
}

#[derive(Serialize)]
struct CreateRequest {
    #[serde(rename = "requestId")]
    request_id: String,
}

#[derive(Deserialize)]
struct EventResponse {
    #[serde(default)]
    summary: Option<String>,
    #[serde(rename = "htmlLink", default)]
    html_link: Option<String>,
    #[serde(rename = "hangoutLink", default)]
    hangout_link: Option<String>,
}

/// Google Calendar client. Holds the user's access token when the calendar
/// integration is connected; without one, `create_meeting` reports
/// not-connected by returning `Ok(None)` and the executor falls back.
pub struct GoogleCalendar {
    client: Client,
    access_token: Option<String>,
}

impl GoogleCalendar {
    pub fn new(access_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            access_token,
        }
    }
}

#[async_trait]
impl CalendarService for GoogleCalendar {
    fn is_connected(&self) -> bool {
        self.access_token.is_some()
    }

    async fn create_meeting(&self, req: &MeetingRequest) -> Result<Option<MeetingInfo>> {
        let Some(token) = &self.access_token else {
            return Ok(None);
        };

        let body = EventBody {
            summary: &req.summary,
            start: EventTime {
                date_time: req.start_time.to_rfc3339(),
            },
            end: EventTime {
                date_time: req.end_time.to_rfc3339(),
            },
            conference_data: ConferenceData {
                create_request: CreateRequest {
                    request_id: Uuid::new_v4().to_string(),
                },
            },
        };

        let res = self
            .client
            .post(EVENTS_URL)
            .header("Authorization", format!("Bearer {}", token))
            .json(&body)
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(anyhow!(
                "Calendar API error ({}): {}",
                res.status().as_u16(),
                res.text().await.unwrap_or_default()
            ));
        }

        let parsed: EventResponse = res.json().await?;
        Ok(Some(MeetingInfo {
            meet_link: parsed.hangout_link,
            html_link: parsed.html_link,
            summary: parsed.summary.unwrap_or_else(|| req.summary.clone()),
        }))
    }
}
