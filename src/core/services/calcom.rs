use anyhow::Result;
use async_trait::async_trait;
use url::Url;

use super::{BookingLink, BookingLinks};

/// Cal.com booking-link source. Public scheduling pages follow the
/// `cal.com/<username>/<slug>` shape, so a configured username is enough to
/// hand out a duration-specific link without touching the Cal.com API.
pub struct CalComLinks {
    username: Option<String>,
}

impl CalComLinks {
    pub fn new(username: Option<String>) -> Self {
        Self { username }
    }
}

#[async_trait]
impl BookingLinks for CalComLinks {
    async fn get_booking_link(
        &self,
        duration_minutes: u32,
        context: &str,
    ) -> Result<Option<BookingLink>> {
        let Some(username) = &self.username else {
            return Ok(None);
        };

        let url = Url::parse(&format!(
            "https://cal.com/{}/{}min",
            username, duration_minutes
        ))?;

        let title: String = context.trim().chars().take(60).collect();
        Ok(Some(BookingLink {
            booking_url: url.to_string(),
            duration_minutes,
            title: if title.is_empty() {
                format!("{} minute meeting", duration_minutes)
            } else {
                title
            },
        }))
    }
}
