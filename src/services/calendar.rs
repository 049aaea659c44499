//! Google Calendar REST client

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde::Deserialize;

use super::{resource_url, CalendarEvent, CalendarService, GoogleApi, ServiceResult};

const CALENDAR_API_URL: &str = "https://www.googleapis.com/calendar/v3/calendars/primary/events";

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<CalendarEvent>,
}

/// Calendar API client bound to the primary calendar
pub struct GoogleCalendar {
    api: GoogleApi,
}

impl GoogleCalendar {
    pub fn new(api: GoogleApi) -> Self {
        Self { api }
    }

    fn event_url(id: &str) -> ServiceResult<String> {
        resource_url(CALENDAR_API_URL, &[id])
    }
}

#[async_trait]
impl CalendarService for GoogleCalendar {
    async fn list_events(
        &self,
        time_min: DateTime<Utc>,
        max_results: u32,
    ) -> ServiceResult<Vec<CalendarEvent>> {
        let request = self
            .api
            .request(Method::GET, CALENDAR_API_URL)
            .await?
            .query(&[
                ("timeMin", time_min.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("maxResults", max_results.to_string()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ]);

        let list: EventList = self.api.send_json(request).await?;
        Ok(list.items)
    }

    async fn insert_event(&self, event: &CalendarEvent) -> ServiceResult<CalendarEvent> {
        let request = self
            .api
            .request(Method::POST, CALENDAR_API_URL)
            .await?
            .json(event);
        self.api.send_json(request).await
    }

    async fn get_event(&self, id: &str) -> ServiceResult<CalendarEvent> {
        let request = self.api.request(Method::GET, &Self::event_url(id)?).await?;
        self.api.send_json(request).await
    }

    async fn update_event(&self, id: &str, event: &CalendarEvent) -> ServiceResult<CalendarEvent> {
        let request = self
            .api
            .request(Method::PUT, &Self::event_url(id)?)
            .await?
            .json(event);
        self.api.send_json(request).await
    }

    async fn delete_event(&self, id: &str) -> ServiceResult<()> {
        let request = self.api.request(Method::DELETE, &Self::event_url(id)?).await?;
        self.api.send_empty(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_url_escapes_id() {
        assert_eq!(
            GoogleCalendar::event_url("evt1").unwrap(),
            format!("{}/evt1", CALENDAR_API_URL)
        );
        assert_eq!(
            GoogleCalendar::event_url("../../secondary/events/e2").unwrap(),
            format!("{}/..%2F..%2Fsecondary%2Fevents%2Fe2", CALENDAR_API_URL)
        );
        assert!(GoogleCalendar::event_url("").is_err());
    }
}
