//! Application wiring
//!
//! Builds the credential provider, the three service clients, the agents and
//! the coordinator from a `Config`.

use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use crate::agents::{CalendarAgent, DriveAgent, MailAgent};
use crate::auth::GoogleAuth;
use crate::config::Config;
use crate::coordinator::{Agents, Coordinator};
use crate::gemini::{GeminiClient, LanguageModel};
use crate::server::AppState;
use crate::services::{
    CalendarService, DriveService, GmailClient, GoogleApi, GoogleCalendar, GoogleDrive,
    MailService,
};

/// Connected services and a ready coordinator
pub struct App {
    pub coordinator: Coordinator,
    pub drive: Arc<dyn DriveService>,
    pub calendar: Arc<dyn CalendarService>,
}

impl App {
    /// Authorize against Google (interactively if needed) and build everything
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let auth = Arc::new(GoogleAuth::from_config(config));
        auth.ensure_ready()
            .await
            .context("Google authorization failed")?;
        info!("Google credentials ready");

        let api = GoogleApi::new(auth);
        let mail: Arc<dyn MailService> = Arc::new(GmailClient::new(api.clone()));
        let drive: Arc<dyn DriveService> = Arc::new(GoogleDrive::new(api.clone()));
        let calendar: Arc<dyn CalendarService> = Arc::new(GoogleCalendar::new(api));

        let model: Arc<dyn LanguageModel> = Arc::new(
            GeminiClient::from_config(config).context("Gemini client setup failed")?,
        );
        info!("Using Gemini model {}", config.gemini_model);

        Ok(Self::assemble(model, mail, drive, calendar, config))
    }

    /// Build agents and coordinator over already-connected services
    pub fn assemble(
        model: Arc<dyn LanguageModel>,
        mail: Arc<dyn MailService>,
        drive: Arc<dyn DriveService>,
        calendar: Arc<dyn CalendarService>,
        config: &Config,
    ) -> Self {
        let agents = Agents {
            mail: Arc::new(MailAgent::new(model.clone(), mail)),
            drive: Arc::new(DriveAgent::new(model.clone(), drive.clone())),
            calendar: Arc::new(CalendarAgent::new(model.clone(), calendar.clone())),
        };

        let coordinator = Coordinator::new(model, agents)
            .with_history_limit(config.history_limit)
            .with_assistant_name(&config.assistant_name);

        Self {
            coordinator,
            drive,
            calendar,
        }
    }

    pub fn into_server_state(self) -> Arc<AppState> {
        Arc::new(AppState::new(self.coordinator, self.drive, self.calendar))
    }
}
