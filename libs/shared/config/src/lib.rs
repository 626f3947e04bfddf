use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub calendar_api_url: String,
    pub calendar_service_token: String,
    pub email_api_url: String,
    pub email_api_key: String,
    pub whatsapp_api_url: String,
    pub whatsapp_api_token: String,
    pub reminder_lead_hours: i64,
    pub meeting_provision_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL").unwrap_or_else(|_| {
                warn!("SUPABASE_URL not set, using empty value");
                String::new()
            }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY").unwrap_or_else(|_| {
                warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                String::new()
            }),
            calendar_api_url: env::var("CALENDAR_API_URL").unwrap_or_else(|_| {
                warn!("CALENDAR_API_URL not set, using empty value");
                String::new()
            }),
            calendar_service_token: env::var("CALENDAR_SERVICE_TOKEN").unwrap_or_else(|_| {
                warn!("CALENDAR_SERVICE_TOKEN not set, using empty value");
                String::new()
            }),
            email_api_url: env::var("EMAIL_API_URL").unwrap_or_else(|_| {
                warn!("EMAIL_API_URL not set, using empty value");
                String::new()
            }),
            email_api_key: env::var("EMAIL_API_KEY").unwrap_or_else(|_| {
                warn!("EMAIL_API_KEY not set, using empty value");
                String::new()
            }),
            whatsapp_api_url: env::var("WHATSAPP_API_URL").unwrap_or_else(|_| {
                warn!("WHATSAPP_API_URL not set, using empty value");
                String::new()
            }),
            whatsapp_api_token: env::var("WHATSAPP_API_TOKEN").unwrap_or_else(|_| {
                warn!("WHATSAPP_API_TOKEN not set, using empty value");
                String::new()
            }),
            reminder_lead_hours: env::var("REMINDER_LEAD_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(24),
            meeting_provision_timeout_secs: env::var("MEETING_PROVISION_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }

    pub fn is_calendar_configured(&self) -> bool {
        !self.calendar_api_url.is_empty() && !self.calendar_service_token.is_empty()
    }

    pub fn is_email_configured(&self) -> bool {
        !self.email_api_url.is_empty() && !self.email_api_key.is_empty()
    }

    pub fn is_whatsapp_configured(&self) -> bool {
        !self.whatsapp_api_url.is_empty() && !self.whatsapp_api_token.is_empty()
    }
}
