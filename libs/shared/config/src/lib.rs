use std::env;
use std::str::FromStr;

use chrono::{FixedOffset, Offset, Utc};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Supabase,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_service_key: String,
    pub storage_backend: StorageBackend,
    pub whatsapp_api_base_url: String,
    pub whatsapp_app_secret: Option<String>,
    pub clinic_utc_offset: FixedOffset,
    pub reminder_check_interval_seconds: u64,
    pub reminder_tick_timeout_seconds: u64,
    pub reminder_retry_batch_size: usize,
    pub reminder_max_attempts: u32,
    pub reminder_retry_delay_seconds: u64,
    pub reminder_dispatch_concurrency: usize,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_service_key: String::new(),
            storage_backend: StorageBackend::Supabase,
            whatsapp_api_base_url: "https://graph.facebook.com/v20.0".to_string(),
            whatsapp_app_secret: None,
            clinic_utc_offset: utc(),
            reminder_check_interval_seconds: 300,
            reminder_tick_timeout_seconds: 300,
            reminder_retry_batch_size: 50,
            reminder_max_attempts: 3,
            reminder_retry_delay_seconds: 900,
            reminder_dispatch_concurrency: 4,
            port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_service_key: env::var("SUPABASE_SERVICE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_KEY not set, using empty value");
                    String::new()
                }),
            storage_backend: match env::var("STORAGE_BACKEND").as_deref() {
                Ok("memory") => StorageBackend::Memory,
                Ok("supabase") | Err(_) => StorageBackend::Supabase,
                Ok(other) => {
                    warn!("Unknown STORAGE_BACKEND '{}', using supabase", other);
                    StorageBackend::Supabase
                }
            },
            whatsapp_api_base_url: env::var("WHATSAPP_API_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("WHATSAPP_API_BASE_URL not set, using default");
                    defaults.whatsapp_api_base_url.clone()
                }),
            whatsapp_app_secret: env::var("WHATSAPP_APP_SECRET")
                .ok()
                .filter(|secret| !secret.is_empty()),
            clinic_utc_offset: match env::var("CLINIC_UTC_OFFSET") {
                Ok(raw) => parse_utc_offset(&raw).unwrap_or_else(|| {
                    warn!("CLINIC_UTC_OFFSET '{}' is not a valid offset, using UTC", raw);
                    utc()
                }),
                Err(_) => {
                    warn!("CLINIC_UTC_OFFSET not set, using UTC");
                    utc()
                }
            },
            reminder_check_interval_seconds: parse_var(
                "REMINDER_CHECK_INTERVAL_SECONDS",
                defaults.reminder_check_interval_seconds,
            ),
            reminder_tick_timeout_seconds: parse_var(
                "REMINDER_TICK_TIMEOUT_SECONDS",
                defaults.reminder_tick_timeout_seconds,
            ),
            reminder_retry_batch_size: parse_var(
                "REMINDER_RETRY_BATCH_SIZE",
                defaults.reminder_retry_batch_size,
            ),
            reminder_max_attempts: parse_var("REMINDER_MAX_ATTEMPTS", defaults.reminder_max_attempts),
            reminder_retry_delay_seconds: parse_var(
                "REMINDER_RETRY_DELAY_SECONDS",
                defaults.reminder_retry_delay_seconds,
            ),
            reminder_dispatch_concurrency: parse_var(
                "REMINDER_DISPATCH_CONCURRENCY",
                defaults.reminder_dispatch_concurrency,
            )
            .max(1),
            port: parse_var("PORT", defaults.port),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        match self.storage_backend {
            StorageBackend::Memory => true,
            StorageBackend::Supabase => {
                !self.supabase_url.is_empty() && !self.supabase_service_key.is_empty()
            }
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default", name, raw);
            default
        }),
        Err(_) => default,
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

/// Parses `+HH:MM`, `+HHMM`, `+HH` (or the `-` forms) or `Z` into a fixed
/// offset.
pub fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Some(utc());
    }

    let (sign, rest) = match raw.chars().next()? {
        '+' => (1, &raw[1..]),
        '-' => (-1, &raw[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some(parts) => parts,
        None if rest.len() == 4 => (rest.get(..2)?, rest.get(2..)?),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
