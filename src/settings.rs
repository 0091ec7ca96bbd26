// SPDX-FileCopyrightText: OpenTalk GmbH <mail@opentalk.eu>
//
// SPDX-License-Identifier: EUPL-1.2

use crate::behavior::Zone;
use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Deserializer};
use std::{fmt::Display, str::FromStr, time::Duration};
use url::Url;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub forms: FormsSettings,
}

impl Settings {
    /// Creates a new Settings instance from the provided TOML file.
    /// Specific fields can be set or overwritten with environment variables prefixed with
    /// `SCHEDULER_FORMS_`, nested keys are separated by `__`.
    pub fn load(file_name: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::new(file_name, FileFormat::Toml))
            .add_source(
                Environment::with_prefix("SCHEDULER_FORMS")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}

/// Location of the admin REST services
#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_base_url")]
    pub base_url: Url,

    #[serde(default = "default_request_timeout", deserialize_with = "duration_secs")]
    pub request_timeout: Duration,

    /// Upper bound for looking up or creating a series before a submission
    #[serde(default = "default_series_timeout", deserialize_with = "duration_secs")]
    pub series_timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
            series_timeout: default_series_timeout(),
        }
    }
}

fn default_base_url() -> Url {
    Url::from_str("http://localhost:8080/").unwrap()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_series_timeout() -> Duration {
    Duration::from_secs(10)
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormsSettings {
    /// Soft cap of capture agent resources per recording
    #[serde(default = "default_max_resources")]
    pub max_resources: usize,

    pub default_workflow: Option<String>,

    /// Timezone used until a capture agent reports its own offset
    #[serde(default = "default_timezone", deserialize_with = "from_str")]
    pub default_timezone: Tz,

    pub namespace: Option<String>,
}

impl FormsSettings {
    /// Zone of the date and time controls while no capture agent reports an offset
    pub fn zone(&self) -> Zone {
        Zone::Named(self.default_timezone)
    }
}

impl Default for FormsSettings {
    fn default() -> Self {
        Self {
            max_resources: default_max_resources(),
            default_workflow: None,
            default_timezone: default_timezone(),
            namespace: None,
        }
    }
}

fn default_max_resources() -> usize {
    4
}

fn default_timezone() -> Tz {
    Tz::UTC
}

fn duration_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Duration::from_secs(<u64>::deserialize(deserializer)?))
}

fn from_str<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: FromStr,
    T::Err: Display,
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    FromStr::from_str(&s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::env;

    #[test]
    fn settings_env_vars_overwite_config() -> Result<(), ConfigError> {
        // Sanity check
        let settings = Settings::load("./extra/example.toml")?;

        assert_eq!(settings.api.base_url.as_str(), "http://localhost:8080/");
        assert_eq!(settings.forms.max_resources, 3);
        assert_eq!(settings.forms.default_timezone, Tz::Europe__Berlin);

        // Set environment variables to overwrite default config file
        let env_base_url = "https://admin.example.org/".to_string();
        let env_max_resources: usize = 5;
        env::set_var("SCHEDULER_FORMS_API__BASE_URL", &env_base_url);
        env::set_var(
            "SCHEDULER_FORMS_FORMS__MAX_RESOURCES",
            env_max_resources.to_string(),
        );

        let settings = Settings::load("./extra/example.toml")?;

        assert_eq!(settings.api.base_url.as_str(), env_base_url);
        assert_eq!(settings.forms.max_resources, env_max_resources);

        Ok(())
    }

    #[test]
    fn default_timezone_keeps_daylight_saving() {
        use chrono::{TimeZone, Utc};

        let forms = FormsSettings {
            default_timezone: Tz::Europe__Berlin,
            ..Default::default()
        };

        let winter = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let summer = Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap();

        assert_eq!(forms.zone(), Zone::Named(Tz::Europe__Berlin));
        assert_eq!(forms.zone().offset_at(winter).local_minus_utc(), 3600);
        assert_eq!(forms.zone().offset_at(summer).local_minus_utc(), 7200);
    }

    #[test]
    fn api_defaults() {
        let api = ApiSettings::default();

        assert_eq!(api.base_url.as_str(), "http://localhost:8080/");
        assert_eq!(api.request_timeout, Duration::from_secs(30));
        assert_eq!(api.series_timeout, Duration::from_secs(10));
    }
}
