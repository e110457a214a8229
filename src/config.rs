use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;

#[derive(Clone, Debug)]
pub struct Config {
    pub discord_token: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_refresh_token: String,
    pub storage_folder: String,
    pub http_timeout: Duration,
    /* In minutes. */
    pub default_update_interval: u64,
    pub utc_offset: FixedOffset,
}

fn required(name: &str) -> Result<String, String> {
    env::var(name).map_err(|_| format!("Expected {} in the environment", name))
}

fn optional<T: FromStr>(name: &str, default: T) -> Result<T, String> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| format!("Invalid value for {}: {:?}", name, value)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let utc_offset_hours: i32 = optional("SCHEDULE_UTC_OFFSET", -8)?;
        let utc_offset = FixedOffset::east_opt(utc_offset_hours * 3600)
            .ok_or_else(|| format!("SCHEDULE_UTC_OFFSET out of range: {}", utc_offset_hours))?;

        let default_update_interval: u64 = optional("DEFAULT_UPDATE_INTERVAL", 5)?;
        if default_update_interval == 0 {
            return Err("DEFAULT_UPDATE_INTERVAL must be at least 1 minute".to_string());
        }

        Ok(Config {
            discord_token: required("DISCORD_TOKEN")?,
            google_client_id: required("GOOGLE_CLIENT_ID")?,
            google_client_secret: required("GOOGLE_CLIENT_SECRET")?,
            google_refresh_token: required("GOOGLE_REFRESH_TOKEN")?,
            storage_folder: required("STORAGE_FOLDER")?,
            http_timeout: Duration::from_secs(optional("HTTP_TIMEOUT_SECS", 30)?),
            default_update_interval,
            utc_offset,
        })
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests(storage_folder: &str) -> Self {
        Config {
            discord_token: String::new(),
            google_client_id: String::new(),
            google_client_secret: String::new(),
            google_refresh_token: String::new(),
            storage_folder: storage_folder.to_string(),
            http_timeout: Duration::from_secs(1),
            default_update_interval: 5,
            utc_offset: FixedOffset::west_opt(8 * 3600).unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_values_fall_back_to_default() {
        env::remove_var("TEAM_SCHEDULE_TEST_UNSET");

        assert_eq!(optional("TEAM_SCHEDULE_TEST_UNSET", 30u64), Ok(30));
    }

    #[test]
    fn invalid_values_name_the_variable() {
        env::set_var("TEAM_SCHEDULE_TEST_INVALID", "soon");

        let error = optional::<u64>("TEAM_SCHEDULE_TEST_INVALID", 5).unwrap_err();
        assert!(error.contains("TEAM_SCHEDULE_TEST_INVALID"));
    }

    #[test]
    fn missing_required_values_name_the_variable() {
        env::remove_var("TEAM_SCHEDULE_TEST_REQUIRED");

        let error = required("TEAM_SCHEDULE_TEST_REQUIRED").unwrap_err();
        assert!(error.contains("TEAM_SCHEDULE_TEST_REQUIRED"));
    }
}
