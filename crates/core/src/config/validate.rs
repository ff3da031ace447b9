use super::{types::Config, ConfigError, NotifyBackend};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Retry interval and token refresh threshold are positive
/// - Clock sync has at least one authority when enabled
/// - Gotify backend has its section
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.routine.retry_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "routine.retry_interval_ms cannot be 0".to_string(),
        ));
    }

    if config.routine.token_refresh_after == 0 {
        return Err(ConfigError::ValidationError(
            "routine.token_refresh_after cannot be 0".to_string(),
        ));
    }

    if config.routine.accepted_codes.is_empty() {
        return Err(ConfigError::ValidationError(
            "routine.accepted_codes cannot be empty".to_string(),
        ));
    }

    if config.clock.enabled {
        if config.clock.sync_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "clock.sync_interval_secs cannot be 0".to_string(),
            ));
        }
        if config.clock.ntp_servers.is_empty() && config.clock.authority_url.is_none() {
            return Err(ConfigError::ValidationError(
                "clock is enabled but neither ntp_servers nor authority_url is set".to_string(),
            ));
        }
    }

    if config.notify.backend == NotifyBackend::Gotify {
        match &config.notify.gotify {
            None => {
                return Err(ConfigError::ValidationError(
                    "notify.backend is gotify but [notify.gotify] is missing".to_string(),
                ))
            }
            Some(g) if g.url.is_empty() || g.token.is_empty() => {
                return Err(ConfigError::ValidationError(
                    "notify.gotify.url and notify.gotify.token are required".to_string(),
                ))
            }
            Some(_) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GotifyConfig, ServerConfig};
    use std::net::IpAddr;

    #[test]
    fn test_validate_default_config() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse::<IpAddr>().unwrap(),
                port: 0,
            },
            ..Config::default()
        };
        let result = validate_config(&config);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_retry_interval_fails() {
        let mut config = Config::default();
        config.routine.retry_interval_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_refresh_threshold_fails() {
        let mut config = Config::default();
        config.routine.token_refresh_after = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_clock_without_authority_fails() {
        let mut config = Config::default();
        config.clock.ntp_servers.clear();
        assert!(validate_config(&config).is_err());

        config.clock.authority_url = Some("https://time.example.com".to_string());
        assert!(validate_config(&config).is_ok());

        config.clock.authority_url = None;
        config.clock.enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_gotify_requires_section() {
        let mut config = Config::default();
        config.notify.backend = NotifyBackend::Gotify;
        assert!(validate_config(&config).is_err());

        config.notify.gotify = Some(GotifyConfig {
            url: "https://push.example.com".to_string(),
            token: "t".to_string(),
            priority: 8,
        });
        assert!(validate_config(&config).is_ok());
    }
}
