//! Tests for TOML configuration parsing.

use super::toml::{TomlConfig, default_config_template};

mod parsing {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [http]
            timeout = 5

            [store]
            path = "/var/lib/hookcast/webhooks.json"

            [retry]
            delays = [0, 30, 120]

            [health]
            failing_threshold = 3
            disable_after_hours = 48

            [worker]
            concurrency = 8
            queue_capacity = 1024
        "#;

        let config = TomlConfig::parse(toml).unwrap();

        assert_eq!(config.http.timeout, Some(5));
        assert_eq!(
            config.store.path.as_deref(),
            Some("/var/lib/hookcast/webhooks.json")
        );
        assert_eq!(config.retry.delays, Some(vec![0, 30, 120]));
        assert_eq!(config.health.failing_threshold, Some(3));
        assert_eq!(config.health.disable_after_hours, Some(48));
        assert_eq!(config.worker.concurrency, Some(8));
        assert_eq!(config.worker.queue_capacity, Some(1024));
    }

    #[test]
    fn parse_empty_config() {
        let config = TomlConfig::parse("").unwrap();

        assert!(config.http.timeout.is_none());
        assert!(config.store.path.is_none());
        assert!(config.retry.delays.is_none());
        assert!(config.health.failing_threshold.is_none());
        assert!(config.worker.concurrency.is_none());
    }

    #[test]
    fn reject_unknown_fields() {
        let toml = r"
            [retry]
            max_attempts = 5
        ";

        assert!(TomlConfig::parse(toml).is_err());
    }

    #[test]
    fn reject_unknown_sections() {
        let toml = r#"
            [unknown_section]
            key = "value"
        "#;

        assert!(TomlConfig::parse(toml).is_err());
    }

    #[test]
    fn reject_negative_delay() {
        let toml = r"
            [retry]
            delays = [0, -60]
        ";

        assert!(TomlConfig::parse(toml).is_err());
    }
}

mod loading {
    use super::*;
    use crate::config::ConfigError;

    #[test]
    fn load_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();

        let result = TomlConfig::load(&dir.path().join("absent.toml"));

        assert!(matches!(result, Err(ConfigError::FileRead { .. })));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hookcast.toml");
        std::fs::write(&path, "[http]\ntimeout = 7\n").unwrap();

        let config = TomlConfig::load(&path).unwrap();

        assert_eq!(config.http.timeout, Some(7));
    }
}

mod default_template {
    use super::*;

    #[test]
    fn template_is_valid_toml() {
        let template = default_config_template();
        let result = TomlConfig::parse(&template);
        assert!(
            result.is_ok(),
            "Template should be valid TOML: {:?}",
            result.err()
        );
    }

    #[test]
    fn template_contains_all_sections() {
        let template = default_config_template();

        for section in ["[http]", "[store]", "[retry]", "[health]", "[worker]"] {
            assert!(template.contains(section), "missing {section}");
        }
    }

    #[test]
    fn template_delays_match_defaults() {
        let config = TomlConfig::parse(&default_config_template()).unwrap();

        let default_secs: Vec<u64> = crate::webhook::RetrySchedule::default()
            .delays()
            .iter()
            .map(std::time::Duration::as_secs)
            .collect();

        assert_eq!(config.retry.delays, Some(default_secs));
    }
}
