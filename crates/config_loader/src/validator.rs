//! 配置校验模块
//!
//! 校验规则：
//! - queue_urls 非空、唯一、不含空白项
//! - client_timeout_secs > 0
//! - max_in_flight_sends / max_concurrent_receives > 0
//! - backend 名称非空且互不相同
//! - mock backend 的 fail_every 配置合法

use std::collections::HashSet;

use contracts::{BackendConfig, BackendKind, ContractError, MockBehavior, RelayConfig};

/// 校验 RelayConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &RelayConfig) -> Result<(), ContractError> {
    validate_queue_urls(config)?;
    validate_limits(config)?;
    validate_backend("backend_a", &config.backend_a)?;
    validate_backend("backend_b", &config.backend_b)?;
    validate_backend_names(config)?;
    Ok(())
}

/// 校验队列列表
fn validate_queue_urls(config: &RelayConfig) -> Result<(), ContractError> {
    if config.queue_urls.is_empty() {
        return Err(ContractError::config_validation(
            "queue_urls",
            "queue_urls must contain at least one value",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, queue) in config.queue_urls.iter().enumerate() {
        if queue.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("queue_urls[{idx}]"),
                "queue url cannot be empty",
            ));
        }
        if !seen.insert(queue) {
            return Err(ContractError::config_validation(
                format!("queue_urls[{idx}]"),
                format!("duplicate queue url '{queue}'"),
            ));
        }
    }
    Ok(())
}

/// 校验超时与并发上限
fn validate_limits(config: &RelayConfig) -> Result<(), ContractError> {
    if config.client_timeout_secs == 0 {
        return Err(ContractError::config_validation(
            "client_timeout_secs",
            "client_timeout_secs must be > 0",
        ));
    }
    if config.max_in_flight_sends == 0 {
        return Err(ContractError::config_validation(
            "max_in_flight_sends",
            "max_in_flight_sends must be > 0",
        ));
    }
    if config.max_concurrent_receives == 0 {
        return Err(ContractError::config_validation(
            "max_concurrent_receives",
            "max_concurrent_receives must be > 0",
        ));
    }
    Ok(())
}

/// 校验单个 backend
fn validate_backend(field: &str, backend: &BackendConfig) -> Result<(), ContractError> {
    if backend.name.trim().is_empty() {
        return Err(ContractError::config_validation(
            format!("{field}.name"),
            "backend name cannot be empty",
        ));
    }

    if let BackendKind::Mock {
        behavior: MockBehavior::FailEvery,
        fail_every,
    } = &backend.kind
    {
        match fail_every {
            Some(n) if *n > 0 => {}
            Some(_) => {
                return Err(ContractError::config_validation(
                    format!("{field}.fail_every"),
                    "fail_every must be > 0",
                ))
            }
            None => {
                return Err(ContractError::config_validation(
                    format!("{field}.fail_every"),
                    "fail_every is required when behavior = \"fail_every\"",
                ))
            }
        }
    }
    Ok(())
}

/// 校验 backend 名称互不相同
fn validate_backend_names(config: &RelayConfig) -> Result<(), ContractError> {
    if config.backend_a.name == config.backend_b.name {
        return Err(ContractError::config_validation(
            "backend_b.name",
            format!("duplicate backend name '{}'", config.backend_b.name),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> RelayConfig {
        RelayConfig {
            queue_urls: vec!["emails".into()],
            healthy_threshold: 3,
            unhealthy_threshold: 2,
            minimum_iteration_duration_ms: 1000,
            client_timeout_secs: 10,
            max_in_flight_sends: 64,
            max_concurrent_receives: 256,
            poison_counts_as_failure: false,
            backend_a: BackendConfig {
                name: "sendgrid".into(),
                kind: BackendKind::Log,
            },
            backend_b: BackendConfig {
                name: "ses".into(),
                kind: BackendKind::Log,
            },
        }
    }

    #[test]
    fn test_valid_config() {
        let config = minimal_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_queue_urls() {
        let mut config = minimal_config();
        config.queue_urls.clear();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("at least one value"), "got: {err}");
    }

    #[test]
    fn test_duplicate_queue_url() {
        let mut config = minimal_config();
        config.queue_urls.push("emails".into());
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("duplicate queue url"), "got: {err}");
    }

    #[test]
    fn test_blank_queue_url() {
        let mut config = minimal_config();
        config.queue_urls.push("  ".into());
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("cannot be empty"), "got: {err}");
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = minimal_config();
        config.client_timeout_secs = 0;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("client_timeout_secs must be > 0"), "got: {err}");
    }

    #[test]
    fn test_zero_in_flight_sends() {
        let mut config = minimal_config();
        config.max_in_flight_sends = 0;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("max_in_flight_sends"), "got: {err}");
    }

    #[test]
    fn test_duplicate_backend_name() {
        let mut config = minimal_config();
        config.backend_b.name = "sendgrid".into();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("duplicate backend name"), "got: {err}");
    }

    #[test]
    fn test_fail_every_required() {
        let mut config = minimal_config();
        config.backend_b.kind = BackendKind::Mock {
            behavior: MockBehavior::FailEvery,
            fail_every: None,
        };
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("fail_every is required"), "got: {err}");

        config.backend_b.kind = BackendKind::Mock {
            behavior: MockBehavior::FailEvery,
            fail_every: Some(0),
        };
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("fail_every must be > 0"), "got: {err}");
    }

    #[test]
    fn test_zero_thresholds_are_allowed() {
        let mut config = minimal_config();
        config.healthy_threshold = 0;
        config.unhealthy_threshold = 0;
        config.minimum_iteration_duration_ms = 0;
        assert!(validate(&config).is_ok());
    }
}
