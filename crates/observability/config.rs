use std::env;

#[derive(Clone, Debug)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Clone, Debug)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) default_directive: String,
    pub(crate) ansi: bool,
    pub(crate) with_target: bool,
    /// Collected while parsing, logged once the subscriber exists.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    fn from_lookup(component: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut warnings = Vec::new();
        let component = component.trim().to_string();
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let service_context = ServiceContext {
            service_name: non_empty("SERVICE_NAME").unwrap_or_else(|| component.clone()),
            environment: non_empty("STAGE").unwrap_or_else(|| "unknown".to_string()),
            component,
        };

        let default_directive = match non_empty("LOG_LEVEL") {
            Some(raw) => match parse_level(&raw) {
                Some(level) => level.to_string(),
                None => {
                    warnings.push(format!("LOG_LEVEL is invalid (value: {raw}); defaulting to info"));
                    "info".to_string()
                }
            },
            None => "info".to_string(),
        };

        let ansi = flag(&non_empty, "LOG_ANSI", true, &mut warnings);
        let with_target = flag(&non_empty, "LOG_TARGET", true, &mut warnings);

        Self {
            service_context,
            default_directive,
            ansi,
            with_target,
            warnings,
        }
    }
}

fn flag(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: bool,
    warnings: &mut Vec<String>,
) -> bool {
    match lookup(key) {
        None => default,
        Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
            warnings.push(format!("{key} is not a boolean (value: {raw}); using {default}"));
            default
        }),
    }
}

fn parse_level(input: &str) -> Option<&'static str> {
    match input.trim().to_ascii_lowercase().as_str() {
        "error" => Some("error"),
        "warn" | "warning" => Some("warn"),
        "info" => Some("info"),
        "debug" => Some("debug"),
        "trace" => Some("trace"),
        _ => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> ObservabilityConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ObservabilityConfig::from_lookup("backend", |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_to_component_name_and_info() {
        let config = config_with(&[]);

        assert_eq!(config.service_context.service_name, "backend");
        assert_eq!(config.service_context.environment, "unknown");
        assert_eq!(config.default_directive, "info");
        assert!(config.ansi);
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn invalid_values_fall_back_with_warnings() {
        let config = config_with(&[("LOG_LEVEL", "loud"), ("LOG_ANSI", "maybe")]);

        assert_eq!(config.default_directive, "info");
        assert!(config.ansi);
        assert_eq!(config.warnings.len(), 2);
    }

    #[test]
    fn reads_stage_and_level() {
        let config = config_with(&[("STAGE", "production"), ("LOG_LEVEL", "WARNING"), ("LOG_ANSI", "off")]);

        assert_eq!(config.service_context.environment, "production");
        assert_eq!(config.default_directive, "warn");
        assert!(!config.ansi);
    }
}
