use crate::models::{AppConfig, ColorSource, Template, TemplateAssignmentMode};
use crate::modules::painting::palette::parse_hex_color;
use std::collections::HashSet;
use std::fmt;
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub field: String,
    pub message: String,
    pub actual_value: Option<String>,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.actual_value {
            Some(val) => write!(f, "  • {}: {} (got: {})", self.field, self.message, val),
            None => write!(f, "  • {}: {}", self.field, self.message),
        }
    }
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            actual_value: None,
        }
    }

    fn with_value(
        field: impl Into<String>,
        message: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            actual_value: Some(value.to_string()),
        }
    }
}
pub fn validate_app_config(config: &AppConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    match reqwest::Url::parse(config.api_base_url.trim()) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        _ => errors.push(ConfigError::with_value(
            "api_base_url",
            "must be an absolute HTTP(S) URL",
            &config.api_base_url,
        )),
    }
    if config.request_timeout_secs == 0 {
        errors.push(ConfigError::with_value(
            "request_timeout_secs",
            "must be greater than 0",
            config.request_timeout_secs,
        ));
    } else if config.request_timeout_secs > 600 {
        errors.push(ConfigError::with_value(
            "request_timeout_secs",
            "should not exceed 600 seconds (10 minutes)",
            config.request_timeout_secs,
        ));
    }

    let painting = &config.painting;
    if painting.concurrency_limit == 0 {
        errors.push(ConfigError::with_value(
            "painting.concurrency_limit",
            "must be at least 1",
            painting.concurrency_limit,
        ));
    }
    if painting.continuous && painting.pass_interval_secs == 0 {
        errors.push(ConfigError::with_value(
            "painting.pass_interval_secs",
            "must be greater than 0 when running continuously",
            painting.pass_interval_secs,
        ));
    }

    if config.retry.max_transient_attempts == 0 {
        errors.push(ConfigError::with_value(
            "retry.max_transient_attempts",
            "must be at least 1",
            config.retry.max_transient_attempts,
        ));
    }

    if let Some(command) = &config.renewal.command {
        if command.first().map_or(true, |program| program.trim().is_empty()) {
            errors.push(ConfigError::new(
                "renewal.command",
                "must start with a program name when set",
            ));
        }
        if config.renewal.timeout_secs == 0 {
            errors.push(ConfigError::with_value(
                "renewal.timeout_secs",
                "must be greater than 0",
                config.renewal.timeout_secs,
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks every template plus the configured assignment against them.
pub fn validate_templates(
    templates: &[Template],
    assignment: &TemplateAssignmentMode,
) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    if templates.is_empty() {
        errors.push(ConfigError::new("templates", "must define at least one template"));
    }

    let mut seen = HashSet::new();
    for (index, template) in templates.iter().enumerate() {
        let field = format!("templates[{}]", index);
        if !seen.insert(template.id) {
            errors.push(ConfigError::with_value(
                format!("{}.id", field),
                "duplicate template id",
                template.id,
            ));
        }
        if let Err(message) = template.bounds.validate() {
            errors.push(ConfigError::new(format!("{}.bounds", field), message));
        }
        match template.color_source() {
            Ok(ColorSource::Single(color)) => {
                if parse_hex_color(&color).is_none() {
                    errors.push(ConfigError::with_value(
                        format!("{}.color", field),
                        "must be a #RRGGBB hex color",
                        color,
                    ));
                }
            }
            Ok(ColorSource::Image(path)) => {
                if !path.is_file() {
                    errors.push(ConfigError::with_value(
                        format!("{}.image", field),
                        "image file does not exist",
                        path.display(),
                    ));
                }
            }
            Err(message) => errors.push(ConfigError::new(field.clone(), message)),
        }
    }

    if let TemplateAssignmentMode::Fixed { template_id } = assignment {
        if !templates.iter().any(|t| t.id == *template_id) {
            errors.push(ConfigError::with_value(
                "painting.template_assignment.template_id",
                "does not match any template",
                template_id,
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
