use crate::config::types::{Config, CrawlOptions, UserAgentConfig};
use crate::url::UrlFilter;
use crate::ConfigError;
use url::Url;

/// Upper bound on parallel workers
pub const MAX_CONCURRENCY: usize = 100;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_options(&config.crawler)?;
    if let Some(ua) = &config.user_agent {
        validate_user_agent_config(ua)?;
    }
    validate_output_config(&config.output)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

/// Validates crawl options
///
/// Also compiles the include/exclude patterns so a bad regular expression
/// surfaces here instead of at crawl time.
pub fn validate_options(options: &CrawlOptions) -> Result<(), ConfigError> {
    if options.concurrency < 1 || options.concurrency > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY, options.concurrency
        )));
    }

    if options.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            options.max_pages
        )));
    }

    if options.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if options.result_buffer < 1 {
        return Err(ConfigError::Validation(
            "result_buffer must be >= 1".to_string(),
        ));
    }

    if options.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    for pattern in &options.allowed_domains {
        validate_domain_pattern(pattern)?;
    }

    UrlFilter::from_options(options)?;

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_output_config(config: &crate::config::types::OutputConfig) -> Result<(), ConfigError> {
    if let Some(path) = &config.summary_path {
        if path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "summary_path cannot be empty when set".to_string(),
            ));
        }
    }
    Ok(())
}

/// Seeds must be absolute http(s) URLs
fn validate_seeds(seeds: &[String]) -> Result<(), ConfigError> {
    for seed in seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use http or https",
                seed
            )));
        }
    }
    Ok(())
}

/// Validates a domain pattern (e.g., "example.com" or "*.example.com")
pub fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    match pattern.strip_prefix("*.") {
        Some(base) => validate_domain_string(base),
        None => validate_domain_string(pattern),
    }
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    // "localhost" is the one dotless host worth scoping a crawl to
    if !domain.contains('.') && !domain.eq_ignore_ascii_case("localhost") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let (local, domain) = match email.split_once('@') {
        Some(parts) if !parts.1.contains('@') => parts,
        _ => {
            return Err(ConfigError::Validation(format!(
                "Invalid email format: '{}'",
                email
            )))
        }
    };

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
