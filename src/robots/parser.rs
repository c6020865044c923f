//! Robots.txt parser implementation
//!
//! Line-oriented: keys are case-insensitive, `#` starts a comment, blank
//! lines are ignored. Lines before the first `User-agent` are dropped, except
//! `Sitemap`, which is global.

use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Rules that apply to one user agent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsRuleSet {
    /// Lowercased agent token this set was declared for
    pub user_agent: String,
    pub allowed_paths: Vec<String>,
    pub disallowed_paths: Vec<String>,
    /// Seconds, fractional allowed
    pub crawl_delay: Option<f64>,
}

impl RobotsRuleSet {
    fn new(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            ..Self::default()
        }
    }

    /// Checks a path against this rule set
    ///
    /// Any matching `Allow` prefix wins over any matching `Disallow` prefix,
    /// regardless of length.
    pub fn is_allowed(&self, path: &str) -> bool {
        if self.allowed_paths.iter().any(|p| path.starts_with(p.as_str())) {
            return true;
        }
        !self
            .disallowed_paths
            .iter()
            .any(|p| path.starts_with(p.as_str()))
    }
}

/// A parsed robots.txt file
#[derive(Debug, Clone, Default)]
pub struct RobotsDocument {
    pub raw_text: String,
    /// Rule sets keyed by lowercased agent token (`*` for the wildcard)
    pub rules: HashMap<String, RobotsRuleSet>,
    /// `Sitemap:` URLs in declaration order
    pub sitemap_urls: Vec<String>,
}

impl RobotsDocument {
    /// Parses raw robots.txt content
    ///
    /// Never fails: unrecognized lines are skipped, and a document with no
    /// usable rules allows everything.
    pub fn parse(content: &str) -> Self {
        let mut rules: HashMap<String, RobotsRuleSet> = HashMap::new();
        let mut sitemap_urls = Vec::new();

        // Rules only ever apply to the agent named on the latest line
        let mut active: Option<String> = None;

        for line in content.lines() {
            let line = match line.find('#') {
                Some(idx) => &line[..idx],
                None => line,
            }
            .trim();

            if line.is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    let agent = value.to_ascii_lowercase();
                    if agent.is_empty() {
                        active = None;
                        continue;
                    }
                    // A later declaration for the same agent starts over
                    rules.insert(agent.clone(), RobotsRuleSet::new(&agent));
                    active = Some(agent);
                }
                "allow" | "disallow" | "crawl-delay" => {
                    let Some(set) = active.as_ref().and_then(|agent| rules.get_mut(agent)) else {
                        continue;
                    };
                    match key.as_str() {
                        "allow" if !value.is_empty() => set.allowed_paths.push(value.to_string()),
                        "disallow" if !value.is_empty() => {
                            set.disallowed_paths.push(value.to_string())
                        }
                        "crawl-delay" => {
                            if let Ok(delay) = value.parse::<f64>() {
                                if delay.is_finite() && delay >= 0.0 {
                                    set.crawl_delay = Some(delay);
                                }
                            }
                        }
                        _ => {}
                    }
                }
                "sitemap" => {
                    if !value.is_empty() {
                        sitemap_urls.push(value.to_string());
                    }
                }
                _ => {}
            }
        }

        Self {
            raw_text: content.to_string(),
            rules,
            sitemap_urls,
        }
    }

    /// A document that allows everything
    ///
    /// Used when robots.txt is absent, unreachable, or answers non-2xx.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Picks the rule set for a user agent
    ///
    /// Tries the full agent string, then its product token (the part before
    /// `/`), then `*`. Matching is case-insensitive.
    pub fn rules_for(&self, user_agent: &str) -> Option<&RobotsRuleSet> {
        let agent = user_agent.trim().to_ascii_lowercase();
        let token = agent
            .split(|c: char| c == '/' || c.is_whitespace())
            .next()
            .unwrap_or_default();

        self.rules
            .get(&agent)
            .or_else(|| self.rules.get(token))
            .or_else(|| self.rules.get("*"))
    }

    /// Checks whether a URL or path may be fetched by the given agent
    ///
    /// Full URLs are reduced to path plus query before matching.
    pub fn is_allowed(&self, path_or_url: &str, user_agent: &str) -> bool {
        let Some(rules) = self.rules_for(user_agent) else {
            return true;
        };
        rules.is_allowed(&request_path(path_or_url))
    }

    /// Crawl delay declared for the given agent
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        self.rules_for(user_agent)
            .and_then(|r| r.crawl_delay)
            .map(Duration::from_secs_f64)
    }
}

fn request_path(path_or_url: &str) -> String {
    match Url::parse(path_or_url) {
        Ok(url) => match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => url.path().to_string(),
        },
        Err(_) if path_or_url.is_empty() => "/".to_string(),
        Err(_) => path_or_url.to_string(),
    }
}
