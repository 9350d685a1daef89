//! Robots.txt rules
//!
//! Allow/deny matching is delegated to the robotstxt crate. Crawl-delay is
//! not exposed by that crate, so it is recovered with a small line scanner
//! over the raw content.

use robotstxt::DefaultMatcher;

/// Parsed robots.txt rules for one host
#[derive(Debug, Clone)]
pub struct RobotsRules {
    /// Raw robots.txt content
    content: String,

    /// When set, every URL is allowed regardless of content
    permit_all: bool,
}

impl RobotsRules {
    /// Builds rules from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            permit_all: false,
        }
    }

    /// Permissive rules used when no robots.txt exists for a host
    pub fn permit_all() -> Self {
        Self {
            content: String::new(),
            permit_all: true,
        }
    }

    /// The raw robots.txt content
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Checks whether `url` may be fetched by `user_agent`
    pub fn is_url_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.permit_all || self.content.is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }

    /// The Crawl-delay directive applying to `user_agent`, in seconds
    ///
    /// A group naming the agent specifically wins over the `*` group.
    pub fn get_crawl_delay(&self, user_agent: &str) -> Option<f64> {
        if self.permit_all || self.content.is_empty() {
            return None;
        }

        let agent = user_agent.to_lowercase();
        let mut group_agents: Vec<String> = Vec::new();
        let mut in_directives = false;
        let mut wildcard_delay: Option<f64> = None;
        let mut agent_delay: Option<f64> = None;

        for line in self.content.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    // A user-agent line after directives starts a new group
                    if in_directives {
                        group_agents.clear();
                        in_directives = false;
                    }
                    group_agents.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    in_directives = true;
                    let Ok(delay) = value.parse::<f64>() else {
                        continue;
                    };
                    if group_agents
                        .iter()
                        .any(|ua| ua.as_str() != "*" && agent.contains(ua.as_str()))
                    {
                        agent_delay = Some(delay);
                    } else if group_agents.iter().any(|ua| ua.as_str() == "*") {
                        wildcard_delay = Some(delay);
                    }
                }
                _ => {
                    in_directives = true;
                }
            }
        }

        agent_delay.or(wildcard_delay)
    }
}
