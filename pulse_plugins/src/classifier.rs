use pulse_core::{PulseError, Result};
use regex::Regex;

#[derive(Debug, Clone)]
pub struct ServiceMatcher {
    name: String,
    pattern: Regex,
}

impl ServiceMatcher {
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self> {
        let name = name.into();
        let pattern = Regex::new(pattern).map_err(|e| {
            PulseError::InvalidConfig(format!("Invalid pattern for service '{}': {}", name, e))
        })?;

        Ok(Self { name, pattern })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, target: &str) -> bool {
        self.pattern.is_match(target)
    }
}

/// Maps an outbound call target to a known service name.
///
/// Matchers are tried in insertion order and the first match wins.
#[derive(Debug, Clone, Default)]
pub struct ServiceClassifier {
    matchers: Vec<ServiceMatcher>,
}

impl ServiceClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_patterns<I, N, P>(services: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, P)>,
        N: Into<String>,
        P: AsRef<str>,
    {
        services
            .into_iter()
            .try_fold(Self::new(), |classifier, (name, pattern)| {
                classifier.with_service(name, pattern.as_ref())
            })
    }

    pub fn with_service(mut self, name: impl Into<String>, pattern: &str) -> Result<Self> {
        let matcher = ServiceMatcher::new(name, pattern)?;

        if self.matchers.iter().any(|m| m.name == matcher.name) {
            return Err(PulseError::InvalidConfig(format!(
                "Service '{}' is defined more than once",
                matcher.name
            )));
        }

        self.matchers.push(matcher);
        Ok(self)
    }

    pub fn classify(&self, target: &str) -> Option<&str> {
        self.matchers
            .iter()
            .find(|matcher| matcher.matches(target))
            .map(ServiceMatcher::name)
    }

    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.matchers.iter().map(ServiceMatcher::name)
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}
