//! Profiles and `${...}` placeholder resolution

use crate::{RegistryError, Result};
use indexmap::{IndexMap, IndexSet};

/// Profile that is active when no profile has been activated explicitly
pub const DEFAULT_PROFILE: &str = "default";

const PLACEHOLDER_PREFIX: &str = "${";
const PLACEHOLDER_SUFFIX: &str = "}";
const VALUE_SEPARATOR: char = ':';

/// Source of active profiles and property values.
///
/// Only [`active_profiles`](Self::active_profiles) and
/// [`property`](Self::property) are required; profile matching and
/// placeholder resolution are provided on top of them.
pub trait Environment: Send + Sync {
    /// Profiles activated explicitly
    fn active_profiles(&self) -> Vec<String>;

    /// Profiles that count as active while no profile is active explicitly
    fn default_profiles(&self) -> Vec<String> {
        vec![DEFAULT_PROFILE.to_string()]
    }

    /// Value of a property, if any
    fn property(&self, key: &str) -> Option<String>;

    /// Whether `profile` is active, falling back to the default profiles
    fn is_profile_active(&self, profile: &str) -> bool {
        let active = self.active_profiles();
        if active.iter().any(|p| p == profile) {
            return true;
        }
        active.is_empty() && self.default_profiles().iter().any(|p| p == profile)
    }

    /// Whether any of `specs` matches; `!name` matches when `name` is not active.
    fn accepts_profiles(&self, specs: &[&str]) -> bool {
        specs.iter().any(|spec| match spec.strip_prefix('!') {
            Some(negated) => !self.is_profile_active(negated),
            None => self.is_profile_active(spec),
        })
    }

    /// Resolve placeholders, leaving unresolvable ones untouched.
    fn resolve_placeholders(&self, text: &str) -> String {
        let lookup = |key: &str| self.property(key);
        resolve_placeholders_with(text, true, &lookup).unwrap_or_else(|_| text.to_string())
    }

    /// Resolve placeholders, failing on any without a value or default.
    fn resolve_required_placeholders(&self, text: &str) -> Result<String> {
        let lookup = |key: &str| self.property(key);
        resolve_placeholders_with(text, false, &lookup)
    }
}

/// Replace `${key}` and `${key:default}` placeholders in `text`.
///
/// Placeholders may nest inside keys, defaults and resolved values. A
/// placeholder that refers back to itself fails with `UnresolvedPlaceholder`
/// regardless of `ignore_unresolvable`.
pub fn resolve_placeholders_with(
    text: &str,
    ignore_unresolvable: bool,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<String> {
    let mut visiting = Vec::new();
    parse_value(text, ignore_unresolvable, lookup, &mut visiting)
}

fn parse_value(
    text: &str,
    ignore_unresolvable: bool,
    lookup: &dyn Fn(&str) -> Option<String>,
    visiting: &mut Vec<String>,
) -> Result<String> {
    let mut result = text.to_string();
    let mut start = result.find(PLACEHOLDER_PREFIX);

    while let Some(begin) = start {
        let Some(end) = placeholder_end(&result, begin) else {
            break;
        };

        let placeholder = result[begin + PLACEHOLDER_PREFIX.len()..end].to_string();
        if visiting.contains(&placeholder) {
            return Err(RegistryError::UnresolvedPlaceholder {
                placeholder,
                text: text.to_string(),
            });
        }
        visiting.push(placeholder.clone());

        let key = parse_value(&placeholder, ignore_unresolvable, lookup, visiting)?;
        let mut value = lookup(&key);
        if value.is_none() {
            if let Some((actual, default)) = key.split_once(VALUE_SEPARATOR) {
                value = Some(lookup(actual).unwrap_or_else(|| default.to_string()));
            }
        }

        match value {
            Some(value) => {
                let value = parse_value(&value, ignore_unresolvable, lookup, visiting)?;
                result.replace_range(begin..end + PLACEHOLDER_SUFFIX.len(), &value);
                let resume = begin + value.len();
                start = result[resume..].find(PLACEHOLDER_PREFIX).map(|i| resume + i);
            }
            None if ignore_unresolvable => {
                let resume = end + PLACEHOLDER_SUFFIX.len();
                start = result[resume..].find(PLACEHOLDER_PREFIX).map(|i| resume + i);
            }
            None => {
                return Err(RegistryError::UnresolvedPlaceholder {
                    placeholder: key,
                    text: text.to_string(),
                });
            }
        }

        visiting.pop();
    }

    Ok(result)
}

/// Byte index of the `}` closing the placeholder opened at `begin`
fn placeholder_end(text: &str, begin: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut index = begin + PLACEHOLDER_PREFIX.len();
    let mut depth = 0usize;

    while index < bytes.len() {
        if bytes[index] == b'}' {
            if depth == 0 {
                return Some(index);
            }
            depth -= 1;
            index += 1;
        } else if bytes[index..].starts_with(PLACEHOLDER_PREFIX.as_bytes()) {
            depth += 1;
            index += PLACEHOLDER_PREFIX.len();
        } else {
            index += 1;
        }
    }
    None
}

/// Environment backed by an in-memory property map.
///
/// # Examples
///
/// ```rust
/// use component_registry::{Environment, StandardEnvironment};
///
/// let env = StandardEnvironment::new()
///     .with_property("env", "prod")
///     .with_active_profile("prod");
///
/// assert_eq!(env.resolve_required_placeholders("conf/${env}.xml").unwrap(), "conf/prod.xml");
/// assert_eq!(env.resolve_required_placeholders("${region:eu}").unwrap(), "eu");
/// assert!(env.accepts_profiles(&["prod"]));
/// assert!(!env.accepts_profiles(&["!prod"]));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StandardEnvironment {
    properties: IndexMap<String, String>,
    active: IndexSet<String>,
    defaults: Option<IndexSet<String>>,
    system_environment: bool,
}

impl StandardEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_properties<I, K, V>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.properties
            .extend(properties.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_active_profile(mut self, profile: impl Into<String>) -> Self {
        self.active.insert(profile.into());
        self
    }

    pub fn with_active_profiles<I, S>(mut self, profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.active.extend(profiles.into_iter().map(Into::into));
        self
    }

    /// Replace the default profiles (normally just `default`)
    pub fn with_default_profiles<I, S>(mut self, profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.defaults = Some(profiles.into_iter().map(Into::into).collect());
        self
    }

    /// Fall back to process environment variables for unknown properties
    pub fn with_system_environment(mut self, enabled: bool) -> Self {
        self.system_environment = enabled;
        self
    }
}

impl Environment for StandardEnvironment {
    fn active_profiles(&self) -> Vec<String> {
        self.active.iter().cloned().collect()
    }

    fn default_profiles(&self) -> Vec<String> {
        match &self.defaults {
            Some(defaults) => defaults.iter().cloned().collect(),
            None => vec![DEFAULT_PROFILE.to_string()],
        }
    }

    fn property(&self, key: &str) -> Option<String> {
        self.properties.get(key).cloned().or_else(|| {
            if self.system_environment {
                std::env::var(key).ok()
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn env() -> StandardEnvironment {
        StandardEnvironment::new()
            .with_property("env", "prod")
            .with_property("file", "app-${env}.xml")
            .with_property("loop", "${loop}")
            .with_property("name.prod", "production")
    }

    #[test]
    fn test_simple_and_default_placeholders() {
        let env = env();
        assert_eq!(env.resolve_required_placeholders("plain").unwrap(), "plain");
        assert_eq!(
            env.resolve_required_placeholders("conf/${env}/${missing:base}.xml").unwrap(),
            "conf/prod/base.xml"
        );
        assert_eq!(env.resolve_required_placeholders("${missing:}").unwrap(), "");
    }

    #[test]
    fn test_nested_placeholders() {
        let env = env();
        assert_eq!(env.resolve_required_placeholders("${file}").unwrap(), "app-prod.xml");
        assert_eq!(
            env.resolve_required_placeholders("${name.${env}}").unwrap(),
            "production"
        );
        assert_eq!(
            env.resolve_required_placeholders("${missing:${env}}").unwrap(),
            "prod"
        );
    }

    #[test]
    fn test_unresolved_placeholder() {
        let err = env()
            .resolve_required_placeholders("conf/${region}.xml")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedPlaceholder);
        assert_eq!(
            err,
            RegistryError::UnresolvedPlaceholder {
                placeholder: "region".into(),
                text: "conf/${region}.xml".into(),
            }
        );

        assert_eq!(env().resolve_placeholders("conf/${region}.xml"), "conf/${region}.xml");
    }

    #[test]
    fn test_self_reference_fails() {
        let err = env().resolve_required_placeholders("${loop}").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedPlaceholder);
    }

    #[test]
    fn test_unterminated_placeholder_left_alone() {
        assert_eq!(env().resolve_required_placeholders("${env").unwrap(), "${env");
    }

    #[test]
    fn test_profiles() {
        let dev = StandardEnvironment::new().with_active_profile("dev");
        assert!(dev.accepts_profiles(&["dev"]));
        assert!(dev.accepts_profiles(&["prod", "dev"]));
        assert!(!dev.accepts_profiles(&["prod"]));
        assert!(dev.accepts_profiles(&["!prod"]));
        assert!(!dev.accepts_profiles(&["default"]));

        let none = StandardEnvironment::new();
        assert!(none.accepts_profiles(&["default"]));
        assert!(!none.accepts_profiles(&["prod"]));

        let custom = StandardEnvironment::new().with_default_profiles(["local"]);
        assert!(custom.accepts_profiles(&["local"]));
        assert!(!custom.accepts_profiles(&["default"]));
    }
}
