//! Config-location resolution
//!
//! Turns caller-supplied location strings into the ordered list of documents
//! to load, splitting multi-location strings and resolving `${...}`
//! placeholders against the environment.

use crate::Result;
use crate::environment::Environment;

#[cfg(feature = "logging")]
use tracing::debug;

/// Separators between locations inside one location string
pub const CONFIG_LOCATION_DELIMITERS: &[char] = &[',', ';', ' ', '\t', '\n', '\r'];

/// Supplies the locations to load when none were configured.
pub trait DefaultLocations: Send + Sync {
    fn default_locations(&self) -> Vec<String>;
}

impl<F> DefaultLocations for F
where
    F: Fn() -> Vec<String> + Send + Sync,
{
    fn default_locations(&self) -> Vec<String> {
        self()
    }
}

/// No default locations at all
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDefaultLocations;

impl DefaultLocations for NoDefaultLocations {
    fn default_locations(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A fixed list of default locations
#[derive(Debug, Clone, Default)]
pub struct StaticLocations(pub Vec<String>);

impl DefaultLocations for StaticLocations {
    fn default_locations(&self) -> Vec<String> {
        self.0.clone()
    }
}

/// Locations configured by the caller.
///
/// # Examples
///
/// ```rust
/// use component_registry::{ConfigLocations, NoDefaultLocations, StandardEnvironment};
///
/// let mut locations = ConfigLocations::new();
/// locations.set_config_location("conf/base.xml, conf/${env}.xml");
///
/// let env = StandardEnvironment::new().with_property("env", "prod");
/// assert_eq!(
///     locations.resolve(&env, &NoDefaultLocations).unwrap(),
///     vec!["conf/base.xml", "conf/prod.xml"]
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLocations {
    locations: Option<Vec<String>>,
}

impl ConfigLocations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure from one string that may hold several delimited locations.
    pub fn set_config_location(&mut self, location: &str) {
        self.set_config_locations([location]);
    }

    /// Configure from several strings, each of which may hold several locations.
    ///
    /// Supplying nothing but delimiters and whitespace clears the configuration so
    /// the default locations apply again.
    pub fn set_config_locations<I, S>(&mut self, locations: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let split: Vec<String> = locations
            .into_iter()
            .flat_map(|location| {
                location
                    .as_ref()
                    .split(CONFIG_LOCATION_DELIMITERS)
                    .filter(|part| !part.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();

        self.locations = if split.is_empty() { None } else { Some(split) };
    }

    /// Forget the configured locations
    pub fn clear(&mut self) {
        self.locations = None;
    }

    /// The configured locations before placeholder resolution, if any
    pub fn configured(&self) -> Option<&[String]> {
        self.locations.as_deref()
    }

    /// The final, ordered list of locations to load.
    ///
    /// Uses `defaults` when nothing was configured. Fails with
    /// `UnresolvedPlaceholder` if a placeholder has neither a value nor a default.
    pub fn resolve(&self, environment: &dyn Environment, defaults: &dyn DefaultLocations) -> Result<Vec<String>> {
        let raw = match &self.locations {
            Some(locations) => locations.clone(),
            None => defaults.default_locations(),
        };

        let mut resolved = Vec::with_capacity(raw.len());
        for location in &raw {
            let location = environment.resolve_required_placeholders(location.trim())?;
            let location = location.trim();
            if !location.is_empty() {
                resolved.push(location.to_string());
            }
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "component_registry",
            configured = self.locations.is_some(),
            locations = ?resolved,
            "Resolved config locations"
        );

        Ok(resolved)
    }
}
