//! Rendering modes and the default detection heuristic.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HydrateCoreError;

/// Header set by the router when it prefetches a page in the background.
pub const PREFETCH_HEADER: &str = "next-router-prefetch";

/// Header set when a page is being regenerated on a timer.
pub const REVALIDATE_HEADER: &str = "x-next-revalidate";

/// Build phase value marking a production build.
pub const PRODUCTION_BUILD_PHASE: &str = "phase-production-build";

/// How the current page is being rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RenderMode {
    /// Rendered per request on the server.
    #[default]
    #[serde(rename = "ssr")]
    ServerDynamic,
    /// Rendered on the server, cached and refreshed on a timer.
    #[serde(rename = "isr")]
    PeriodicRegeneration,
    /// Rendered once at build time.
    #[serde(rename = "static")]
    StaticBuildTime,
    /// Rendered in the browser; nothing is prefetched.
    #[serde(rename = "csr")]
    ClientOnly,
}

impl RenderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServerDynamic => "ssr",
            Self::PeriodicRegeneration => "isr",
            Self::StaticBuildTime => "static",
            Self::ClientOnly => "csr",
        }
    }

    /// Whether server-side prefetching happens in this mode at all.
    pub fn prefetches(&self) -> bool {
        !matches!(self, Self::ClientOnly)
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderMode {
    type Err = HydrateCoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ssr" => Ok(Self::ServerDynamic),
            "isr" => Ok(Self::PeriodicRegeneration),
            "static" => Ok(Self::StaticBuildTime),
            "csr" => Ok(Self::ClientOnly),
            other => Err(HydrateCoreError::InvalidMode(other.to_string())),
        }
    }
}

/// What the mode heuristic looks at.
///
/// Header names are stored lowercased, so lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestEnvironment {
    /// Running in the browser rather than on a server.
    pub is_client: bool,
    /// Incoming request headers, if there is a request in scope.
    pub headers: Option<HashMap<String, String>>,
    /// Build phase reported by the host, if any.
    pub build_phase: Option<String>,
}

impl RequestEnvironment {
    /// A server environment with no request in scope.
    pub fn server() -> Self {
        Self::default()
    }

    /// A browser environment.
    pub fn client() -> Self {
        Self {
            is_client: true,
            ..Self::default()
        }
    }

    /// Add a request header.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(HashMap::new)
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_build_phase(mut self, phase: impl Into<String>) -> Self {
        self.build_phase = Some(phase.into());
        self
    }

    /// Non-empty header value, case-insensitive on the name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()?
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Decide the render mode for an environment.
///
/// Checks, in order: browser, prefetch header, revalidate header, production
/// build phase. Anything else renders dynamically on the server.
pub fn detect_mode(env: &RequestEnvironment) -> RenderMode {
    if env.is_client {
        return RenderMode::ClientOnly;
    }

    if env.header(PREFETCH_HEADER).is_some() {
        return RenderMode::ClientOnly;
    }
    if env.header(REVALIDATE_HEADER).is_some() {
        return RenderMode::PeriodicRegeneration;
    }

    if env.build_phase.as_deref() == Some(PRODUCTION_BUILD_PHASE) {
        return RenderMode::StaticBuildTime;
    }

    RenderMode::ServerDynamic
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_environment_is_client_only() {
        let env = RequestEnvironment::client().with_header(REVALIDATE_HEADER, "1");
        assert_eq!(detect_mode(&env), RenderMode::ClientOnly);
    }

    #[test]
    fn test_prefetch_header_wins_over_revalidate() {
        let env = RequestEnvironment::server()
            .with_header("Next-Router-Prefetch", "1")
            .with_header(REVALIDATE_HEADER, "1");
        assert_eq!(detect_mode(&env), RenderMode::ClientOnly);
    }

    #[test]
    fn test_revalidate_header_is_periodic() {
        let env = RequestEnvironment::server().with_header("X-Next-Revalidate", "1");
        assert_eq!(detect_mode(&env), RenderMode::PeriodicRegeneration);
    }

    #[test]
    fn test_empty_header_value_ignored() {
        let env = RequestEnvironment::server().with_header(PREFETCH_HEADER, "");
        assert_eq!(detect_mode(&env), RenderMode::ServerDynamic);
    }

    #[test]
    fn test_build_phase_is_static() {
        let env = RequestEnvironment::server().with_build_phase(PRODUCTION_BUILD_PHASE);
        assert_eq!(detect_mode(&env), RenderMode::StaticBuildTime);
    }

    #[test]
    fn test_headers_checked_before_build_phase() {
        let env = RequestEnvironment::server()
            .with_build_phase(PRODUCTION_BUILD_PHASE)
            .with_header(REVALIDATE_HEADER, "1");
        assert_eq!(detect_mode(&env), RenderMode::PeriodicRegeneration);
    }

    #[test]
    fn test_default_is_server_dynamic() {
        assert_eq!(
            detect_mode(&RequestEnvironment::server()),
            RenderMode::ServerDynamic
        );
    }

    #[test]
    fn test_render_mode_default() {
        assert_eq!(RenderMode::default(), RenderMode::ServerDynamic);
    }

    #[test]
    fn test_parse_and_display() {
        for mode in [
            RenderMode::ServerDynamic,
            RenderMode::PeriodicRegeneration,
            RenderMode::StaticBuildTime,
            RenderMode::ClientOnly,
        ] {
            assert_eq!(mode.to_string().parse::<RenderMode>().unwrap(), mode);
        }
        assert!(matches!(
            "spa".parse::<RenderMode>(),
            Err(HydrateCoreError::InvalidMode(_))
        ));
    }

    #[test]
    fn test_serde_uses_short_names() {
        assert_eq!(
            serde_json::to_string(&RenderMode::PeriodicRegeneration).unwrap(),
            r#""isr""#
        );
        assert!(!RenderMode::ClientOnly.prefetches());
        assert!(RenderMode::StaticBuildTime.prefetches());
    }
}
