//! Injectable render-mode resolution.

use hydrate_core::{detect_mode, RenderMode, RequestEnvironment};

/// Environment variable carrying the host's build phase.
pub const PHASE_ENV_VAR: &str = "HYDRATE_PHASE";

/// Decides how the current page is rendered.
pub trait ModeResolver: Send + Sync {
    fn resolve(&self) -> RenderMode;
}

/// Always the same mode.
impl ModeResolver for RenderMode {
    fn resolve(&self) -> RenderMode {
        *self
    }
}

/// Runs the default heuristic over a captured request environment.
impl ModeResolver for RequestEnvironment {
    fn resolve(&self) -> RenderMode {
        detect_mode(self)
    }
}

/// Runs the default heuristic over the process environment, with no request in scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvModeResolver;

impl ModeResolver for EnvModeResolver {
    fn resolve(&self) -> RenderMode {
        detect_mode(&environment_from_env())
    }
}

/// Adapts a closure into a [`ModeResolver`].
pub struct FnResolver<F>(F);

impl<F> ModeResolver for FnResolver<F>
where
    F: Fn() -> RenderMode + Send + Sync,
{
    fn resolve(&self) -> RenderMode {
        (self.0)()
    }
}

/// Wrap a closure as a resolver.
pub fn resolver_fn<F>(f: F) -> FnResolver<F>
where
    F: Fn() -> RenderMode + Send + Sync,
{
    FnResolver(f)
}

/// Server environment as seen from process environment variables.
pub fn environment_from_env() -> RequestEnvironment {
    RequestEnvironment {
        build_phase: std::env::var(PHASE_ENV_VAR).ok(),
        ..RequestEnvironment::server()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydrate_core::REVALIDATE_HEADER;

    #[test]
    fn test_fixed_mode() {
        assert_eq!(
            RenderMode::StaticBuildTime.resolve(),
            RenderMode::StaticBuildTime
        );
    }

    #[test]
    fn test_request_environment_resolver() {
        let env = RequestEnvironment::server().with_header(REVALIDATE_HEADER, "1");
        assert_eq!(env.resolve(), RenderMode::PeriodicRegeneration);
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = resolver_fn(|| RenderMode::ClientOnly);
        assert_eq!(resolver.resolve(), RenderMode::ClientOnly);
    }

    #[test]
    fn test_env_resolver_is_never_client_only() {
        assert_ne!(EnvModeResolver.resolve(), RenderMode::ClientOnly);
    }
}
