//! Build metadata embedded by the build script.

/// The git commit hash at build time (short form).
pub const GIT_HASH: &str = env!("PARLEY_GIT_HASH");

/// The build profile (`debug` or `release`).
pub const BUILD_PROFILE: &str = env!("PARLEY_BUILD_PROFILE");

/// The crate version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The `User-Agent` sent with every backend request, e.g. `parley/0.1.0 (abc1234)`.
pub fn user_agent() -> String {
    format!("parley/{VERSION} ({GIT_HASH})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_carries_version() {
        let ua = user_agent();
        assert!(ua.starts_with("parley/"));
        assert!(ua.contains(VERSION));
        assert!(ua.contains(GIT_HASH));
    }

    #[test]
    fn test_build_profile() {
        assert_eq!(BUILD_PROFILE, "debug");
    }
}
