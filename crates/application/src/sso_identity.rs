//! Maps OAuth provider profiles onto local user identities.

use serde_json::Value;
use tracing::{debug, warn};

use tablegate_core::{AppError, AppResult};

/// OAuth providers with a known profile layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    /// Public GitHub.
    GitHub,
    /// Organisation GitHub; usernames are namespaced with `github_`.
    GitHubAics,
}

impl OAuthProvider {
    /// Parses a provider identifier as registered with the OAuth client.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "github" => Ok(Self::GitHub),
            "github_aics" => Ok(Self::GitHubAics),
            _ => Err(AppError::Validation(format!(
                "unknown oauth provider '{value}'"
            ))),
        }
    }

    /// Returns the provider identifier.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::GitHubAics => "github_aics",
        }
    }

    fn username_for(self, login: &str) -> String {
        match self {
            Self::GitHub => login.to_owned(),
            Self::GitHubAics => format!("github_{login}"),
        }
    }
}

/// Local identity derived from a provider profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedIdentity {
    /// Username of the local account.
    pub username: String,
    /// Email of the local account; never empty.
    pub email: String,
}

/// Maps a raw provider profile to a local username and email.
///
/// The profile email is used when present and non-empty, otherwise one is
/// synthesised from the login and `fallback_domain`, because local emails
/// must be unique and non-empty.
pub fn map_provider_identity(
    provider: &str,
    profile: &Value,
    fallback_domain: &str,
) -> AppResult<MappedIdentity> {
    let provider = OAuthProvider::parse(provider).inspect_err(|error| {
        warn!(provider, "{error}");
    })?;
    debug!(provider = provider.as_str(), %profile, "mapping oauth user info");

    let login = profile
        .get("login")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|login| !login.is_empty())
        .ok_or_else(|| {
            AppError::Validation(format!(
                "{} profile is missing a login",
                provider.as_str()
            ))
        })?;

    let email = profile
        .get("email")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map_or_else(|| format!("{login}@{fallback_domain}"), str::to_owned);

    Ok(MappedIdentity {
        username: provider.username_for(login),
        email,
    })
}
