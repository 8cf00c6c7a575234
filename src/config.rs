use std::env;

use crate::error::{Error, Result};

/// Environment variables the client understands.
pub const DOMAIN_VAR: &str = "CAIRN_DOMAIN";
pub const TOKEN_VAR: &str = "CAIRN_TOKEN";
pub const USERNAME_VAR: &str = "CAIRN_USERNAME";
pub const PASSWORD_VAR: &str = "CAIRN_PASSWORD";

/// Connection and authentication settings for a Cairn session.
///
/// A domain is always required, together with a token and/or a username and
/// password. When both are present the token is used until the service
/// rejects it, at which point the credentials drive a re-login.
#[derive(Debug, Clone)]
pub struct Config {
    pub domain: String,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    env_password: bool,
}

impl Config {
    pub fn new(
        domain: impl Into<String>,
        token: Option<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self> {
        let domain = domain.into();
        Self::build(domain, token, username, password, false)
    }

    /// Resolve settings from explicit values with environment fallbacks.
    /// Remembers whether the password came from the environment, which gates
    /// the concurrent upload mode.
    pub fn resolve(
        domain: Option<String>,
        token: Option<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Result<Self> {
        let domain = domain.or_else(|| non_empty_var(DOMAIN_VAR)).unwrap_or_default();
        let token = token.or_else(|| non_empty_var(TOKEN_VAR));
        let username = username.or_else(|| non_empty_var(USERNAME_VAR));
        let (password, env_password) = match password {
            Some(value) => (Some(value), false),
            None => match non_empty_var(PASSWORD_VAR) {
                Some(value) => (Some(value), true),
                None => (None, false),
            },
        };
        Self::build(domain, token, username, password, env_password)
    }

    /// Resolve settings from the environment alone.
    pub fn from_env() -> Result<Self> {
        Self::resolve(None, None, None, None)
    }

    fn build(
        domain: String,
        token: Option<String>,
        username: Option<String>,
        password: Option<String>,
        env_password: bool,
    ) -> Result<Self> {
        if domain.trim().is_empty() {
            return Err(Error::Validation(
                "a domain must be provided for connecting to the service".to_string(),
            ));
        }
        if token.is_none() && !(username.is_some() && password.is_some()) {
            return Err(Error::Validation(
                "either a token or login credentials (username and password) must be provided"
                    .to_string(),
            ));
        }
        Ok(Config {
            domain,
            token,
            username,
            password,
            env_password,
        })
    }

    /// True when the password was sourced from the environment rather than a
    /// flag or prompt.
    pub fn has_env_password(&self) -> bool {
        self.env_password && self.password.is_some()
    }

    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn requires_domain() {
        let result = Config::new("", Some("tok".into()), None, None);
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn requires_token_or_credentials() {
        let result = Config::new("https://cairn.example", None, Some("user".into()), None);
        assert!(matches!(result, Err(Error::Validation(_))));

        let ok = Config::new(
            "https://cairn.example",
            None,
            Some("user".into()),
            Some("pass".into()),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn token_alone_is_enough() {
        let config = Config::new("https://cairn.example", Some("tok".into()), None, None).unwrap();
        assert!(!config.has_credentials());
        assert!(!config.has_env_password());
    }

    #[test]
    fn explicit_password_is_not_env_sourced() {
        let config = Config::resolve(
            Some("https://cairn.example".into()),
            None,
            Some("user".into()),
            Some("pass".into()),
        )
        .unwrap();
        assert!(!config.has_env_password());
    }
}
