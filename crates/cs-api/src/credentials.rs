//! Connection parameters and credential discovery.
//!
//! Credentials are resolved once per invocation from the first applicable
//! source, in priority order:
//!
//! 1. Explicit keys supplied by the caller
//! 2. `CLOUDSTACK_ACCESS_KEY`, `CLOUDSTACK_SECRET_KEY` and `CLOUDSTACK_URL`
//! 3. A `cloudstack.ini` file with a `[driver]` section
//! 4. A CloudMonkey config file (`[user]` keys plus a `[server]` address)
//!
//! # Example
//!
//! ```rust,no_run
//! use cs_api::credentials::{CredentialResolver, ExplicitCredentials};
//!
//! # fn example() -> cs_api::Result<()> {
//! let conn = CredentialResolver::new(ExplicitCredentials::default()).resolve()?;
//! println!("talking to {}", conn.api_url());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use ini::Ini;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

/// Environment variable holding the access key.
pub const ENV_ACCESS_KEY: &str = "CLOUDSTACK_ACCESS_KEY";

/// Environment variable holding the secret key.
pub const ENV_SECRET_KEY: &str = "CLOUDSTACK_SECRET_KEY";

/// Environment variable holding the API endpoint.
pub const ENV_API_URL: &str = "CLOUDSTACK_URL";

/// Environment variable overriding the `cloudstack.ini` location.
pub const ENV_INI_PATH: &str = "CLOUDSTACK_INI_PATH";

/// Environment variable overriding the CloudMonkey config location.
pub const ENV_CLOUDMONKEY_PATH: &str = "CLOUDMONKEY_CONFIG_PATH";

/// File name looked up next to the executable.
pub const INI_FILE_NAME: &str = "cloudstack.ini";

/// Resolved connection parameters for one API endpoint.
///
/// Immutable once constructed and passed explicitly to the dispatcher.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    access_key: String,
    secret_key: String,
    api_url: String,
}

impl ConnectionParams {
    /// Creates connection parameters, validating the endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a key is empty or the URL is not an
    /// absolute `http`/`https` URL.
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Result<Self> {
        let access_key = access_key.into();
        let secret_key = secret_key.into();
        let api_url = api_url.into();

        if access_key.is_empty() {
            return Err(Error::config("access key is empty"));
        }
        if secret_key.is_empty() {
            return Err(Error::config("secret key is empty"));
        }

        let parsed = Url::parse(&api_url)
            .map_err(|e| Error::config(format!("invalid api url '{api_url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "invalid api url '{api_url}': scheme must be http or https"
            )));
        }

        Ok(Self {
            access_key,
            secret_key,
            api_url,
        })
    }

    /// The API access key, sent as the `apikey` parameter.
    #[must_use]
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// The secret key used to sign requests. Never sent over the wire.
    #[must_use]
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    /// The API endpoint URL.
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("access_key", &mask_key(&self.access_key))
            .field("secret_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Mask a key for logging, keeping only a short prefix and suffix.
pub(crate) fn mask_key(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    }
}

/// Keys supplied directly by the caller, e.g. from command-line flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExplicitCredentials {
    /// Access key.
    pub access_key: Option<String>,
    /// Secret key.
    pub secret_key: Option<String>,
    /// API endpoint.
    pub api_url: Option<String>,
}

/// The source a set of credentials was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Caller-supplied keys.
    Explicit,
    /// The `CLOUDSTACK_*` environment variables.
    Environment,
    /// A `cloudstack.ini` file.
    CloudStackIni(PathBuf),
    /// A CloudMonkey config file.
    CloudMonkey(PathBuf),
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicit keys"),
            Self::Environment => write!(f, "environment"),
            Self::CloudStackIni(path) => write!(f, "{}", path.display()),
            Self::CloudMonkey(path) => write!(f, "cloudmonkey config {}", path.display()),
        }
    }
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Picks the first applicable credential source and loads it.
pub struct CredentialResolver {
    explicit: ExplicitCredentials,
    env: EnvLookup,
    default_ini_path: Option<PathBuf>,
    default_cloudmonkey_path: Option<PathBuf>,
}

impl fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("default_ini_path", &self.default_ini_path)
            .field("default_cloudmonkey_path", &self.default_cloudmonkey_path)
            .finish_non_exhaustive()
    }
}

impl CredentialResolver {
    /// Creates a resolver reading the process environment and the default
    /// file locations.
    #[must_use]
    pub fn new(explicit: ExplicitCredentials) -> Self {
        Self {
            explicit,
            env: Box::new(|key| std::env::var(key).ok()),
            default_ini_path: default_ini_path(),
            default_cloudmonkey_path: dirs::home_dir()
                .map(|home| home.join(".cloudmonkey").join("config")),
        }
    }

    /// Replaces the environment lookup.
    #[must_use]
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Box::new(lookup);
        self
    }

    /// Replaces the default `cloudstack.ini` location.
    #[must_use]
    pub fn with_default_ini_path(mut self, path: Option<PathBuf>) -> Self {
        self.default_ini_path = path;
        self
    }

    /// Replaces the default CloudMonkey config location.
    #[must_use]
    pub fn with_default_cloudmonkey_path(mut self, path: Option<PathBuf>) -> Self {
        self.default_cloudmonkey_path = path;
        self
    }

    /// Determines which source applies without reading any file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if no source applies, or if explicit keys are
    /// given without an API URL.
    pub fn select_source(&self) -> Result<CredentialSource> {
        if self.explicit.access_key.is_some() && self.explicit.secret_key.is_some() {
            if self.explicit.api_url.is_none() {
                return Err(Error::config(
                    "an api url is required when access and secret keys are given",
                ));
            }
            return Ok(CredentialSource::Explicit);
        }

        if [ENV_ACCESS_KEY, ENV_SECRET_KEY, ENV_API_URL]
            .iter()
            .all(|key| (self.env)(key).is_some())
        {
            return Ok(CredentialSource::Environment);
        }

        if let Some(path) = (self.env)(ENV_INI_PATH) {
            return Ok(CredentialSource::CloudStackIni(PathBuf::from(path)));
        }
        if let Some(path) = self.default_ini_path.as_ref().filter(|p| p.is_file()) {
            return Ok(CredentialSource::CloudStackIni(path.clone()));
        }

        if let Some(path) = (self.env)(ENV_CLOUDMONKEY_PATH) {
            return Ok(CredentialSource::CloudMonkey(PathBuf::from(path)));
        }
        if let Some(path) = self.default_cloudmonkey_path.as_ref().filter(|p| p.is_file()) {
            return Ok(CredentialSource::CloudMonkey(path.clone()));
        }

        Err(Error::config(
            "connection parameters not specified; use a cloudstack.ini file or \
             specify the api url, access key and secret key",
        ))
    }

    /// Resolves connection parameters from the first applicable source.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if no source applies or the selected one is
    /// incomplete.
    pub fn resolve(&self) -> Result<ConnectionParams> {
        let source = self.select_source()?;
        debug!(source = %source, "Resolving credentials");

        match source {
            CredentialSource::Explicit => {
                let ExplicitCredentials {
                    access_key,
                    secret_key,
                    api_url,
                } = self.explicit.clone();
                ConnectionParams::new(
                    access_key.unwrap_or_default(),
                    secret_key.unwrap_or_default(),
                    api_url.unwrap_or_default(),
                )
            }
            CredentialSource::Environment => ConnectionParams::new(
                (self.env)(ENV_ACCESS_KEY).unwrap_or_default(),
                (self.env)(ENV_SECRET_KEY).unwrap_or_default(),
                (self.env)(ENV_API_URL).unwrap_or_default(),
            ),
            CredentialSource::CloudStackIni(path) => read_cloudstack_ini(&path),
            CredentialSource::CloudMonkey(path) => read_cloudmonkey_config(&path),
        }
    }
}

fn default_ini_path() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(INI_FILE_NAME)))
}

fn load_ini(path: &Path, what: &str) -> Result<Ini> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("cannot read {what} {}: {e}", path.display())))?;
    Ini::load_from_str(&content)
        .map_err(|e| Error::config(format!("cannot parse {what} {}: {e}", path.display())))
}

fn required<'a>(ini: &'a Ini, what: &str, section: &str, key: &str) -> Result<&'a str> {
    let props = ini
        .section(Some(section))
        .ok_or_else(|| Error::config(format!("{what} must contain a [{section}] section")))?;
    // Option names are case-insensitive.
    props
        .iter()
        .find_map(|(k, v)| k.eq_ignore_ascii_case(key).then_some(v))
        .ok_or_else(|| Error::config(format!("{what} does not have '{key}' defined in [{section}]")))
}

/// Reads a `cloudstack.ini` file: `[driver]` with `access_key`, `secret_key`
/// and `url`.
///
/// # Errors
///
/// Returns `Error::Config` if the file is unreadable or a key is missing.
pub fn read_cloudstack_ini(path: &Path) -> Result<ConnectionParams> {
    let what = INI_FILE_NAME;
    let ini = load_ini(path, what)?;
    ConnectionParams::new(
        required(&ini, what, "driver", "access_key")?,
        required(&ini, what, "driver", "secret_key")?,
        required(&ini, what, "driver", "url")?,
    )
}

/// Reads a CloudMonkey config: `[user]` `apikey`/`secretkey`, and the
/// endpoint assembled from `[server]` `protocol://host:port` + `path`.
///
/// # Errors
///
/// Returns `Error::Config` if the file is unreadable or a key is missing.
pub fn read_cloudmonkey_config(path: &Path) -> Result<ConnectionParams> {
    let what = "cloudmonkey config";
    let ini = load_ini(path, what)?;

    let access_key = required(&ini, what, "user", "apikey")?;
    let secret_key = required(&ini, what, "user", "secretkey")?;
    let url = format!(
        "{}://{}:{}{}",
        required(&ini, what, "server", "protocol")?,
        required(&ini, what, "server", "host")?,
        required(&ini, what, "server", "port")?,
        required(&ini, what, "server", "path")?,
    );

    ConnectionParams::new(access_key, secret_key, url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const URL: &str = "https://cloud.example.com/client/api";

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + Send + Sync + 'static {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn isolated(explicit: ExplicitCredentials) -> CredentialResolver {
        CredentialResolver::new(explicit)
            .with_env(env_from(&[]))
            .with_default_ini_path(None)
            .with_default_cloudmonkey_path(None)
    }

    fn write_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("should create temp file");
        file.write_all(content.as_bytes()).expect("should write");
        file
    }

    #[test]
    fn test_connection_params_accessors() {
        let conn = ConnectionParams::new("ak", "sk", URL).expect("should be valid");
        assert_eq!(conn.access_key(), "ak");
        assert_eq!(conn.secret_key(), "sk");
        assert_eq!(conn.api_url(), URL);
    }

    #[test]
    fn test_connection_params_rejects_bad_url() {
        let err = ConnectionParams::new("ak", "sk", "not a url").expect_err("should fail");
        assert!(err.is_configuration_error());

        let err = ConnectionParams::new("ak", "sk", "ftp://cloud.example.com").expect_err("should fail");
        assert!(err.to_string().contains("scheme"));
    }

    #[test]
    fn test_connection_params_rejects_empty_keys() {
        assert!(ConnectionParams::new("", "sk", URL).is_err());
        assert!(ConnectionParams::new("ak", "", URL).is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let conn = ConnectionParams::new("AKIAEXAMPLEKEY1234", "super-secret", URL)
            .expect("should be valid");
        let debug = format!("{conn:?}");
        assert!(!debug.contains("super-secret"));
        assert!(!debug.contains("AKIAEXAMPLEKEY1234"));
        assert!(debug.contains("AKIA...1234"));
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("short"), "*****");
        assert_eq!(mask_key("0123456789"), "0123...6789");
    }

    #[test]
    fn test_explicit_keys_take_priority() {
        let resolver = isolated(ExplicitCredentials {
            access_key: Some("explicit-ak".into()),
            secret_key: Some("explicit-sk".into()),
            api_url: Some(URL.into()),
        })
        .with_env(env_from(&[
            (ENV_ACCESS_KEY, "env-ak"),
            (ENV_SECRET_KEY, "env-sk"),
            (ENV_API_URL, URL),
        ]));

        assert_eq!(resolver.select_source().expect("should select"), CredentialSource::Explicit);
        let conn = resolver.resolve().expect("should resolve");
        assert_eq!(conn.access_key(), "explicit-ak");
    }

    #[test]
    fn test_explicit_keys_without_url_fail() {
        let resolver = isolated(ExplicitCredentials {
            access_key: Some("ak".into()),
            secret_key: Some("sk".into()),
            api_url: None,
        });
        assert!(resolver.resolve().expect_err("should fail").is_configuration_error());
    }

    #[test]
    fn test_environment_source() {
        let resolver = isolated(ExplicitCredentials::default()).with_env(env_from(&[
            (ENV_ACCESS_KEY, "env-ak"),
            (ENV_SECRET_KEY, "env-sk"),
            (ENV_API_URL, URL),
        ]));

        assert_eq!(
            resolver.select_source().expect("should select"),
            CredentialSource::Environment
        );
        let conn = resolver.resolve().expect("should resolve");
        assert_eq!(conn.access_key(), "env-ak");
        assert_eq!(conn.secret_key(), "env-sk");
    }

    #[test]
    fn test_partial_environment_is_skipped() {
        let resolver = isolated(ExplicitCredentials::default())
            .with_env(env_from(&[(ENV_ACCESS_KEY, "env-ak"), (ENV_API_URL, URL)]));
        assert!(resolver.select_source().is_err());
    }

    #[test]
    fn test_ini_from_env_path() {
        let file = write_file(&format!(
            "[driver]\naccess_key = ini-ak\nsecret_key = ini-sk\nurl = {URL}\n"
        ));
        let path = file.path().to_string_lossy().to_string();
        let resolver =
            isolated(ExplicitCredentials::default()).with_env(env_from(&[(ENV_INI_PATH, path.as_str())]));

        let conn = resolver.resolve().expect("should resolve");
        assert_eq!(conn.access_key(), "ini-ak");
        assert_eq!(conn.secret_key(), "ini-sk");
        assert_eq!(conn.api_url(), URL);
    }

    #[test]
    fn test_ini_default_path_used_when_present() {
        let file = write_file(&format!(
            "[driver]\naccess_key = ak\nsecret_key = sk\nurl = {URL}\n"
        ));
        let resolver = isolated(ExplicitCredentials::default())
            .with_default_ini_path(Some(file.path().to_path_buf()));

        assert_eq!(
            resolver.select_source().expect("should select"),
            CredentialSource::CloudStackIni(file.path().to_path_buf())
        );
    }

    #[test]
    fn test_ini_missing_section() {
        let file = write_file("[other]\naccess_key = ak\n");
        let err = read_cloudstack_ini(file.path()).expect_err("should fail");
        assert!(err.to_string().contains("[driver]"));
    }

    #[test]
    fn test_ini_missing_key() {
        let file = write_file("[driver]\naccess_key = ak\nsecret_key = sk\n");
        let err = read_cloudstack_ini(file.path()).expect_err("should fail");
        assert!(err.to_string().contains("'url'"));
    }

    #[test]
    fn test_ini_option_names_ignore_case() {
        let file = write_file(
            "[driver]\nAccess_Key: ak\nSECRET_KEY = sk\nUrl = https://cloud.example.com/client/api\n",
        );
        let conn = read_cloudstack_ini(file.path()).expect("should read");
        assert_eq!(conn.access_key(), "ak");
        assert_eq!(conn.secret_key(), "sk");
        assert_eq!(conn.api_url(), "https://cloud.example.com/client/api");
    }

    #[test]
    fn test_ini_unreadable_file() {
        let err = read_cloudstack_ini(Path::new("/nonexistent/cloudstack.ini")).expect_err("should fail");
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_cloudmonkey_config() {
        let file = write_file(
            "[user]\napikey = cm-ak\nsecretkey = cm-sk\n\n\
             [server]\nprotocol = http\nhost = 10.0.0.5\nport = 8080\npath = /client/api\n",
        );
        let conn = read_cloudmonkey_config(file.path()).expect("should read");
        assert_eq!(conn.access_key(), "cm-ak");
        assert_eq!(conn.secret_key(), "cm-sk");
        assert_eq!(conn.api_url(), "http://10.0.0.5:8080/client/api");
    }

    #[test]
    fn test_cloudmonkey_missing_server_section() {
        let file = write_file("[user]\napikey = ak\nsecretkey = sk\n");
        let err = read_cloudmonkey_config(file.path()).expect_err("should fail");
        assert!(err.to_string().contains("[server]"));
    }

    #[test]
    fn test_cloudmonkey_selected_after_ini() {
        let cm = write_file(
            "[user]\napikey = ak\nsecretkey = sk\n[server]\nprotocol = https\nhost = h\nport = 443\npath = /client/api\n",
        );
        let resolver = isolated(ExplicitCredentials::default())
            .with_default_cloudmonkey_path(Some(cm.path().to_path_buf()));

        assert_eq!(
            resolver.select_source().expect("should select"),
            CredentialSource::CloudMonkey(cm.path().to_path_buf())
        );
    }

    #[test]
    fn test_no_source_is_config_error() {
        let err = isolated(ExplicitCredentials::default()).resolve().expect_err("should fail");
        assert!(matches!(err, Error::Config { .. }));
    }
}
