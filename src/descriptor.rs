//! Server and API descriptors.
//!
//! A [`Config`] is the typed descriptor set the registry is built from: named
//! [`Server`] targets and named [`Api`] endpoints referencing them. Descriptors
//! deserialize straight from YAML and are normalized once via
//! [`Config::setup_defaults`] before use.

use crate::error::GoxError;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// All configured servers, keyed by name.
pub type Servers = HashMap<String, Server>;

/// All configured APIs, keyed by name.
pub type Apis = HashMap<String, Api>;

/// A named network target.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Server {
    /// Server name, filled from the registry key during defaulting.
    #[serde(skip)]
    pub name: String,
    /// Host name, defaults to "localhost".
    #[serde(default)]
    pub host: String,
    /// Port, defaults to 80.
    #[serde(default)]
    pub port: u16,
    /// Use https when true.
    #[serde(default)]
    pub https: bool,
    /// Connect timeout in milliseconds, defaults to 50.
    #[serde(default, rename = "connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Connection-acquisition timeout in milliseconds, defaults to 50.
    #[serde(default, rename = "connection_request_timeout")]
    pub connection_request_timeout_ms: u64,
}

impl Server {
    pub(crate) fn apply_defaults(&mut self) {
        if self.connect_timeout_ms == 0 {
            self.connect_timeout_ms = 50;
        }
        if self.connection_request_timeout_ms == 0 {
            self.connection_request_timeout_ms = 50;
        }
        if self.port == 0 {
            self.port = 80;
        }
        if self.host.is_empty() {
            self.host = "localhost".to_string();
        }
    }
}

/// A named HTTP endpoint with its resilience parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Api {
    /// API name, filled from the registry key during defaulting.
    #[serde(skip)]
    pub name: String,
    /// HTTP method, defaults to "GET".
    #[serde(default)]
    pub method: String,
    /// Path template; `{name}` segments are substituted from path params.
    #[serde(default)]
    pub path: String,
    /// Name of the server this API targets.
    #[serde(default)]
    pub server: String,
    /// Client timeout in milliseconds for a single transport attempt.
    #[serde(default, rename = "timeout")]
    pub timeout_ms: u64,
    /// Maximum concurrent calls, defaults to 1.
    #[serde(default)]
    pub concurrency: u32,
    /// Queue size, defaults to 1. Kept for configuration fidelity; the
    /// concurrency ceiling alone bounds admission.
    #[serde(default, rename = "queue_size")]
    pub queue_size: u32,
    /// Marks the API as async in configuration.
    #[serde(default, rename = "async")]
    pub async_api: bool,
    /// Comma-separated status codes treated as non-error outcomes.
    #[serde(default, rename = "acceptable_codes")]
    pub acceptable_codes: String,
    /// Number of retry attempts after the first call.
    #[serde(default, rename = "retry_count")]
    pub retry_count: u32,
    /// Initial retry backoff in milliseconds.
    #[serde(default, rename = "retry_initial_wait_time_ms")]
    pub initial_retry_wait_time_ms: u64,
    /// Disables the circuit-breaker wrapper for this API.
    #[serde(default, rename = "disable_hystrix")]
    pub disable_circuit: bool,
    /// Parsed form of `acceptable_codes`, rederived on every defaulting pass.
    /// Public so struct-update syntax works; always overwritten by
    /// [`Config::setup_defaults`].
    #[serde(skip)]
    #[doc(hidden)]
    pub acceptable_code_set: HashSet<u16>,
}

impl Api {
    /// True iff `code` is in the parsed acceptable-code set.
    pub fn is_code_acceptable(&self, code: u16) -> bool {
        self.acceptable_code_set.contains(&code)
    }

    /// Full URL for this API against `server`, path template untouched.
    pub fn url(&self, server: &Server) -> String {
        let scheme = if server.https { "https" } else { "http" };
        format!("{}://{}:{}{}", scheme, server.host, server.port, self.path)
    }

    /// Composed timeout bounding the resilience layer, in milliseconds.
    ///
    /// The base timeout is extended by the retry budget
    /// (`base * retry_count + initial_backoff`) and then inflated by 10%
    /// (minimum +2 ms) so the outer wrapper never races the transport's own
    /// retry loop.
    pub fn timeout_with_retry_included(&self) -> u64 {
        let mut timeout = self.timeout_ms;
        if self.retry_count > 0 {
            timeout += self.timeout_ms * u64::from(self.retry_count) + self.initial_retry_wait_time_ms;
        }
        let delta = timeout / 10;
        if delta == 0 {
            timeout + 2
        } else {
            timeout + delta
        }
    }

    /// Apply field defaults and rederive the acceptable-code set. Does not
    /// touch `name`; that comes from the registry key or the caller.
    pub(crate) fn apply_defaults(&mut self) {
        if self.timeout_ms == 0 {
            self.timeout_ms = 1;
        }
        if self.concurrency == 0 {
            self.concurrency = 1;
        }
        if self.queue_size == 0 {
            self.queue_size = 1;
        }
        if self.method.is_empty() {
            self.method = "GET".to_string();
        }
        if self.acceptable_codes.is_empty() {
            self.acceptable_codes = "200,201".to_string();
        }
        self.rebuild_acceptable_code_set();
    }

    fn rebuild_acceptable_code_set(&mut self) {
        self.acceptable_code_set = self
            .acceptable_codes
            .split(',')
            .filter_map(|token| token.trim().parse::<u16>().ok())
            .collect();
        if self.acceptable_code_set.is_empty() {
            self.acceptable_code_set.insert(200);
            self.acceptable_code_set.insert(201);
        }
    }
}

/// The full descriptor set the registry is built from.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Named servers.
    #[serde(default)]
    pub servers: Servers,
    /// Named APIs.
    #[serde(default)]
    pub apis: Apis,
}

impl Config {
    /// Parse a configuration from a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, GoxError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Normalize descriptors in place: fill names from registry keys, apply
    /// defaults, and rederive each API's acceptable-code set.
    ///
    /// Idempotent; the registry runs it on construction and on every reload.
    pub fn setup_defaults(&mut self) {
        for (name, server) in &mut self.servers {
            server.name = name.clone();
            server.apply_defaults();
        }

        for (name, api) in &mut self.apis {
            api.name = name.clone();
            api.apply_defaults();
        }
    }

    /// Exact-match server lookup.
    pub fn find_server_by_name(&self, name: &str) -> Result<&Server, GoxError> {
        self.servers
            .get(name)
            .ok_or_else(|| GoxError::ServerNotFound(name.to_string()))
    }

    /// Exact-match API lookup.
    pub fn find_api_by_name(&self, name: &str) -> Result<&Api, GoxError> {
        self.apis
            .get(name)
            .ok_or_else(|| GoxError::ApiNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_api(api: Api) -> Config {
        let mut config = Config::default();
        config.servers.insert("testServer".to_string(), Server::default());
        config.apis.insert("testApi".to_string(), api);
        config.setup_defaults();
        config
    }

    #[test]
    fn test_server_defaults() {
        let config = config_with_api(Api::default());
        let server = config.find_server_by_name("testServer").unwrap();
        assert_eq!(server.name, "testServer");
        assert_eq!(server.host, "localhost");
        assert_eq!(server.port, 80);
        assert_eq!(server.connect_timeout_ms, 50);
        assert_eq!(server.connection_request_timeout_ms, 50);
        assert!(!server.https);
    }

    #[test]
    fn test_api_defaults() {
        let config = config_with_api(Api::default());
        let api = config.find_api_by_name("testApi").unwrap();
        assert_eq!(api.name, "testApi");
        assert_eq!(api.method, "GET");
        assert_eq!(api.timeout_ms, 1);
        assert_eq!(api.concurrency, 1);
        assert_eq!(api.queue_size, 1);
        assert_eq!(api.acceptable_codes, "200,201");
        assert!(api.is_code_acceptable(200));
        assert!(api.is_code_acceptable(201));
        assert!(!api.is_code_acceptable(404));
    }

    #[test]
    fn test_acceptable_codes_ignore_unparsable_tokens() {
        let config = config_with_api(Api {
            acceptable_codes: "200, 404, abc, 500".to_string(),
            ..Default::default()
        });
        let api = config.find_api_by_name("testApi").unwrap();
        assert!(api.is_code_acceptable(200));
        assert!(api.is_code_acceptable(404));
        assert!(api.is_code_acceptable(500));
        assert!(!api.is_code_acceptable(201));
    }

    #[test]
    fn test_acceptable_codes_fall_back_when_fully_unparsable() {
        let config = config_with_api(Api {
            acceptable_codes: "x,y,z".to_string(),
            ..Default::default()
        });
        let api = config.find_api_by_name("testApi").unwrap();
        assert!(api.is_code_acceptable(200));
        assert!(api.is_code_acceptable(201));
        assert!(!api.is_code_acceptable(500));
    }

    #[test]
    fn test_composed_timeout_with_retries() {
        let config = config_with_api(Api {
            timeout_ms: 1000,
            retry_count: 3,
            initial_retry_wait_time_ms: 10,
            ..Default::default()
        });
        let api = config.find_api_by_name("testApi").unwrap();
        // 1000 + 1000*3 + 10 = 4010, plus 10% = 4411
        assert_eq!(api.timeout_with_retry_included(), 4411);
    }

    #[test]
    fn test_composed_timeout_without_retries() {
        let config = config_with_api(Api {
            timeout_ms: 100,
            ..Default::default()
        });
        let api = config.find_api_by_name("testApi").unwrap();
        assert_eq!(api.timeout_with_retry_included(), 110);
    }

    #[test]
    fn test_composed_timeout_minimum_inflation() {
        let config = config_with_api(Api {
            timeout_ms: 5,
            ..Default::default()
        });
        let api = config.find_api_by_name("testApi").unwrap();
        // 5 / 10 rounds to zero, so the inflation floor of +2 applies
        assert_eq!(api.timeout_with_retry_included(), 7);
    }

    #[test]
    fn test_url_uses_tls_flag() {
        let mut config = Config::default();
        config.servers.insert(
            "secure".to_string(),
            Server {
                host: "example.com".to_string(),
                port: 443,
                https: true,
                ..Default::default()
            },
        );
        config.apis.insert(
            "getUser".to_string(),
            Api {
                path: "/users/{id}".to_string(),
                server: "secure".to_string(),
                ..Default::default()
            },
        );
        config.setup_defaults();

        let server = config.find_server_by_name("secure").unwrap();
        let api = config.find_api_by_name("getUser").unwrap();
        assert_eq!(api.url(server), "https://example.com:443/users/{id}");
    }

    #[test]
    fn test_lookup_failures() {
        let config = config_with_api(Api::default());
        assert!(matches!(
            config.find_server_by_name("missing"),
            Err(GoxError::ServerNotFound(_))
        ));
        assert!(matches!(
            config.find_api_by_name("missing"),
            Err(GoxError::ApiNotFound(_))
        ));
    }

    #[test]
    fn test_from_yaml_str() {
        let yaml = r#"
servers:
  jsonplaceholder:
    host: jsonplaceholder.typicode.com
    port: 80
    https: false
    connect_timeout: 1000
    connection_request_timeout: 1000

apis:
  getPosts:
    method: GET
    path: /posts/{id}
    server: jsonplaceholder
    timeout: 1000
    acceptable_codes: "200,201"
  delay_timeout_10:
    path: /delay
    server: jsonplaceholder
    timeout: 10
    concurrency: 3
"#;
        let mut config = Config::from_yaml_str(yaml).unwrap();
        config.setup_defaults();

        let server = config.find_server_by_name("jsonplaceholder").unwrap();
        assert_eq!(server.host, "jsonplaceholder.typicode.com");
        assert_eq!(server.connect_timeout_ms, 1000);

        let api = config.find_api_by_name("getPosts").unwrap();
        assert_eq!(api.method, "GET");
        assert_eq!(api.path, "/posts/{id}");
        assert_eq!(api.timeout_ms, 1000);

        let api = config.find_api_by_name("delay_timeout_10").unwrap();
        assert_eq!(api.method, "GET");
        assert_eq!(api.concurrency, 3);
    }
}
