//! Rate-limit key functions.
//!
//! A key function maps a request to the bucket it is counted against. They
//! are looked up by name from `RATELIMIT_KEY_FUNC` once, at startup.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header::USER_AGENT, Request},
};
use serde_json::Value;

use crate::config::defaults::RATELIMIT_KEY_FUNC;
use crate::config::Config;
use crate::error::ConfigError;

/// Derives a rate-limit key from a request.
pub type KeyFunc = Arc<dyn Fn(&Request<Body>) -> String + Send + Sync>;

pub const USERAGENT_AND_IP: &str = "useragent_and_ip";
pub const REMOTE_ADDRESS: &str = "remote_address";

/// Address used when the connection info is unavailable.
const FALLBACK_ADDRESS: &str = "127.0.0.1";

/// Client IP of the request.
pub fn remote_address(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| FALLBACK_ADDRESS.to_string())
}

/// User agent and client IP, so clients behind one NAT are told apart.
pub fn useragent_and_ip(request: &Request<Body>) -> String {
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .unwrap_or_default();
    format!("{}:{}", user_agent, remote_address(request))
}

/// Named key functions.
#[derive(Clone)]
pub struct KeyFuncRegistry {
    funcs: BTreeMap<String, KeyFunc>,
}

impl KeyFuncRegistry {
    /// A registry holding the built-in key functions.
    pub fn new() -> Self {
        let mut registry = Self {
            funcs: BTreeMap::new(),
        };
        registry.register(USERAGENT_AND_IP, useragent_and_ip);
        registry.register(REMOTE_ADDRESS, remote_address);
        registry
    }

    /// Register `func` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&Request<Body>) -> String + Send + Sync + 'static,
    {
        self.funcs.insert(name.into(), Arc::new(func));
    }

    pub fn get(&self, name: &str) -> Option<KeyFunc> {
        self.funcs.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.funcs.keys().map(String::as_str)
    }

    /// Resolve `RATELIMIT_KEY_FUNC`, defaulting to [`USERAGENT_AND_IP`].
    pub fn resolve(&self, config: &Config) -> Result<KeyFunc, ConfigError> {
        let name = match config.get(RATELIMIT_KEY_FUNC) {
            None | Some(Value::Null) => USERAGENT_AND_IP,
            Some(Value::String(name)) => name.as_str(),
            Some(_) => {
                return Err(ConfigError::invalid(RATELIMIT_KEY_FUNC, "expected a function name"));
            }
        };

        self.get(name)
            .ok_or_else(|| ConfigError::UnknownKeyFunc(name.to_string()))
    }
}

impl Default for KeyFuncRegistry {
    fn default() -> Self {
        Self::new()
    }
}
