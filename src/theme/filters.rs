//! Template filters registered by the extension.

use std::collections::HashMap;

use tera::Value;
use url::Url;

/// Name of the redirect-sanitizing filter.
pub const SAFE_REDIRECT: &str = "safe_redirect";

/// Make a redirect target safe to follow.
///
/// Relative targets stay on this site. Absolute targets keep their host only
/// when it is in `allowed_hosts`; otherwise they are reduced to path, query
/// and fragment. Anything that is not http(s) becomes `/`.
pub fn safe_redirect(target: &str, allowed_hosts: &[String]) -> String {
    let target = target.trim();
    let absolute = Url::parse(target).is_ok() || target.starts_with("//");
    let Ok(url) = Url::parse("http://localhost/").and_then(|base| base.join(target)) else {
        return "/".to_string();
    };
    if !matches!(url.scheme(), "http" | "https") {
        return "/".to_string();
    }

    if absolute {
        let allowed = url
            .host_str()
            .is_some_and(|host| allowed_hosts.iter().any(|a| a.eq_ignore_ascii_case(host)));
        if allowed {
            return url.to_string();
        }
    }

    local_part(&url)
}

fn local_part(url: &Url) -> String {
    let mut local = url.path().to_string();
    if let Some(query) = url.query() {
        local.push('?');
        local.push_str(query);
    }
    if let Some(fragment) = url.fragment() {
        local.push('#');
        local.push_str(fragment);
    }
    local
}

/// The `safe_redirect` filter bound to a set of allowed hosts.
pub fn safe_redirect_filter(
    allowed_hosts: Vec<String>,
) -> impl Fn(&Value, &HashMap<String, Value>) -> tera::Result<Value> + Send + Sync + 'static {
    move |value: &Value, _args: &HashMap<String, Value>| {
        let target = tera::try_get_value!(SAFE_REDIRECT, "value", String, value);
        Ok(Value::String(safe_redirect(&target, &allowed_hosts)))
    }
}
