//! Built-in matcher functions
//!
//! Pure predicates callable from matcher expressions. Each takes the
//! candidate (`key1`) and the pattern (`key2`):
//!
//! | Function     | Pattern syntax                                  |
//! |--------------|-------------------------------------------------|
//! | `keyMatch`   | literal prefix up to a single `*`               |
//! | `keyMatch2`  | `/*` wildcards and `:name` segments             |
//! | `keyMatch3`  | `/*` wildcards and `{name}` segments            |
//! | `keyMatch4`  | like `keyMatch3`, repeated tokens must agree    |
//! | `regexMatch` | regular expression anchored at the start        |
//! | `globMatch`  | filesystem glob (`*`, `?`, `[..]`, `**`)        |
//! | `ipMatch`    | IP address against an address or CIDR network   |
//!
//! The `*_func` wrappers take a variadic argument slice and use only the
//! first two positions; they are what the function registry binds.

use globset::{GlobBuilder, GlobMatcher};
use ipnet::IpNet;
use lru::LruCache;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::net::IpAddr;
use std::num::NonZeroUsize;
use tracing::warn;

use super::error::{MatchError, Result};

pub const KEY_MATCH: &str = "keyMatch";
pub const KEY_MATCH2: &str = "keyMatch2";
pub const KEY_MATCH3: &str = "keyMatch3";
pub const KEY_MATCH4: &str = "keyMatch4";
pub const REGEX_MATCH: &str = "regexMatch";
pub const GLOB_MATCH: &str = "globMatch";
pub const IP_MATCH: &str = "ipMatch";

static COLON_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":[^/]+").expect("valid colon segment pattern"));

static BRACE_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[^/]+\}").expect("valid brace segment pattern"));

static BRACE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([^/]+)\}").expect("valid brace token pattern"));

/// Compiled patterns kept per cache; least recently used are evicted
pub const PATTERN_CACHE_CAPACITY: usize = 1024;

fn pattern_cache<T>() -> Mutex<LruCache<String, T>> {
    let capacity = NonZeroUsize::new(PATTERN_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
    Mutex::new(LruCache::new(capacity))
}

/// Compiled regex cache shared by all regex-backed matchers
static REGEX_CACHE: Lazy<Mutex<LruCache<String, Regex>>> = Lazy::new(pattern_cache);

/// Compiled glob cache
static GLOB_CACHE: Lazy<Mutex<LruCache<String, GlobMatcher>>> = Lazy::new(pattern_cache);

fn compile_regex(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    if let Some(re) = REGEX_CACHE.lock().get(pattern) {
        return Ok(re.clone());
    }

    // Compiled outside the lock
    let re = Regex::new(pattern)?;
    REGEX_CACHE.lock().put(pattern.to_string(), re.clone());
    Ok(re)
}

fn compile_glob(pattern: &str) -> std::result::Result<GlobMatcher, globset::Error> {
    if let Some(glob) = GLOB_CACHE.lock().get(pattern) {
        return Ok(glob.clone());
    }

    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()?
        .compile_matcher();
    GLOB_CACHE.lock().put(pattern.to_string(), matcher.clone());
    Ok(matcher)
}

/// Matches `key1` against `^pattern$`
fn full_match(key1: &str, pattern: &str) -> bool {
    regex_match(key1, &format!("^{}$", pattern))
}

/// Rewrites `/*` path wildcards into regex form
fn expand_wildcards(key2: &str) -> String {
    key2.replace("/*", "/.*")
}

/// Determines whether `key1` matches `key2`, where `key2` may contain one `*`.
///
/// The comparison is a literal prefix check up to the `*`; anything after
/// the `*` is ignored.
///
/// ```
/// use cretoai_enforcer::matchers::key_match;
///
/// assert!(key_match("/foo/bar", "/foo/*"));
/// assert!(!key_match("/foo/bar", "/bar/*"));
/// ```
pub fn key_match(key1: &str, key2: &str) -> bool {
    match key2.find('*') {
        None => key1 == key2,
        Some(i) => key1.as_bytes().starts_with(&key2.as_bytes()[..i]),
    }
}

/// RESTful path match with `/*` wildcards and `:name` segments.
///
/// `"/resource1"` matches `"/:resource"`; a lone `"*"` matches anything.
pub fn key_match2(key1: &str, key2: &str) -> bool {
    let key2 = expand_wildcards(key2);
    let key2 = COLON_SEGMENT.replace_all(&key2, "[^/]+");

    if key2 == "*" {
        return full_match(key1, "(.*)");
    }

    full_match(key1, &key2)
}

/// RESTful path match with `/*` wildcards and `{name}` segments.
pub fn key_match3(key1: &str, key2: &str) -> bool {
    let key2 = expand_wildcards(key2);
    let key2 = BRACE_SEGMENT.replace_all(&key2, "[^/]+");

    if key2 == "*" {
        return full_match(key1, "(.*)");
    }

    full_match(key1, &key2)
}

/// Like [`key_match3`], but every occurrence of the same `{name}` token must
/// bind to the same value.
///
/// `"/parent/123/child/123"` matches `"/parent/{id}/child/{id}"`, while
/// `"/parent/123/child/456"` does not.
///
/// # Errors
///
/// [`MatchError::TokenCountMismatch`] when the number of captured groups
/// differs from the number of tokens, which means the pattern itself is
/// malformed. [`MatchError::InvalidPattern`] when the rewritten pattern is
/// not a valid regex.
pub fn key_match4(key1: &str, key2: &str) -> Result<bool> {
    let key2 = expand_wildcards(key2);

    let mut tokens: Vec<String> = Vec::new();
    let rewritten = BRACE_TOKEN.replace_all(&key2, |caps: &Captures| {
        tokens.push(caps[1].to_string());
        "([^/]+)"
    });

    let pattern = format!("^{}$", rewritten);
    let re = compile_regex(&pattern).map_err(|e| MatchError::InvalidPattern {
        pattern: pattern.clone(),
        reason: e.to_string(),
    })?;

    let Some(caps) = re.captures(key1) else {
        return Ok(false);
    };

    let values = caps.len() - 1;
    if tokens.len() != values {
        return Err(MatchError::TokenCountMismatch {
            tokens: tokens.len(),
            values,
        });
    }

    let mut bound: HashMap<&str, &str> = HashMap::new();
    for (i, token) in tokens.iter().enumerate() {
        let value = caps.get(i + 1).map(|m| m.as_str()).unwrap_or_default();
        match bound.get(token.as_str()) {
            Some(existing) if *existing != value => return Ok(false),
            Some(_) => {}
            None => {
                bound.insert(token.as_str(), value);
            }
        }
    }

    Ok(true)
}

/// Determines whether the regular expression `key2` matches `key1` starting
/// at position 0. The match is not anchored at the end.
///
/// An invalid expression never matches.
pub fn regex_match(key1: &str, key2: &str) -> bool {
    let pattern = format!("^(?:{})", key2);
    match compile_regex(&pattern) {
        Ok(re) => re.is_match(key1),
        Err(e) => {
            warn!("regexMatch: invalid pattern '{}': {}", key2, e);
            false
        }
    }
}

/// Determines whether `key1` matches the glob `key2`.
///
/// `*` and `?` never cross a `/`; `**` spans any number of segments.
pub fn glob_match(key1: &str, key2: &str) -> bool {
    match compile_glob(key2) {
        Ok(glob) => glob.is_match(key1),
        Err(e) => {
            warn!("globMatch: invalid pattern '{}': {}", key2, e);
            false
        }
    }
}

/// Determines whether IP address `ip1` lies within `ip2`, which may be a
/// single address or a CIDR network.
///
/// Falls back to exact string equality when either side does not parse.
///
/// ```
/// use cretoai_enforcer::matchers::ip_match;
///
/// assert!(ip_match("192.168.2.123", "192.168.2.0/24"));
/// assert!(ip_match("a", "a"));
/// ```
pub fn ip_match(ip1: &str, ip2: &str) -> bool {
    let Ok(addr) = ip1.parse::<IpAddr>() else {
        return ip1 == ip2;
    };

    if let Ok(network) = ip2.parse::<IpNet>() {
        return network.contains(&addr);
    }

    if let Ok(other) = ip2.parse::<IpAddr>() {
        return addr == other;
    }

    ip1 == ip2
}

fn first_two<'a>(function: &str, args: &[&'a str]) -> Result<(&'a str, &'a str)> {
    match args {
        [key1, key2, ..] => Ok((key1, key2)),
        _ => Err(MatchError::MissingArgument {
            function: function.to_string(),
            expected: 2,
            got: args.len(),
        }),
    }
}

/// Variadic wrapper for [`key_match`]
pub fn key_match_func(args: &[&str]) -> Result<bool> {
    let (key1, key2) = first_two(KEY_MATCH, args)?;
    Ok(key_match(key1, key2))
}

/// Variadic wrapper for [`key_match2`]
pub fn key_match2_func(args: &[&str]) -> Result<bool> {
    let (key1, key2) = first_two(KEY_MATCH2, args)?;
    Ok(key_match2(key1, key2))
}

/// Variadic wrapper for [`key_match3`]
pub fn key_match3_func(args: &[&str]) -> Result<bool> {
    let (key1, key2) = first_two(KEY_MATCH3, args)?;
    Ok(key_match3(key1, key2))
}

/// Variadic wrapper for [`key_match4`]
pub fn key_match4_func(args: &[&str]) -> Result<bool> {
    let (key1, key2) = first_two(KEY_MATCH4, args)?;
    key_match4(key1, key2)
}

/// Variadic wrapper for [`regex_match`]
pub fn regex_match_func(args: &[&str]) -> Result<bool> {
    let (key1, key2) = first_two(REGEX_MATCH, args)?;
    Ok(regex_match(key1, key2))
}

/// Variadic wrapper for [`glob_match`]
pub fn glob_match_func(args: &[&str]) -> Result<bool> {
    let (key1, key2) = first_two(GLOB_MATCH, args)?;
    Ok(glob_match(key1, key2))
}

/// Variadic wrapper for [`ip_match`]
pub fn ip_match_func(args: &[&str]) -> Result<bool> {
    let (ip1, ip2) = first_two(IP_MATCH, args)?;
    Ok(ip_match(ip1, ip2))
}
