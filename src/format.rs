//! Format attributes for the `format` keyword.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate};
use serde_json::Value;
use url::Url;

use crate::ecma::EcmaRegex;
use crate::pointer::JsonPointer;
use crate::types::{Dialect, TypeSet};

/// A named check applied by the `format` keyword.
pub trait FormatAttribute: Send + Sync {
    /// Instance types the format applies to. Other instances pass.
    fn types(&self) -> TypeSet {
        TypeSet::STRING
    }

    /// Check an instance. `Err` carries a short reason.
    fn check(&self, instance: &Value) -> Result<(), String>;
}

/// A format backed by a string predicate.
#[derive(Clone)]
pub struct FnFormat {
    types: TypeSet,
    check: Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>,
}

impl FnFormat {
    pub fn new<F>(types: TypeSet, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            types,
            check: Arc::new(check),
        }
    }

    /// A string format from a predicate.
    pub fn string<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::new(TypeSet::STRING, move |instance| match instance.as_str() {
            Some(s) if !predicate(s) => Err("does not match format".into()),
            _ => Ok(()),
        })
    }
}

impl fmt::Debug for FnFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFormat")
            .field("types", &self.types)
            .finish_non_exhaustive()
    }
}

impl FormatAttribute for FnFormat {
    fn types(&self) -> TypeSet {
        self.types
    }

    fn check(&self, instance: &Value) -> Result<(), String> {
        (self.check)(instance)
    }
}

macro_rules! string_format {
    ($name:ident, $check:path) => {
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl FormatAttribute for $name {
            fn check(&self, instance: &Value) -> Result<(), String> {
                match instance.as_str() {
                    Some(s) => $check(s),
                    None => Ok(()),
                }
            }
        }
    };
}

string_format!(DateTimeFormat, check_date_time);
string_format!(DateFormat, check_date);
string_format!(TimeFormat, check_time);
string_format!(EmailFormat, check_email);
string_format!(HostnameFormat, check_hostname);
string_format!(Ipv4Format, check_ipv4);
string_format!(Ipv6Format, check_ipv6);
string_format!(UriFormat, check_uri);
string_format!(UriReferenceFormat, check_uri_reference);
string_format!(JsonPointerFormat, check_json_pointer);
string_format!(RelativeJsonPointerFormat, check_relative_json_pointer);
string_format!(RegexFormat, check_regex);

/// Built-in formats of a dialect, by name.
pub fn builtin_formats(dialect: Dialect) -> Vec<(&'static str, Arc<dyn FormatAttribute>)> {
    let mut formats: Vec<(&'static str, Arc<dyn FormatAttribute>)> = vec![
        ("date-time", Arc::new(DateTimeFormat)),
        ("email", Arc::new(EmailFormat)),
        ("hostname", Arc::new(HostnameFormat)),
        ("ipv4", Arc::new(Ipv4Format)),
        ("ipv6", Arc::new(Ipv6Format)),
        ("regex", Arc::new(RegexFormat)),
        ("uri", Arc::new(UriFormat)),
    ];
    if dialect == Dialect::Draft7 {
        formats.extend([
            ("date", Arc::new(DateFormat) as Arc<dyn FormatAttribute>),
            ("time", Arc::new(TimeFormat)),
            ("uri-reference", Arc::new(UriReferenceFormat)),
            ("json-pointer", Arc::new(JsonPointerFormat)),
            ("relative-json-pointer", Arc::new(RelativeJsonPointerFormat)),
        ]);
    }
    formats
}

fn check_date_time(s: &str) -> Result<(), String> {
    DateTime::parse_from_rfc3339(s)
        .map(|_| ())
        .map_err(|e| format!("not an RFC 3339 date-time: {}", e))
}

fn check_date(s: &str) -> Result<(), String> {
    if s.len() != 10 {
        return Err("not a full-date (YYYY-MM-DD)".into());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|e| format!("not a full-date: {}", e))
}

fn check_time(s: &str) -> Result<(), String> {
    DateTime::parse_from_rfc3339(&format!("1970-01-01T{}", s))
        .map(|_| ())
        .map_err(|e| format!("not an RFC 3339 full-time: {}", e))
}

fn check_email(s: &str) -> Result<(), String> {
    let (local, domain) = s
        .rsplit_once('@')
        .ok_or_else(|| "missing '@'".to_string())?;
    if local.is_empty() || local.contains('@') || local.chars().any(char::is_whitespace) {
        return Err("invalid local part".into());
    }
    check_hostname(domain).map_err(|reason| format!("invalid domain: {}", reason))
}

fn check_hostname(s: &str) -> Result<(), String> {
    let host = s.strip_suffix('.').unwrap_or(s);
    if host.is_empty() || host.len() > 253 {
        return Err("hostname must be 1 to 253 characters".into());
    }
    for label in host.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(format!("label {:?} must be 1 to 63 characters", label));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(format!("label {:?} starts or ends with '-'", label));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(format!("label {:?} has invalid characters", label));
        }
    }
    Ok(())
}

fn check_ipv4(s: &str) -> Result<(), String> {
    s.parse::<Ipv4Addr>()
        .map(|_| ())
        .map_err(|_| "not a dotted-quad IPv4 address".into())
}

fn check_ipv6(s: &str) -> Result<(), String> {
    s.parse::<Ipv6Addr>()
        .map(|_| ())
        .map_err(|_| "not an IPv6 address".into())
}

fn check_uri(s: &str) -> Result<(), String> {
    if s.chars().any(|c| c.is_whitespace()) {
        return Err("URI contains whitespace".into());
    }
    Url::parse(s)
        .map(|_| ())
        .map_err(|e| format!("not an absolute URI: {}", e))
}

fn check_uri_reference(s: &str) -> Result<(), String> {
    if s.chars().any(|c| c.is_whitespace()) {
        return Err("URI reference contains whitespace".into());
    }
    let base = Url::parse("http://example.invalid/").map_err(|e| e.to_string())?;
    base.join(s)
        .map(|_| ())
        .map_err(|e| format!("not a URI reference: {}", e))
}

fn check_json_pointer(s: &str) -> Result<(), String> {
    JsonPointer::parse(s).map(|_| ()).map_err(|e| e.to_string())
}

fn check_relative_json_pointer(s: &str) -> Result<(), String> {
    let digits = s.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return Err("must start with a non-negative integer".into());
    }
    if digits > 1 && s.starts_with('0') {
        return Err("leading zeros are not allowed".into());
    }
    match &s[digits..] {
        "" | "#" => Ok(()),
        rest => check_json_pointer(rest),
    }
}

fn check_regex(s: &str) -> Result<(), String> {
    EcmaRegex::new(s).map(|_| ()).map_err(|e| e.to_string())
}
