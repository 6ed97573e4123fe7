//! Build-variable expansion for composite baseline names.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

fn macro_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_.]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("macro pattern is a valid regex")
    })
}

/// Replace `${VAR}` and `$VAR` with values from `env`.
///
/// Unknown variables are left untouched.
pub fn expand_macros(pattern: &str, env: &BTreeMap<String, String>) -> String {
    macro_pattern()
        .replace_all(pattern, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match env.get(name) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
