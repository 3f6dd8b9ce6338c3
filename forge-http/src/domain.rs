use regex::Regex;

use crate::error::RoutingError;

/// `{sub}.example.com` compiled into a case-insensitive, anchored regex
/// with named captures, per `spec.md` §4.5.
#[derive(Debug, Clone)]
pub struct CompiledDomain {
    pub source: String,
    pub regex: Regex,
}

pub struct DomainCompiler;

impl DomainCompiler {
    pub fn compile(pattern: &str) -> Result<CompiledDomain, RoutingError> {
        static NAME_RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
        let name_re = NAME_RE.get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

        let mut built = String::from("(?i)^");
        let mut last_end = 0;
        for caps in name_re.captures_iter(pattern) {
            let m = caps.get(0).unwrap();
            built.push_str(&regex::escape(&pattern[last_end..m.start()]));
            let name = &caps[1];
            built.push_str(&format!(r"(?P<{name}>[\w\-.]+)"));
            last_end = m.end();
        }
        built.push_str(&regex::escape(&pattern[last_end..]));
        built.push('$');

        let regex = Regex::new(&built).map_err(|e| RoutingError::InvalidPath {
            path: pattern.to_string(),
            reason: format!("invalid domain pattern: {e}"),
        })?;

        Ok(CompiledDomain { source: pattern.to_string(), regex })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_subdomain_capture() {
        let compiled = DomainCompiler::compile("{tenant}.example.com").unwrap();
        let caps = compiled.regex.captures("acme.example.com").unwrap();
        assert_eq!(&caps["tenant"], "acme");
    }

    #[test]
    fn matching_is_case_insensitive() {
        let compiled = DomainCompiler::compile("{tenant}.example.com").unwrap();
        assert!(compiled.regex.is_match("ACME.EXAMPLE.COM"));
    }

    #[test]
    fn literal_domain_matches_exactly() {
        let compiled = DomainCompiler::compile("api.example.com").unwrap();
        assert!(compiled.regex.is_match("api.example.com"));
        assert!(!compiled.regex.is_match("evilapi.example.com.attacker.net"));
    }
}
