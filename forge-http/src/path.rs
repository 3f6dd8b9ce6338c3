use regex::Regex;

use crate::error::RoutingError;

/// Result of compiling a route path: a matchable regex plus metadata
/// the router engine and export validator both need.
#[derive(Debug, Clone)]
pub struct CompiledPath {
    pub source: String,
    pub regex: Regex,
    pub param_names: Vec<String>,
    pub has_wildcard: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    None,
    Optional,
    Wildcard,
}

struct ParsedParam {
    name: String,
    modifier: Modifier,
}

/// Normalize a path: single leading slash, no trailing slash except
/// root, collapse repeated slashes. `normalize("")` is `"/"`.
pub fn normalize(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return "/".to_string();
    }
    let joined = segments.join("/");
    segments.clear();
    format!("/{joined}")
}

/// Validates and compiles a route path per `spec.md` §4.5.
pub struct PathValidator;

impl PathValidator {
    pub fn validate(path: &str) -> Result<(), RoutingError> {
        if path.is_empty() || !path.starts_with('/') {
            return Err(RoutingError::InvalidPath {
                path: path.to_string(),
                reason: "path must be non-empty and start with '/'".into(),
            });
        }

        let mut seen_wildcard = false;
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let last_index = segments.len().saturating_sub(1);

        for (idx, segment) in segments.iter().enumerate() {
            let params = Self::parse_segment(segment, path)?;
            for p in &params {
                match p.modifier {
                    Modifier::Wildcard => {
                        if seen_wildcard {
                            return Err(RoutingError::InvalidPath {
                                path: path.to_string(),
                                reason: "wildcard appears more than once".into(),
                            });
                        }
                        if idx != last_index {
                            return Err(RoutingError::InvalidPath {
                                path: path.to_string(),
                                reason: "wildcard must be in the terminal segment".into(),
                            });
                        }
                        seen_wildcard = true;
                    }
                    Modifier::Optional => {
                        if seen_wildcard {
                            return Err(RoutingError::InvalidPath {
                                path: path.to_string(),
                                reason: "optional parameter cannot follow a wildcard".into(),
                            });
                        }
                    }
                    Modifier::None => {}
                }
            }
        }
        Ok(())
    }

    fn parse_segment(segment: &str, full_path: &str) -> Result<Vec<ParsedParam>, RoutingError> {
        static NAME_RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
        let name_re = NAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").unwrap());

        if !segment.starts_with('{') {
            return Ok(Vec::new());
        }
        if !segment.ends_with('}') {
            return Err(RoutingError::InvalidPath {
                path: full_path.to_string(),
                reason: format!("unterminated parameter in segment '{segment}'"),
            });
        }
        let inner = &segment[1..segment.len() - 1];
        let (name, modifier) = if let Some(stripped) = inner.strip_suffix('?') {
            (stripped, Modifier::Optional)
        } else if let Some(stripped) = inner.strip_suffix('*') {
            (stripped, Modifier::Wildcard)
        } else {
            (inner, Modifier::None)
        };

        if !name_re.is_match(name) {
            return Err(RoutingError::InvalidPath {
                path: full_path.to_string(),
                reason: format!("invalid parameter name '{name}'"),
            });
        }

        Ok(vec![ParsedParam { name: name.to_string(), modifier }])
    }

    /// Compile a validated path into a named-capture regex.
    pub fn compile(path: &str) -> Result<CompiledPath, RoutingError> {
        Self::validate(path)?;
        let normalized = normalize(path);
        let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();

        let mut pattern = String::from("^");
        let mut param_names = Vec::new();
        let mut has_wildcard = false;

        for segment in &segments {
            let params = Self::parse_segment(segment, path)?;
            pattern.push('/');
            if params.is_empty() {
                pattern.push_str(&regex::escape(segment));
                continue;
            }
            let p = &params[0];
            param_names.push(p.name.clone());
            match p.modifier {
                Modifier::None => {
                    pattern.push_str(&format!("(?P<{}>[^/]+)", p.name));
                }
                Modifier::Optional => {
                    // Optional parameter: the leading slash and the
                    // capture both become optional as a unit.
                    pattern.truncate(pattern.len() - 1);
                    pattern.push_str(&format!("(?:/(?P<{}>[^/]+))?", p.name));
                }
                Modifier::Wildcard => {
                    has_wildcard = true;
                    // Wildcard captures everything remaining including
                    // slashes, per spec.md §9's resolved open question.
                    pattern.push_str(&format!("(?P<{}>.*)", p.name));
                }
            }
        }
        pattern.push('$');

        let regex = Regex::new(&pattern).map_err(|e| RoutingError::InvalidPath {
            path: path.to_string(),
            reason: format!("failed to compile pattern: {e}"),
        })?;

        Ok(CompiledPath {
            source: path.to_string(),
            regex,
            param_names,
            has_wildcard,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_empty_is_root() {
        assert_eq!(normalize(""), "/");
    }

    #[test]
    fn normalize_collapses_and_trims() {
        assert_eq!(normalize("/a//b/"), "/a/b");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize("/a//b/");
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn rejects_missing_leading_slash() {
        assert!(PathValidator::validate("users").is_err());
    }

    #[test]
    fn rejects_invalid_param_name() {
        assert!(PathValidator::validate("/users/{1bad}").is_err());
    }

    #[test]
    fn rejects_wildcard_not_terminal() {
        assert!(PathValidator::validate("/files/{rest*}/meta").is_err());
    }

    #[test]
    fn rejects_duplicate_wildcard() {
        assert!(PathValidator::validate("/a/{x*}/{y*}").is_err());
    }

    #[test]
    fn compiles_named_captures_matching_param_names() {
        let compiled = PathValidator::compile("/users/{id}").unwrap();
        assert_eq!(compiled.param_names, vec!["id".to_string()]);
        let caps = compiled.regex.captures("/users/42").unwrap();
        assert_eq!(&caps["id"], "42");
    }

    #[test]
    fn wildcard_captures_slashes() {
        let compiled = PathValidator::compile("/files/{path*}").unwrap();
        let caps = compiled.regex.captures("/files/a/b/c.txt").unwrap();
        assert_eq!(&caps["path"], "a/b/c.txt");
    }

    #[test]
    fn optional_param_matches_with_and_without_segment() {
        let compiled = PathValidator::compile("/posts/{id?}").unwrap();
        assert!(compiled.regex.is_match("/posts"));
        let caps = compiled.regex.captures("/posts/7").unwrap();
        assert_eq!(&caps["id"], "7");
    }
}
