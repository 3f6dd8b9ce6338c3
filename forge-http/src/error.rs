use std::fmt;

#[derive(Debug)]
pub enum RoutingError {
    RouteNotFound,
    MethodNotAllowed { allowed: Vec<String> },
    DuplicateRoute { name: String },
    InvalidPath { path: String, reason: String },
    UnsupportedMethod { method: String },
    NoActiveGroup,
}

impl fmt::Display for RoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingError::RouteNotFound => write!(f, "no route matched the request"),
            RoutingError::MethodNotAllowed { allowed } => {
                write!(f, "method not allowed; allowed methods: {}", allowed.join(", "))
            }
            RoutingError::DuplicateRoute { name } => write!(f, "route '{name}' registered twice"),
            RoutingError::InvalidPath { path, reason } => write!(f, "invalid path '{path}': {reason}"),
            RoutingError::UnsupportedMethod { method } => write!(f, "unsupported HTTP method '{method}'"),
            RoutingError::NoActiveGroup => write!(f, "group-only operation called outside a group context"),
        }
    }
}

impl std::error::Error for RoutingError {}
