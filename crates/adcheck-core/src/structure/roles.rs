//! Container roles, inferred from image names.

use std::fmt;

/// What a container is for, as far as the structure rules care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerRole {
    /// The service players attack and defend. Held to the strictest rules.
    Service,
    Database,
    Proxy,
    /// Periodic data cleaner shipped alongside the service.
    Cleaner,
}

impl fmt::Display for ContainerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerRole::Service => write!(f, "service"),
            ContainerRole::Database => write!(f, "database"),
            ContainerRole::Proxy => write!(f, "proxy"),
            ContainerRole::Cleaner => write!(f, "cleaner"),
        }
    }
}

/// Keyword table, evaluated in order. The first role with a keyword
/// contained in the image name wins.
pub const ROLE_KEYWORDS: &[(ContainerRole, &[&str])] = &[
    (
        ContainerRole::Database,
        &[
            "redis",
            "postgres",
            "mysql",
            "mariadb",
            "mongo",
            "mssql",
            "clickhouse",
            "tarantool",
        ],
    ),
    (ContainerRole::Proxy, &["nginx", "envoy"]),
    (ContainerRole::Cleaner, &["dedcleaner"]),
];

/// Classify an image by substring match. Unmatched images are services.
pub fn classify(image: &str) -> ContainerRole {
    ROLE_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| image.contains(k)))
        .map(|(role, _)| *role)
        .unwrap_or(ContainerRole::Service)
}
