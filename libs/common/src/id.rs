use ulid::Ulid;

/// Generates a new ULID-based ID with the given prefix.
///
/// # Examples
/// ```
/// let id = gardenia_common::id::prefixed_ulid("conn");
/// assert!(id.starts_with("conn_"));
/// ```
pub fn prefixed_ulid(prefix: &str) -> String {
    format!("{}_{}", prefix, Ulid::new())
}

/// Well-known ID prefixes.
pub mod prefix {
    /// A single WebSocket connection to a brawl room.
    pub const CONNECTION: &str = "conn";
}

/// Generates a fresh connection ID (`conn_` prefixed ULID).
pub fn connection_id() -> String {
    prefixed_ulid(prefix::CONNECTION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_format() {
        let id = connection_id();
        assert!(id.starts_with("conn_"));
        // ULID is 26 chars, plus prefix + underscore
        assert_eq!(id.len(), 5 + 26);
    }

    #[test]
    fn test_uniqueness() {
        let a = connection_id();
        let b = connection_id();
        assert_ne!(a, b);
    }
}
