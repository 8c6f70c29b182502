use std::time::Duration;

/// What happens to a started room once its last member disconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainPolicy {
    /// Delete the room as soon as it is empty.
    Remove,
    /// Keep the room until the sweeper finds it empty for longer than
    /// `RoomSettings::empty_room_ttl`.
    Linger,
}

/// How a room's relay queue behaves when it is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// The producing connection waits until the relay task frees a slot.
    Block,
    /// The oldest queued payload is discarded to make room.
    DropOldest,
    /// The new payload is refused.
    Reject,
}

/// Room and relay tuning, shared by every room in the process.
#[derive(Debug, Clone)]
pub struct RoomSettings {
    /// Maximum concurrent members per room.
    pub capacity: usize,
    /// Bounded size of each room's relay queue.
    pub relay_queue_capacity: usize,
    pub overflow: OverflowPolicy,
    pub drain: DrainPolicy,
    /// Only used with `DrainPolicy::Linger`.
    pub empty_room_ttl: Duration,
    /// Close connections that send nothing for this long. `None` disables it.
    pub idle_timeout: Option<Duration>,
    /// Reject joins whose `uid` is unknown to the user directory.
    pub require_known_users: bool,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            capacity: 3,
            relay_queue_capacity: 1000,
            overflow: OverflowPolicy::Block,
            drain: DrainPolicy::Remove,
            empty_room_ttl: Duration::from_secs(5 * 60),
            idle_timeout: None,
            require_known_users: true,
        }
    }
}

/// Brawl API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string (users and settings).
    pub database_url: String,
    /// Redis connection string for the name cache. In-memory cache when unset.
    pub redis_url: Option<String>,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// How long a resolved display name stays cached.
    pub name_cache_ttl_secs: u64,
    pub rooms: RoomSettings,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing or
    /// a policy variable has an unknown value.
    pub fn from_env() -> Self {
        let defaults = RoomSettings::default();

        let rooms = RoomSettings {
            capacity: parsed_var("ROOM_CAPACITY").unwrap_or(defaults.capacity),
            relay_queue_capacity: parsed_var("RELAY_QUEUE_CAPACITY")
                .unwrap_or(defaults.relay_queue_capacity),
            overflow: optional_var("RELAY_OVERFLOW")
                .map(|v| parse_overflow(&v))
                .unwrap_or(defaults.overflow),
            drain: optional_var("ROOM_DRAIN_POLICY")
                .map(|v| parse_drain(&v))
                .unwrap_or(defaults.drain),
            empty_room_ttl: parsed_var("EMPTY_ROOM_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.empty_room_ttl),
            idle_timeout: parsed_var("IDLE_TIMEOUT_SECS").map(Duration::from_secs),
            require_known_users: optional_var("REQUIRE_KNOWN_USERS")
                .map(|v| parse_flag("REQUIRE_KNOWN_USERS", &v))
                .unwrap_or(defaults.require_known_users),
        };

        Self {
            database_url: required_var("DATABASE_URL"),
            redis_url: optional_var("REDIS_URL"),
            port: parsed_var("PORT").unwrap_or(8080),
            name_cache_ttl_secs: parsed_var("NAME_CACHE_TTL_SECS").unwrap_or(72 * 60 * 60),
            rooms,
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    optional_var(name).and_then(|v| v.parse().ok())
}

fn parse_overflow(value: &str) -> OverflowPolicy {
    match value {
        "block" => OverflowPolicy::Block,
        "drop_oldest" => OverflowPolicy::DropOldest,
        "reject" => OverflowPolicy::Reject,
        other => panic!("RELAY_OVERFLOW must be block, drop_oldest or reject (got {other})"),
    }
}

fn parse_drain(value: &str) -> DrainPolicy {
    match value {
        "remove" => DrainPolicy::Remove,
        "linger" => DrainPolicy::Linger,
        other => panic!("ROOM_DRAIN_POLICY must be remove or linger (got {other})"),
    }
}

fn parse_flag(name: &str, value: &str) -> bool {
    match value {
        "true" | "1" => true,
        "false" | "0" => false,
        other => panic!("{name} must be true or false (got {other})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_defaults_match_brawl_rules() {
        let settings = RoomSettings::default();
        assert_eq!(settings.capacity, 3);
        assert_eq!(settings.relay_queue_capacity, 1000);
        assert_eq!(settings.overflow, OverflowPolicy::Block);
        assert_eq!(settings.drain, DrainPolicy::Remove);
        assert!(settings.idle_timeout.is_none());
    }

    #[test]
    fn policy_names_parse() {
        assert_eq!(parse_overflow("drop_oldest"), OverflowPolicy::DropOldest);
        assert_eq!(parse_overflow("reject"), OverflowPolicy::Reject);
        assert_eq!(parse_drain("linger"), DrainPolicy::Linger);
    }

    #[test]
    #[should_panic(expected = "RELAY_OVERFLOW")]
    fn unknown_overflow_policy_panics() {
        parse_overflow("spill");
    }

    #[test]
    fn flags_parse_strictly() {
        assert!(parse_flag("REQUIRE_KNOWN_USERS", "true"));
        assert!(parse_flag("REQUIRE_KNOWN_USERS", "1"));
        assert!(!parse_flag("REQUIRE_KNOWN_USERS", "false"));
        assert!(!parse_flag("REQUIRE_KNOWN_USERS", "0"));
    }

    #[test]
    #[should_panic(expected = "REQUIRE_KNOWN_USERS")]
    fn unknown_flag_value_panics() {
        parse_flag("REQUIRE_KNOWN_USERS", "no");
    }
}
