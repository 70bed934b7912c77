use std::time::Duration;

use env_flags::env_flags;

env_flags! {
    pub PARLOR_SERVER_URL: &str = "http://127.0.0.1:8000";
    pub PARLOR_API_VERSION: &str = "v2";

    /// Fixed delay between a push channel drop and the next connection attempt.
    pub PARLOR_RECONNECT_DELAY_MS: Duration = Duration::from_millis(1_000), |value| {
        value.parse().map(Duration::from_millis)
    };

    /// Overrides `~/.parlor` as the home for config and logs.
    pub PARLOR_HOME: Option<&str> = None;
}
