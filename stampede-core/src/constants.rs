use std::time::Duration;

/// Base URL used when neither the config nor the environment provides one.
pub const DEFAULT_BASE_URL: &str = "http://host.docker.internal:3000";

/// The default pause between two iterations of a virtual user.
pub const DEFAULT_THINK_TIME: Duration = Duration::from_secs(1);

/// The default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub const SIGNUP_PATH: &str = "signup";

/// Status the signup endpoint answers with when a user was created.
pub const STATUS_CREATED: u16 = 201;

/// Status the health check must answer with before a run may start.
pub const STATUS_HEALTHY: u16 = 200;
