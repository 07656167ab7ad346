/// Fewest stops a route request may carry
pub const MIN_STOPS: usize = 2;

/// Most stops a route request may carry
pub const MAX_STOPS: usize = 100;

pub const DEFAULT_SOLVER_TIME_LIMIT_SECONDS: u32 = 30;

pub const DEFAULT_GEOCODING_CACHE_SIZE: usize = 10_000;

pub const DEFAULT_GEOCODING_CACHE_TTL_DAYS: u64 = 30;

/// Nominatim usage policy allows one request per second
pub const DEFAULT_GEOCODING_RATE_LIMIT_MS: u64 = 1000;

pub const DEFAULT_OSRM_URL: &str = "http://router.project-osrm.org";

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

pub const USER_AGENT: &str = "routeopt/0.2 (last-mile route optimizer)";

pub const DEFAULT_HOST: &str = "0.0.0.0";

pub const DEFAULT_PORT: u16 = 8000;

/// Local frontend dev servers
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

pub const DEFAULT_OSRM_PROFILE: &str = "driving";

pub const DEFAULT_ROUTING_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_GEOCODING_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

pub const DEFAULT_SOLVER_MAX_GENERATIONS: usize = 3000;

pub const DEFAULT_LOGS_DIR: &str = "logs";
