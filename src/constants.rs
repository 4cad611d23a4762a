// Application Constants
// Centralized constants to avoid magic numbers

/// Default server configuration
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
pub const DEFAULT_SERVER_PORT: u16 = 4000;

/// Database connection defaults
pub const DEFAULT_DATABASE_PORT: u16 = 1433;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 20;
pub const DEFAULT_MIN_CONNECTIONS: u32 = 5;
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 10;

/// Stock movement defaults applied at the service boundary when the
/// caller does not supply them
pub const DEFAULT_ORIGEN_SALIDA: &str = "DEPOSITO";
pub const DEFAULT_OBSERVACION_SALIDA: &str = "Salida de stock desde app";

/// Movement type written by the depletion engine
pub const TIPO_MOVIMIENTO_SALIDA: &str = "SALIDA";

/// Product text search result cap
pub const MAX_SEARCH_RESULTS: i32 = 20;

/// Pool monitoring interval
pub const POOL_MONITOR_INTERVAL_SECS: u64 = 60;
pub const POOL_HIGH_USAGE_THRESHOLD: f64 = 80.0;
pub const POOL_ELEVATED_USAGE_THRESHOLD: f64 = 70.0;
