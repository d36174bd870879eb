//! Environment-tunable constants, read once and cached.
use once_cell::sync::Lazy;

/// Lazily parses an environment variable into a type, falling back to a
/// default if unset or unparsable.
macro_rules! lazy_env_parse {
	($key:expr, $t:ty, $default:expr) => {
		once_cell::sync::Lazy::new(|| {
			std::env::var($key).ok().and_then(|s| s.parse::<$t>().ok()).unwrap_or($default)
		})
	};
}

/// Number of worker tasks started per statement when the statement does not
/// pin its own `tasks` count. Defaults to twice the logical CPU count.
pub static WORKER_COUNT: Lazy<usize> =
	lazy_env_parse!("QUERY_WORKER_COUNT", usize, num_cpus::get() * 2);

/// The maximum recursion depth for nested event/subquery execution.
pub static MAX_RECURSIVE_QUERIES: Lazy<u32> =
	lazy_env_parse!("QUERY_MAX_RECURSIVE_QUERIES", u32, 50);


/// Chunk size used when range-scanning a table target.
pub const TABLE_SCAN_CHUNK_SIZE: u32 = 1000;

/// Length of generated record ids for model targets (`|tb:N|`).
pub const GENERATED_ID_LENGTH: usize = 20;

/// Characters used when generating random record ids.
pub const ID_CHARS: [char; 36] = [
	'0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
	'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];
