use crate::error::{Result, VerseError};
use crate::rate_limiter::WindowStore;
use redis::{Client, Connection, RedisResult};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Fixed-window admission, atomically on the server.
///
/// KEYS[1] = window key, ARGV[1] = limit, ARGV[2] = window length in ms.
/// Returns 1 when admitted, 0 when rejected. The key expiring is the window reset.
const ACQUIRE_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if current and tonumber(current) >= tonumber(ARGV[1]) then
    return 0
end
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return 1
"#;

const KEY_PREFIX: &str = "shloka:rate:";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Rate windows shared through Redis, so every instance sees the same counters.
pub struct RedisWindows {
    client: Client,
    connection: Arc<Mutex<Option<Connection>>>,
}

impl RedisWindows {
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| VerseError::Redis(format!("Failed to create Redis client: {}", e)))?;

        Ok(Self {
            client,
            connection: Arc::new(Mutex::new(None)),
        })
    }

    pub fn window_key(identity: &str) -> String {
        format!("{}{}", KEY_PREFIX, identity)
    }

    /// Run `f` on the cached connection, connecting first if needed.
    ///
    /// A failed command drops the connection so the next call reconnects.
    fn with_connection<T>(&self, f: impl FnOnce(&mut Connection) -> RedisResult<T>) -> Result<T> {
        let mut connection_guard = self.connection.lock().map_err(|_| {
            VerseError::Internal("Failed to acquire connection lock".into())
        })?;

        if connection_guard.is_none() {
            let conn = self
                .client
                .get_connection_with_timeout(CONNECT_TIMEOUT)
                .map_err(|e| VerseError::Redis(format!("Failed to connect to Redis: {}", e)))?;
            *connection_guard = Some(conn);
        }

        let conn = connection_guard
            .as_mut()
            .ok_or_else(|| VerseError::Redis("No Redis connection available".into()))?;
        let result = f(conn);
        if result.is_err() {
            *connection_guard = None;
        }
        result.map_err(VerseError::from)
    }

    pub fn ping(&self) -> Result<String> {
        self.with_connection(|conn| redis::cmd("PING").query(conn))
    }
}

impl WindowStore for RedisWindows {
    fn try_acquire(
        &self,
        identity: &str,
        limit: u64,
        window: Duration,
        _now_ms: u64,
    ) -> Result<bool> {
        let key = Self::window_key(identity);
        let admitted: i64 = self.with_connection(|conn| {
            redis::cmd("EVAL")
                .arg(ACQUIRE_SCRIPT)
                .arg(1)
                .arg(&key)
                .arg(limit)
                .arg(window.as_millis() as u64)
                .query(conn)
        })?;
        Ok(admitted == 1)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }

    fn is_blocking(&self) -> bool {
        true
    }
}
