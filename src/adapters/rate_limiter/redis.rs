//! Redis-backed rate limit store for multi-process deployments.
//!
//! Each algorithm runs as a Lua script so that reading, deciding and
//! writing a key's state is a single atomic step on the server. Time is
//! the caller's wall clock in milliseconds, so every process sharing the
//! store must keep its clock reasonably in sync.
//!
//! Every script replies with `[allowed, remaining, retry_after_ms,
//! reset_after_ms]`. A cost of zero evaluates without writing.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::clock::SystemClock;
use crate::domain::rate_limit::{QuotaDecision, RateLimitAlgorithm};
use crate::ports::{Clock, RateLimitStore, StoreError};

const TOKEN_BUCKET: &str = r"
local now = tonumber(ARGV[1])
local capacity = tonumber(ARGV[2])
local rate = tonumber(ARGV[3])
local cost = tonumber(ARGV[4])
local ttl = tonumber(ARGV[5])

local state = redis.call('HMGET', KEYS[1], 'tokens', 'ts')
local tokens = tonumber(state[1])
local last = tonumber(state[2])
if tokens == nil or last == nil then
  tokens = capacity
  last = now
end

local elapsed = math.max(now - last, 0) / 1000
tokens = math.min(capacity, tokens + elapsed * rate)
last = math.max(last, now)

local allowed = 0
if tokens >= cost then
  allowed = 1
  tokens = tokens - cost
end
if cost > 0 then
  redis.call('HSET', KEYS[1], 'tokens', tostring(tokens), 'ts', tostring(last))
  redis.call('PEXPIRE', KEYS[1], ttl)
end

local retry = 0
if allowed == 0 then
  retry = math.ceil((cost - tokens) / rate * 1000)
end
local reset = math.ceil((capacity - tokens) / rate * 1000)
return {allowed, math.floor(tokens), retry, reset}
";

const SLIDING_WINDOW: &str = r"
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
local cost = tonumber(ARGV[4])
local ttl = tonumber(ARGV[5])
local member = ARGV[6]
local floor = '(' .. (now - window)

if cost > 0 then
  redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', now - window)
end
local count = redis.call('ZCOUNT', KEYS[1], floor, '+inf')

local allowed = 0
local retry = 0
if count + cost <= limit then
  allowed = 1
  for i = 1, cost do
    redis.call('ZADD', KEYS[1], now, member .. ':' .. i)
  end
  if cost > 0 then
    redis.call('PEXPIRE', KEYS[1], ttl)
  end
  count = count + cost
else
  local index = count + cost - limit - 1
  local entry = redis.call('ZRANGEBYSCORE', KEYS[1], floor, '+inf', 'WITHSCORES', 'LIMIT', index, 1)
  if entry[2] then
    retry = math.ceil(tonumber(entry[2]) + window - now)
  else
    retry = window
  end
end

local reset = 0
local newest = redis.call('ZREVRANGEBYSCORE', KEYS[1], '+inf', floor, 'WITHSCORES', 'LIMIT', 0, 1)
if newest[2] then
  reset = math.ceil(tonumber(newest[2]) + window - now)
end
return {allowed, math.max(limit - count, 0), retry, reset}
";

const FIXED_WINDOW: &str = r"
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
local cost = tonumber(ARGV[4])
local ttl = tonumber(ARGV[5])

local index = math.floor(now / window)
local state = redis.call('HMGET', KEYS[1], 'window', 'count')
local current = tonumber(state[1])
local count = tonumber(state[2]) or 0
if current == nil or index > current then
  current = index
  count = 0
end

local allowed = 0
if count + cost <= limit then
  allowed = 1
  count = count + cost
end
if cost > 0 then
  redis.call('HSET', KEYS[1], 'window', current, 'count', count)
  redis.call('PEXPIRE', KEYS[1], ttl)
end

local reset = math.min((current + 1) * window - now, window)
local retry = 0
if allowed == 0 then
  retry = reset
end
return {allowed, math.max(limit - count, 0), retry, reset}
";

const LEAKY_BUCKET: &str = r"
local now = tonumber(ARGV[1])
local capacity = tonumber(ARGV[2])
local rate = tonumber(ARGV[3])
local cost = tonumber(ARGV[4])
local ttl = tonumber(ARGV[5])

local state = redis.call('HMGET', KEYS[1], 'level', 'ts')
local level = tonumber(state[1]) or 0
local last = tonumber(state[2]) or now

local elapsed = math.max(now - last, 0) / 1000
level = math.max(0, level - elapsed * rate)
last = math.max(last, now)

local allowed = 0
local retry = 0
if level + cost <= capacity then
  allowed = 1
  level = level + cost
else
  retry = math.ceil((level + cost - capacity) / rate * 1000)
end
if cost > 0 then
  redis.call('HSET', KEYS[1], 'level', tostring(level), 'ts', tostring(last))
  redis.call('PEXPIRE', KEYS[1], ttl)
end

local reset = math.ceil(level / rate * 1000)
return {allowed, math.floor(math.max(capacity - level, 0)), retry, reset}
";

/// `RateLimitStore` shared between processes through Redis.
pub struct RedisRateLimitStore {
    conn: MultiplexedConnection,
    clock: Arc<dyn Clock>,
    token_bucket: Script,
    sliding_window: Script,
    fixed_window: Script,
    leaky_bucket: Script,
}

impl RedisRateLimitStore {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self::with_clock(conn, Arc::new(SystemClock))
    }

    pub fn with_clock(conn: MultiplexedConnection, clock: Arc<dyn Clock>) -> Self {
        Self {
            conn,
            clock,
            token_bucket: Script::new(TOKEN_BUCKET),
            sliding_window: Script::new(SLIDING_WINDOW),
            fixed_window: Script::new(FIXED_WINDOW),
            leaky_bucket: Script::new(LEAKY_BUCKET),
        }
    }

    /// Opens a multiplexed connection to `url`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(backend)?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(backend)?;
        Ok(Self::new(conn))
    }

    async fn run(
        &self,
        key: &str,
        algorithm: &RateLimitAlgorithm,
        cost: u32,
    ) -> Result<QuotaDecision, StoreError> {
        let now_ms = self.clock.wall_time().as_unix_millis();
        let ttl_ms = algorithm.idle_ttl().as_millis() as u64;
        let mut conn = self.conn.clone();

        let reply: Vec<i64> = match algorithm {
            RateLimitAlgorithm::TokenBucket {
                capacity,
                refill_per_sec,
            } => {
                self.token_bucket
                    .key(key)
                    .arg(now_ms)
                    .arg(*capacity)
                    .arg(*refill_per_sec)
                    .arg(cost)
                    .arg(ttl_ms)
                    .invoke_async(&mut conn)
                    .await
            }
            RateLimitAlgorithm::SlidingWindow { limit, window_secs } => {
                self.sliding_window
                    .key(key)
                    .arg(now_ms)
                    .arg(millis(*window_secs))
                    .arg(*limit)
                    .arg(cost)
                    .arg(ttl_ms)
                    .arg(uuid::Uuid::new_v4().to_string())
                    .invoke_async(&mut conn)
                    .await
            }
            RateLimitAlgorithm::FixedWindow { limit, window_secs } => {
                self.fixed_window
                    .key(key)
                    .arg(now_ms)
                    .arg(millis(*window_secs))
                    .arg(*limit)
                    .arg(cost)
                    .arg(ttl_ms)
                    .invoke_async(&mut conn)
                    .await
            }
            RateLimitAlgorithm::LeakyBucket {
                capacity,
                leak_per_sec,
            } => {
                self.leaky_bucket
                    .key(key)
                    .arg(now_ms)
                    .arg(*capacity)
                    .arg(*leak_per_sec)
                    .arg(cost)
                    .arg(ttl_ms)
                    .invoke_async(&mut conn)
                    .await
            }
        }
        .map_err(backend)?;

        decode(algorithm, &reply)
    }
}

fn millis(secs: f64) -> u64 {
    (secs * 1000.0).ceil().max(1.0) as u64
}

fn backend(err: redis::RedisError) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn decode(algorithm: &RateLimitAlgorithm, reply: &[i64]) -> Result<QuotaDecision, StoreError> {
    let [allowed, remaining, retry_ms, reset_ms] = reply else {
        return Err(StoreError::Script(format!(
            "expected 4 values from {} script, got {}",
            algorithm.name(),
            reply.len()
        )));
    };
    let to_duration = |ms: i64| Duration::from_millis(u64::try_from(ms).unwrap_or(0));
    Ok(QuotaDecision {
        allowed: *allowed == 1,
        limit: algorithm.limit(),
        remaining: u32::try_from(*remaining).unwrap_or(0),
        retry_after: to_duration(*retry_ms),
        reset_after: to_duration(*reset_ms),
    })
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn get_and_update(
        &self,
        key: &str,
        algorithm: &RateLimitAlgorithm,
        cost: u32,
    ) -> Result<QuotaDecision, StoreError> {
        self.run(key, algorithm, cost).await
    }

    async fn peek(
        &self,
        key: &str,
        algorithm: &RateLimitAlgorithm,
    ) -> Result<QuotaDecision, StoreError> {
        self.run(key, algorithm, 0).await
    }

    async fn clear(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(backend)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

impl std::fmt::Debug for RedisRateLimitStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRateLimitStore")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
