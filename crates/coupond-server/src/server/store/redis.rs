//! Redis-backed [`CounterStore`].
//!
//! The remaining counter is decremented by a Lua script evaluated atomically
//! on the counter key, which makes the reservation the single linearization
//! point for a campaign's cap. The activation index is one global sorted set
//! keyed by activation time in epoch seconds.

use async_trait::async_trait;
use coupond_core::{Error, Result};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use uuid::Uuid;

use super::{CounterStore, Reservation};

const ACTIVATION_INDEX_KEY: &str = "campaign:activation:";
const COUNTER_KEY_PREFIX: &str = "campaign:counter:";

/// Claims one unit, or reports exhaustion (-1) / the final unit (-2).
const RESERVE_SCRIPT: &str = r"
local current = redis.call('GET', KEYS[1])
if not current or tonumber(current) <= 0 then
    return -1
end
local new_value = redis.call('DECR', KEYS[1])
if new_value == 0 then
    return -2
end
return new_value
";

/// [`CounterStore`] implementation over a multiplexed Redis connection.
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: ConnectionManager,
    reserve_script: Script,
}

impl RedisCounterStore {
    /// Connects to Redis and prepares the reservation script.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(Error::counter)?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(Error::counter)?;

        Ok(Self {
            conn,
            reserve_script: Script::new(RESERVE_SCRIPT),
        })
    }

    fn counter_key(campaign_id: Uuid) -> String {
        format!("{COUNTER_KEY_PREFIX}{campaign_id}")
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn init_counter(&self, campaign_id: Uuid, limit: i32) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(Self::counter_key(campaign_id), limit)
            .await
            .map_err(Error::counter)?;
        Ok(())
    }

    async fn reserve(&self, campaign_id: Uuid) -> Result<Reservation> {
        let mut conn = self.conn.clone();
        let value: i64 = self
            .reserve_script
            .key(Self::counter_key(campaign_id))
            .invoke_async(&mut conn)
            .await
            .map_err(Error::counter)?;

        Ok(match value {
            -1 => Reservation::Exhausted,
            -2 => Reservation::Last,
            remaining => Reservation::Remaining(remaining),
        })
    }

    async fn release(&self, campaign_id: Uuid) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .incr(Self::counter_key(campaign_id), 1)
            .await
            .map_err(Error::counter)?;
        Ok(())
    }

    async fn schedule_activation(&self, campaign_id: Uuid, at_epoch_secs: i64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .zadd(ACTIVATION_INDEX_KEY, campaign_id.to_string(), at_epoch_secs)
            .await
            .map_err(Error::counter)?;
        Ok(())
    }

    async fn due_activations(&self, now_epoch_secs: i64) -> Result<Vec<Uuid>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn
            .zrangebyscore(ACTIVATION_INDEX_KEY, 0, now_epoch_secs)
            .await
            .map_err(Error::counter)?;

        Ok(members
            .into_iter()
            .filter_map(|member| match member.parse::<Uuid>() {
                Ok(id) => Some(id),
                Err(err) => {
                    tracing::warn!(%member, %err, "skipping malformed activation index member");
                    None
                }
            })
            .collect())
    }

    async fn remove_activation(&self, campaign_id: Uuid) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .zrem(ACTIVATION_INDEX_KEY, campaign_id.to_string())
            .await
            .map_err(Error::counter)?;
        Ok(())
    }
}
