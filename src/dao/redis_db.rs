use crate::constants;
use crate::types::error::{Error, Result};
use mobc_redis::{
    mobc::{Connection as PooledConnection, Pool},
    redis,
    redis::{aio::Connection, AsyncCommands, Client},
    RedisConnectionManager,
};

pub type RedisPool = Pool<RedisConnectionManager>;

pub fn create_redis_pool(redis_url: &str) -> Result<RedisPool> {
    let client = Client::open(redis_url)?;
    let manager = RedisConnectionManager::new(client);
    Ok(Pool::builder()
        .max_open(constants::REDIS_POOL_SIZE)
        .build(manager))
}

pub async fn get_conn(pool: &RedisPool) -> Result<PooledConnection<RedisConnectionManager>> {
    pool.get()
        .await
        .map_err(|e| Error::system_error(format!("redis pool: {}", e).as_str()))
}

pub async fn ping(pool: &RedisPool) -> Result<String> {
    let mut conn = get_conn(pool).await?;
    Ok(redis::cmd("PING")
        .query_async(&mut conn as &mut Connection)
        .await?)
}

/// `SET key value PX ttl_ms`
pub async fn set_px(pool: &RedisPool, key: &str, val: &str, ttl_ms: u64) -> Result<()> {
    let mut conn = get_conn(pool).await?;
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(val);
    if ttl_ms > 0 {
        cmd.arg("PX").arg(ttl_ms);
    }
    cmd.query_async::<_, ()>(&mut conn as &mut Connection).await?;
    Ok(())
}

pub async fn get(pool: &RedisPool, key: &str) -> Result<Option<String>> {
    let mut conn = get_conn(pool).await?;
    Ok(conn.get(key).await?)
}

pub async fn pexpire(pool: &RedisPool, key: &str, ttl_ms: u64) -> Result<()> {
    let mut conn = get_conn(pool).await?;
    let _: bool = conn.pexpire(key, ttl_ms as usize).await?;
    Ok(())
}

pub async fn del(pool: &RedisPool, keys: &[String]) -> Result<()> {
    if keys.is_empty() {
        return Ok(());
    }
    let mut conn = get_conn(pool).await?;
    let _: i64 = conn.del(keys).await?;
    Ok(())
}

pub async fn sadd(pool: &RedisPool, set: &str, member: &str) -> Result<()> {
    let mut conn = get_conn(pool).await?;
    let _: i64 = conn.sadd(set, member).await?;
    Ok(())
}

pub async fn srem(pool: &RedisPool, set: &str, members: &[String]) -> Result<()> {
    if members.is_empty() {
        return Ok(());
    }
    let mut conn = get_conn(pool).await?;
    let _: i64 = conn.srem(set, members).await?;
    Ok(())
}

/// One `EXISTS` per key, pipelined, in the order given.
pub async fn exists_each(pool: &RedisPool, keys: &[String]) -> Result<Vec<bool>> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }
    let mut conn = get_conn(pool).await?;
    let mut pipe = redis::pipe();
    for key in keys {
        pipe.exists(key);
    }
    Ok(pipe.query_async(&mut conn as &mut Connection).await?)
}

pub async fn smembers(pool: &RedisPool, set: &str) -> Result<Vec<String>> {
    let mut conn = get_conn(pool).await?;
    Ok(conn.smembers(set).await?)
}
