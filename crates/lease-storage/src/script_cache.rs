//! Per-name script SHA cache with NOSCRIPT recovery.
//!
//! Mirrors the original `LeaseScript` helper: loads each named script once,
//! remembers its SHA, and transparently reloads on `NOSCRIPT` so a Redis
//! restart or `SCRIPT FLUSH` never surfaces as an error to callers.

use dashmap::DashMap;
use redis::aio::ConnectionLike;
use redis::Value;
use tracing::debug;

use crate::StorageError;
use crate::scripts;

/// Process-wide map of script name to its loaded SHA1 digest.
///
/// Reads are lock-free; writes ([`DashMap::insert`]) only contend with other
/// writers reloading the same script, and `SCRIPT LOAD` is idempotent so a
/// redundant reload from a concurrent caller is harmless.
#[derive(Debug, Default)]
pub struct ScriptCache {
    shas: DashMap<&'static str, String>,
}

impl ScriptCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute the named script, loading and caching it as needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnknownScript`] if `name` has no known source,
    /// [`StorageError::InvalidArgument`] if the script rejects its arguments,
    /// or [`StorageError::Redis`] if the connection or the script itself
    /// fails for any other reason.
    pub async fn exec<C>(
        &self,
        conn: &mut C,
        name: &'static str,
        keys: &[&str],
        args: &[String],
    ) -> Result<Value, StorageError>
    where
        C: ConnectionLike + Send,
    {
        let source = scripts::source(name).ok_or(StorageError::UnknownScript(name))?;

        let sha = self.sha_for(conn, name, source).await?;
        match self.evalsha(conn, &sha, keys, args).await {
            Ok(v) => Ok(v),
            Err(e) if is_noscript(&e) => {
                debug!(script = name, "NOSCRIPT on evalsha, reloading");
                let sha = self.load(conn, name, source).await?;
                self.evalsha(conn, &sha, keys, args)
                    .await
                    .map_err(|e| to_storage_error(name, e))
            }
            Err(e) => Err(to_storage_error(name, e)),
        }
    }

    async fn sha_for<C>(
        &self,
        conn: &mut C,
        name: &'static str,
        source: &'static str,
    ) -> Result<String, StorageError>
    where
        C: ConnectionLike + Send,
    {
        if let Some(sha) = self.shas.get(name) {
            return Ok(sha.clone());
        }
        self.load(conn, name, source).await
    }

    async fn load<C>(
        &self,
        conn: &mut C,
        name: &'static str,
        source: &'static str,
    ) -> Result<String, StorageError>
    where
        C: ConnectionLike + Send,
    {
        debug!(script = name, "loading script");
        let sha: String = redis::cmd("SCRIPT")
            .arg("LOAD")
            .arg(source)
            .query_async(conn)
            .await?;
        self.shas.insert(name, sha.clone());
        Ok(sha)
    }

    async fn evalsha<C>(
        &self,
        conn: &mut C,
        sha: &str,
        keys: &[&str],
        args: &[String],
    ) -> Result<Value, redis::RedisError>
    where
        C: ConnectionLike + Send,
    {
        let mut cmd = redis::cmd("EVALSHA");
        cmd.arg(sha).arg(keys.len());
        for k in keys {
            cmd.arg(*k);
        }
        for a in args {
            cmd.arg(a);
        }
        cmd.query_async(conn).await
    }
}

fn is_noscript(err: &redis::RedisError) -> bool {
    err.code() == Some("NOSCRIPT")
}

fn is_invalid_argument(err: &redis::RedisError) -> bool {
    matches!(err.code(), Some("INVALID_ARGUMENT" | "ILLEGAL_ARGUMENTS"))
}

fn to_storage_error(name: &'static str, err: redis::RedisError) -> StorageError {
    if is_invalid_argument(&err) {
        StorageError::InvalidArgument { script: name, message: err.to_string() }
    } else {
        StorageError::Redis(err)
    }
}
