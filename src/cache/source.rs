//! Source Module
//!
//! Contracts for the system of record a cache is placed in front of.

use std::marker::PhantomData;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::SourceError;

// == Source ==
/// Blocking backing source.
///
/// `get` must return [`SourceError::NotFound`] for keys the source does not
/// have, so callers can tell absence apart from failure.
pub trait Source<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Result<V, SourceError>;

    fn set(&self, key: &K, value: &V) -> Result<(), SourceError>;

    fn delete(&self, key: &K) -> Result<(), SourceError>;
}

// == Context Source ==
/// Async backing source that receives the caller's cancellation token.
///
/// Honouring cancellation is up to the implementation; the cache waits for as
/// long as the returned future runs.
#[async_trait]
pub trait ContextSource<K, V>: Send + Sync
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    async fn get(&self, ctx: &CancellationToken, key: &K) -> Result<V, SourceError>;

    async fn set(&self, ctx: &CancellationToken, key: &K, value: &V) -> Result<(), SourceError>;

    async fn delete(&self, ctx: &CancellationToken, key: &K) -> Result<(), SourceError>;
}

// == Sync Adapter ==
/// Runs a blocking [`Source`] behind the [`ContextSource`] contract.
///
/// The cancellation token is ignored.
#[derive(Debug, Clone)]
pub struct SyncSource<S>(pub S);

#[async_trait]
impl<K, V, S> ContextSource<K, V> for SyncSource<S>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
    S: Source<K, V>,
{
    async fn get(&self, _ctx: &CancellationToken, key: &K) -> Result<V, SourceError> {
        self.0.get(key)
    }

    async fn set(&self, _ctx: &CancellationToken, key: &K, value: &V) -> Result<(), SourceError> {
        self.0.set(key, value)
    }

    async fn delete(&self, _ctx: &CancellationToken, key: &K) -> Result<(), SourceError> {
        self.0.delete(key)
    }
}

// == Empty Sources ==
/// Source with nothing in it: every get is `NotFound`, writes succeed.
#[derive(Debug)]
pub struct EmptySource<K, V>(PhantomData<fn(K) -> V>);

impl<K, V> Default for EmptySource<K, V> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

impl<K, V> Source<K, V> for EmptySource<K, V> {
    fn get(&self, _key: &K) -> Result<V, SourceError> {
        Err(SourceError::NotFound)
    }

    fn set(&self, _key: &K, _value: &V) -> Result<(), SourceError> {
        Ok(())
    }

    fn delete(&self, _key: &K) -> Result<(), SourceError> {
        Ok(())
    }
}

/// Cancellation-aware counterpart of [`EmptySource`].
#[derive(Debug)]
pub struct EmptyContextSource<K, V>(PhantomData<fn(K) -> V>);

impl<K, V> Default for EmptyContextSource<K, V> {
    fn default() -> Self {
        Self(PhantomData)
    }
}

#[async_trait]
impl<K, V> ContextSource<K, V> for EmptyContextSource<K, V>
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    async fn get(&self, _ctx: &CancellationToken, _key: &K) -> Result<V, SourceError> {
        Err(SourceError::NotFound)
    }

    async fn set(&self, _ctx: &CancellationToken, _key: &K, _value: &V) -> Result<(), SourceError> {
        Ok(())
    }

    async fn delete(&self, _ctx: &CancellationToken, _key: &K) -> Result<(), SourceError> {
        Ok(())
    }
}
