//! Fetch-or-create synchronization of a single remote post into local
//! storage.
//!
//! The flow is linear: resolve the blog, fetch the remote snapshot, then
//! reconcile inside one write transaction. Live rows never leave their
//! transaction; callers get back a [`PostRef`] they can re-resolve later
//! from any context.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{instrument, warn};

use crate::db::{self, Pool};
use crate::model::{Post, PostKind};
use crate::remote::{PostFailure, PostServiceRemoteFactory, PostSuccess};
use crate::remote::model::RemotePost;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PostRepositoryError {
    /// The remote service explicitly reported that no such post exists.
    #[error("post not found")]
    PostNotFound,
    /// Blog resolution failed, no remote client could be constructed, or the
    /// remote call failed without a more specific classification.
    #[error("unknown post sync error")]
    Unknown,
}

/// Opaque, session-independent reference to a reconciled local post row.
/// Two references to the same row with the same kind compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PostRef {
    pub kind: PostKind,
    pub row_id: i64,
}

impl PostRef {
    /// Re-resolve the reference. Returns `Ok(None)` when the row was
    /// deleted after the reference was produced.
    pub async fn resolve(&self, pool: &Pool) -> Result<Option<Post>> {
        db::find_post(pool, self.row_id).await
    }
}

type SyncKey = (i64, i64);

pub struct PostRepository {
    pool: Pool,
    factory: Arc<dyn PostServiceRemoteFactory>,
    // Per-(blog, remote post id) locks so racing syncs of the same pair
    // cannot both observe "not found" and create duplicate rows. Entries
    // are never reclaimed; the key space is the set of synced posts.
    sync_locks: Mutex<HashMap<SyncKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl PostRepository {
    pub fn new(pool: Pool, factory: Arc<dyn PostServiceRemoteFactory>) -> Self {
        Self {
            pool,
            factory,
            sync_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Sync a specific post from the API.
    ///
    /// Looks up the blog locally, fetches the remote representation, and
    /// reconciles it against local storage: an existing row for
    /// (blog, remote id) is reused, otherwise a new row is created with the
    /// variant the remote `type` discriminator names. Returns a stable
    /// reference to the stored row.
    #[instrument(skip(self))]
    pub async fn get_post(&self, post_id: i64, blog_id: i64) -> Result<PostRef> {
        let _guard = self.lock_pair(blog_id, post_id).await;

        // Read step. No transaction is held across the network call.
        let blog = db::find_blog(&self.pool, blog_id)
            .await?
            .ok_or(PostRepositoryError::Unknown)?;
        let remote = self.factory.for_blog(&blog).map_err(|err| {
            warn!(?err, blog_id, "failed to construct remote client");
            PostRepositoryError::Unknown
        })?;

        let remote_post = fetch_bridged(|success, failure| {
            remote.get_post_with_id(post_id, success, failure)
        })
        .await?;
        let Some(remote_post) = remote_post else {
            return Err(PostRepositoryError::PostNotFound.into());
        };

        // Write step. The blog is re-resolved: rows from the read step are
        // not valid in this transaction.
        let mut tx = self.pool.begin().await?;
        let blog = db::find_blog_tx(&mut tx, blog_id)
            .await?
            .ok_or(PostRepositoryError::Unknown)?;

        let (row_id, kind) = match db::lookup_post_tx(&mut tx, blog.id, post_id).await? {
            Some(existing) => existing,
            None => {
                let kind = PostKind::parse_kind(&remote_post.post_type);
                let row_id = db::insert_post_tx(&mut tx, blog.id, post_id, kind).await?;
                (row_id, kind)
            }
        };
        db::apply_post_fields_tx(&mut tx, row_id, &remote_post.to_fields()).await?;
        tx.commit().await?;

        Ok(PostRef { kind, row_id })
    }

    async fn lock_pair(&self, blog_id: i64, post_id: i64) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.sync_locks.lock().expect("sync lock map poisoned");
            map.entry((blog_id, post_id))
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Bridge the paired success/failure callbacks into a single await that
/// resumes exactly once.
///
/// The first callback to fire wins; a second invocation finds the channel
/// sender already taken and is a no-op. A failure callback carrying no error,
/// or a service that drops both callbacks without calling either, resolves
/// to [`PostRepositoryError::Unknown`] instead of hanging.
async fn fetch_bridged<F>(start: F) -> Result<Option<RemotePost>>
where
    F: FnOnce(PostSuccess, PostFailure),
{
    let (tx, rx) = oneshot::channel::<Result<Option<RemotePost>>>();
    let slot = Arc::new(Mutex::new(Some(tx)));

    let success_slot = Arc::clone(&slot);
    let success: PostSuccess = Box::new(move |post| {
        if let Ok(mut guard) = success_slot.lock() {
            if let Some(tx) = guard.take() {
                let _ = tx.send(Ok(post));
            }
        }
    });
    let failure: PostFailure = Box::new(move |err| {
        if let Ok(mut guard) = slot.lock() {
            if let Some(tx) = guard.take() {
                let _ = tx.send(Err(
                    err.unwrap_or_else(|| PostRepositoryError::Unknown.into())
                ));
            }
        }
    });

    start(success, failure);
    match rx.await {
        Ok(result) => result,
        // Both callbacks were dropped without firing.
        Err(_) => Err(PostRepositoryError::Unknown.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[tokio::test]
    async fn bridge_resolves_success() {
        let post: RemotePost = serde_json::from_str(r#"{"ID": 3, "type": "post"}"#).unwrap();
        let result = fetch_bridged(|success, _failure| success(Some(post))).await;
        assert_eq!(result.unwrap().unwrap().id, 3);
    }

    #[tokio::test]
    async fn bridge_resolves_explicit_failure() {
        let result = fetch_bridged(|_success, failure| failure(Some(anyhow!("boom")))).await;
        assert!(result.unwrap_err().to_string().contains("boom"));
    }

    #[tokio::test]
    async fn bridge_synthesizes_unknown_for_empty_failure() {
        let result = fetch_bridged(|_success, failure| failure(None)).await;
        let err = result.unwrap_err();
        assert_eq!(
            err.downcast_ref::<PostRepositoryError>(),
            Some(&PostRepositoryError::Unknown)
        );
    }

    #[tokio::test]
    async fn bridge_completes_when_no_callback_fires() {
        let result = fetch_bridged(|success, failure| {
            drop(success);
            drop(failure);
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(
            err.downcast_ref::<PostRepositoryError>(),
            Some(&PostRepositoryError::Unknown)
        );
    }

    #[tokio::test]
    async fn bridge_ignores_double_resume() {
        let result = fetch_bridged(|success, failure| {
            success(None);
            failure(Some(anyhow!("late failure")));
        })
        .await;
        // First resume wins; the late failure is dropped.
        assert!(result.unwrap().is_none());
    }
}
