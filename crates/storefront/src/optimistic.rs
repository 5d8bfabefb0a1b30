//! Apply-then-confirm helper for local state.
//!
//! The local view is patched before the request goes out so the shopper sees
//! the change immediately. If the request fails, the patch is not undone by
//! hand: `reconcile` re-fetches authoritative state from the server and
//! overwrites whatever the patch left behind.

use std::fmt::Display;
use std::future::Future;

use parking_lot::Mutex;

/// Patch `state`, await `request`, and on failure await `reconcile`.
///
/// The request's error is returned unchanged. A failing reconcile is logged
/// but never replaces the original error.
///
/// # Errors
///
/// Returns the error produced by `request`.
pub async fn optimistic_mutation<S, T, E, R, Req, Rec, RecFut>(
    state: &Mutex<S>,
    patch: impl FnOnce(&mut S),
    request: Req,
    reconcile: Rec,
) -> Result<T, E>
where
    Req: Future<Output = Result<T, E>>,
    Rec: FnOnce() -> RecFut,
    RecFut: Future<Output = Result<(), R>>,
    E: Display,
    R: Display,
{
    patch(&mut state.lock());

    match request.await {
        Ok(value) => Ok(value),
        Err(err) => {
            tracing::debug!(error = %err, "Optimistic update rejected, reconciling");
            if let Err(reconcile_err) = reconcile().await {
                tracing::warn!(
                    error = %reconcile_err,
                    "Reconcile after failed update also failed"
                );
            }
            Err(err)
        }
    }
}
