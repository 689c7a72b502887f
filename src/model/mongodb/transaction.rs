//! Retrying multi-document transactions.
//!
//! A transaction aborts with a `TransientTransactionError` when a concurrent write
//! touches one of its documents first, e.g. a view count `$inc` on the same question.
//! Such attempts are run again from the start, after a short jittered pause.

use std::time::Duration;

use log::warn;
use mongodb::{
    error::{Error as DbError, TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    ClientSession,
};
use rand::Rng;

use crate::error::{Error, Result};

/// How many times a whole transaction is attempted before giving up.
pub const MAX_TRANSACTION_ATTEMPTS: u32 = 10;

/// How many times a commit with an unknown outcome is retried.
const MAX_COMMIT_ATTEMPTS: u32 = 5;

/// Upper bound of the pause before attempt `n + 1`, per attempt so far.
const BACKOFF_STEP_MS: u64 = 10;

/// Commit the session's transaction, retrying while the commit's outcome is unknown.
async fn commit_with_retry(session: &mut ClientSession) -> std::result::Result<(), DbError> {
    let mut attempt = 1;
    loop {
        match session.commit_transaction().await {
            Err(e)
                if e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                    && attempt < MAX_COMMIT_ATTEMPTS =>
            {
                warn!("Commit outcome unknown, retrying: {e}");
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Was this attempt's failure a conflict that a fresh attempt may not hit?
fn is_transient(err: &Error) -> bool {
    matches!(err, Error::Db(e) if e.contains_label(TRANSIENT_TRANSACTION_ERROR))
}

/// Finish one attempt at a transaction: commit if its body succeeded, abort otherwise.
///
/// Returns `Ok(Some(_))` once committed, `Ok(None)` if the caller should start the
/// transaction again, and `Err(_)` for failures that another attempt cannot fix.
/// The caller must have started the transaction on `session`.
pub async fn finish_attempt<T>(
    session: &mut ClientSession,
    body: Result<T>,
    attempt: u32,
) -> Result<Option<T>> {
    let outcome = match body {
        Ok(value) => commit_with_retry(session)
            .await
            .map(|()| value)
            .map_err(Error::from),
        Err(e) => {
            // The server may already have aborted; either way nothing was written.
            let _ = session.abort_transaction().await;
            Err(e)
        }
    };

    match outcome {
        Ok(value) => Ok(Some(value)),
        Err(e) if is_transient(&e) && attempt < MAX_TRANSACTION_ATTEMPTS => {
            warn!("Transaction attempt {attempt} conflicted, retrying: {e}");
            let pause = rand::thread_rng().gen_range(0..=BACKOFF_STEP_MS * u64::from(attempt));
            rocket::tokio::time::sleep(Duration::from_millis(pause)).await;
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
