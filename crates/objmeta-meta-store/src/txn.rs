//! Scoped metadata transactions

use crate::client::MetaClient;
use objmeta_common::{Error, Result};
use tracing::{error, warn};

/// Owns an open transaction until it is committed.
///
/// [`TxGuard::commit`] consumes the guard. A guard dropped without being
/// committed aborts its transaction, so any early return between
/// [`TxGuard::begin`] and `commit` rolls back every staged write.
pub struct TxGuard<'a, C: MetaClient + ?Sized> {
    client: &'a C,
    tx: Option<C::Tx>,
}

impl<'a, C: MetaClient + ?Sized> TxGuard<'a, C> {
    pub fn begin(client: &'a C) -> Result<Self> {
        let tx = client.new_trans()?;
        Ok(Self {
            client,
            tx: Some(tx),
        })
    }

    /// The open transaction handle
    pub fn tx(&self) -> Result<&C::Tx> {
        self.tx
            .as_ref()
            .ok_or_else(|| Error::internal("transaction already finished"))
    }

    /// Commit the transaction.
    ///
    /// The handle is released either way; a failed commit is not followed
    /// by an abort.
    pub fn commit(mut self) -> Result<()> {
        match self.tx.take() {
            Some(tx) => self.client.commit_trans(tx),
            None => Err(Error::internal("transaction already finished")),
        }
    }
}

impl<C: MetaClient + ?Sized> Drop for TxGuard<'_, C> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            warn!("Aborting uncommitted metadata transaction");
            if let Err(e) = self.client.abort_trans(tx) {
                error!("Failed to abort metadata transaction: {}", e);
            }
        }
    }
}
