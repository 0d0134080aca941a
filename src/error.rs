use std::result;

use thiserror::Error;

use crate::store;

/// Errors returned by the auth and session stores.
#[derive(Error, Debug)]
pub enum Error {
    /// No cookie, no record, or a record past its expiry.
    #[error("record not found")]
    NotFound,

    #[error(transparent)]
    Store(#[from] store::Error),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

pub type Result<T> = result::Result<T, Error>;
