use chapel_types::ValidationError;
use thiserror::Error;

use crate::documents::Collection;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{collection} record '{id}' already exists")]
    DuplicateId { collection: Collection, id: String },

    #[error("{field} is already in use")]
    Taken { collection: Collection, field: &'static str },

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("malformed {what} document: {source}")]
    Malformed {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoreError {
    pub(crate) fn malformed(what: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Malformed {
            what: what.into(),
            source,
        }
    }

    /// Turn a unique-index violation on `collection` into `Taken`; any other
    /// error passes through.
    pub(crate) fn from_insert(collection: Collection, err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(e, Some(msg)) = &err {
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE {
                if let Some(field) = UNIQUE_INDEXES
                    .iter()
                    .find(|(index, _)| msg.contains(index))
                    .map(|(_, field)| *field)
                {
                    return Self::Taken { collection, field };
                }
            }
        }
        Self::Sqlite(err)
    }
}

/// Expression indexes carry their name in the constraint message.
const UNIQUE_INDEXES: &[(&str, &str)] = &[
    ("idx_members_email", "email"),
    ("idx_donations_transaction", "transactionId"),
];

pub type StoreResult<T> = Result<T, StoreError>;
