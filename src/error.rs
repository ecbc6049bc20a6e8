use thiserror::Error;
use tracing::warn;

use crate::model::ElementKind;
use crate::store::StoreError;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors surfaced by the graph mapping layer.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The requested element is not live.
    #[error("{kind} with id {id} does not exist")]
    NotFound {
        /// Kind of the missing element.
        kind: ElementKind,
        /// Id of the missing element.
        id: String,
    },
    /// An element with the requested id is already live.
    #[error("{kind} with id {id} already exists")]
    AlreadyExists {
        /// Kind of the colliding element.
        kind: ElementKind,
        /// Colliding id.
        id: String,
    },
    /// A named index is already registered under this name.
    #[error("index {0} already exists")]
    IndexAlreadyExists(String),
    /// The key is already indexed for this element kind.
    #[error("key index on {key} already exists for {kind}")]
    KeyIndexAlreadyExists {
        /// Indexed property key.
        key: String,
        /// Element kind of the key index.
        kind: ElementKind,
    },
    /// No named index is registered under this name.
    #[error("index {0} does not exist")]
    IndexNotFound(String),
    /// The named index exists but holds the other element kind.
    #[error("index {name} holds {actual} elements, not {expected}")]
    IndexKindMismatch {
        /// Index name.
        name: String,
        /// Kind the caller asked for.
        expected: ElementKind,
        /// Kind the index was registered with.
        actual: ElementKind,
    },
    /// Edges must carry a label.
    #[error("edge label can not be empty")]
    LabelRequired,
    /// Rejected before any write was issued.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A value or key could not be encoded.
    #[error("encoding error: {0}")]
    Encoding(String),
    /// Stored bytes could not be decoded; treated as store corruption.
    #[error("decoding error: {0}")]
    Decoding(String),
    /// The store refused a batch of mutations. Not retried.
    #[error("{count} mutations rejected on table {table}: {reason}")]
    MutationsRejected {
        /// Table the batch targeted.
        table: String,
        /// Number of mutations in the failed batch.
        count: usize,
        /// Store-provided reason.
        reason: String,
    },
    /// Administrative or connection failure in the store.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    /// Operation disabled by configuration.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    /// Configuration could not be read or failed validation.
    #[error("configuration error: {0}")]
    Config(String),
}

impl GraphError {
    pub(crate) fn not_found(kind: ElementKind, id: impl Into<String>) -> Self {
        GraphError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

impl From<StoreError> for GraphError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected { table, reason } => {
                warn!(table = %table, %reason, "store rejected write");
                GraphError::MutationsRejected {
                    table,
                    count: 0,
                    reason,
                }
            }
            other => GraphError::StoreUnavailable(other.to_string()),
        }
    }
}
