// ===============================
// src/error.rs
// ===============================
use thiserror::Error;

use crate::client::ApiError;

/// Everything that can go wrong while reconciling one collection.
///
/// `Api` and `Decode` are infrastructural: when raised by a page fetch they
/// abort the whole pass for that collection. Every other variant is scoped to
/// a single entity and must not stop the surrounding loop.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("failed to decode response body :: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("duplicate orders with order code (under seller) :: {0}")]
    DuplicateOrder(String),
    #[error("variant not found using barcode ({barcode_type} / {barcode})")]
    VariantNotFound {
        barcode: String,
        barcode_type: String,
    },
    #[error("order has not been synced to seller account :: {0}")]
    OrderNotSynced(String),
    #[error("order marked as shipped in seller account but not buyer account :: {0}")]
    ShippedStateConflict(String),
    #[error("no title on product [{id}]")]
    MissingTitle { id: String },
    #[error("no barcode on {title} [{id}]")]
    MissingBarcode { title: String, id: String },
    #[error("no barcode type on {title} [{id}]")]
    MissingBarcodeType { title: String, id: String },
}
