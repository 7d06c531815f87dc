pub mod correlation_store;
pub mod pending_uploads;

pub use correlation_store::{
    create_shared_correlation_store, CorrelationLookup, SharedCorrelationStore,
};
pub use pending_uploads::{
    create_shared_pending_uploads, PendingUpload, SharedPendingUploads,
};
