//! # Fleetdesk Transfer
//!
//! [`TransferQueue`] admits download and upload tasks in FIFO order and runs
//! at most `concurrency` of them at once. The executor of each task is
//! supplied by the caller and treated as opaque; [`download_to_path`] and
//! [`upload_from_path`] are ready-made executors over the request gateway.

mod http;
mod queue;
mod task;

pub use http::{download_to_path, upload_from_path};
pub use queue::{TransferContext, TransferQueue};
pub use task::{Progress, TransferKind, TransferRequest, TransferStatus, TransferTask};
