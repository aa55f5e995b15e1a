#![deny(missing_docs)]
//! Prioritized image-sink pipeline: per-user authenticated external
//! host, then guest external host, then a local file sink, with
//! per-user plaintext credential lookup and upload history (§4.7
//! UploadRouter).

mod credentials;
mod external;
mod local;
mod router;
mod types;

pub use credentials::CredentialStore;
pub use external::ExternalHostClient;
pub use local::LocalFileSink;
pub use router::{GuestCredential, UploadRouter};
pub use types::{HostedUser, SinkFailure, UploadOutcome, UploadRequest};
