pub mod client;
pub mod http_client;
pub mod types;

pub use client::TransferClient;
pub use http_client::HttpTransferClient;
pub use types::*;
