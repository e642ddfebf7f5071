pub mod client_ip;
pub mod request_id;

pub use client_ip::ClientIp;
pub use request_id::RequestIdLayer;
