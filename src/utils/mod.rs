pub mod ip;

pub use ip::{extract_client_ip, is_local_ip, is_private_or_local};
