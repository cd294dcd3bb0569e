mod cidr;
mod host;

pub use cidr::CidrStore;
pub use host::{normalize_hostname, HostMatchMode, HostPattern};
