//! HTTP clients for Xen Orchestra, NetBox and the Salt API.
//!
//! Each client implements the matching collaborator trait from
//! `invsync_connector`, so the reconciliation engine never sees reqwest.

pub mod http;
pub mod netbox;
pub mod salt;
pub mod xen;

pub use http::ApiClient;
pub use netbox::NetBoxClient;
pub use salt::SaltClient;
pub use xen::XenClient;
