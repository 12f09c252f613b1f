pub mod admin;

#[cfg(test)]
pub mod mock;

pub use admin::{
    AdminError, AdminRequest, AdminResponse, AdminTarget, AdminTransport, ControlPlaneClient,
    HttpTransport, NODES_PATH,
};
