//! Domain operations for the Passwall service on the router.
//!
//! [`ServiceController`] turns intents (query status, toggle, find the
//! external address) into shell commands run through a
//! [`CommandRunner`](passwall_remote::CommandRunner) and interprets their
//! output. Address discovery is an ordered chain of [`AddressResolver`]s.

mod address;
mod controller;
mod state;

pub use address::{
    AddressConfig, AddressReport, AddressResolver, AddressResult, HttpResolver,
    LocalSocketResolver, RemoteCommandResolver, ResolveError, ResolveFuture, build_resolvers,
    is_valid_ipv4,
};
pub use controller::{ServiceController, ToggleAction, ToggleError};
pub use state::{ServiceConfig, ServiceState};
