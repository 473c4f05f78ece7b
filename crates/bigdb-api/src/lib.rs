// bigdb-api: Async Rust client for the BigDB REST API of network controllers
//
// `connect` a session, navigate from `root()` with `PathNode`s, then issue
// data / rpc / schema requests from any node.

pub mod client;
pub mod error;
pub mod fabric;
pub mod path;
pub mod predicate;
pub mod retry;
pub mod session;
pub mod timeout;
pub mod transport;
pub mod value;

pub use client::{BigDbClient, RequestOptions, SessionKind};
pub use error::Error;
pub use fabric::{Fabric, Switch, SwitchConfig};
pub use path::PathNode;
pub use predicate::{Literal, Predicate};
pub use retry::{RetryPolicy, RetrySpec};
pub use session::{ConnectOptions, Credentials, SessionState, connect};
pub use timeout::{Timeout, TimeoutSpec};
pub use transport::{TlsMode, TransportConfig};
pub use value::FieldExt;

pub use reqwest::{Method, StatusCode};
