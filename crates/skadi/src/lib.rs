#![allow(rustdoc::private_intra_doc_links)]

pub mod app;
pub mod application_lifecycle;
pub mod client;
pub mod coalescer;
pub mod commands;
pub mod config;
pub mod daemon_response;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod ipc_server;
pub mod opts;
pub mod paths;
pub mod process_bridge;
pub mod reducer;
pub mod registry;
pub mod server;
pub mod util;

pub use app::{Bar, BarCommand, BarSnapshot};
pub use descriptor::{CommandDescriptor, Invocation, Mode};
pub use dispatch::{CommandDispatcher, Invoked};
pub use error::{CommandDeliveryError, ProcessError};
pub use paths::SkadiPaths;
pub use process_bridge::{ProcessBridge, StreamEvent, StreamHandle, SystemProcessBridge};
pub use registry::{ListenerRegistry, RegistryStats, StreamStatus, SubscriptionHandle};
