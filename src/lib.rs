//! Finalizable handle bridge between a native engine and V8.
//!
//! - [`Bridge::attach`] ties a [`NativeResource`]'s release to a managed
//!   object's collection; [`Bridge::detach`] takes it back.
//! - [`Bridge::wrap`] turns a managed object into an [`OpaqueToken`] the
//!   native side can store; [`Bridge::resolve`] turns it back.
//!
//! ```rust,ignore
//! let api = gc_handle_bridge::platform::initialize();
//! let bridge = Bridge::new(api, unsafe { ForeignEngine::new(realm_release) }, BridgeConfig::default());
//!
//! let registration = bridge.attach(scope, wrapper, resource, 256)?;
//! let token = bridge.wrap(scope, wrapper);
//! let same = bridge.resolve(scope, token)?;
//! ```

mod bridge;
mod config;
mod engine;
mod error;
mod finalizer;
mod gc;
mod handle_bridge;
pub mod platform;
mod registry;
mod release;

pub use bridge::{Bridge, BridgeBuilder, BridgeStats};
pub use config::{BridgeConfig, ReleasePolicy};
pub use engine::{ForeignEngine, NativeEngine, NativeResource, ReleaseFn};
pub use error::BridgeError;
pub use finalizer::Registration;
pub use handle_bridge::OpaqueToken;
pub use platform::HostApi;
pub use release::ReleaseWorker;
