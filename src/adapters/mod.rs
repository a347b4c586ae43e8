//! Built-in language adapters
//!
//! Real deployments plug in external backends through the adapter catalog;
//! the adapters here ship with the engine so it runs (and is testable) out of
//! the box.

/// Line-oriented demonstration language.
pub mod echo;

pub use echo::EchoAdapter;

use crate::engine::registry::AdapterCatalog;

/// Register the built-in adapters with a catalog.
pub fn register_builtin(catalog: &AdapterCatalog) {
    catalog.register(EchoAdapter::new());
}
