// Report history: persistence, retention pruning, and the standalone
// printable document.

pub mod document;
pub mod handlers;
pub mod store;
