// MediaBridge API Library
//
// Provides the HTTP signaling API for MediaBridge

pub mod http;

// Re-export commonly used types
pub use http::{create_router, AppState};
