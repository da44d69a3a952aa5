//! HTTP API for the Magvox voxel editing service.
//!
//! Serves project creation, partition listings, surface and layer queries,
//! voxel edits with undo/redo, and CSV export as JSON routes on a background
//! `tiny_http` thread.

mod routes;
pub mod server;

pub use server::{AppState, MagvoxServer, ServerError, status_for};
