//! Integration tests for hpa-floor-guard
//!
//! These tests require a Kubernetes cluster (kind) to run and tell the story
//! of how HPA owners interact with the floor guard.
//!
//! # Test Organization
//!
//! - `floor_guard`: Stories about annotated HPAs getting their floor
//!   written back through the real API server, including stale writes
//!
//! # Running These Tests
//!
//! ```bash
//! cargo test --test kind -- --ignored --nocapture
//! ```

mod floor_guard;
mod helpers;
