// ============================
// crates/backend-lib/src/web/mod.rs
// ============================
//! Browser-facing HTTP surface.

pub mod cookies;
pub mod handlers;
mod pages;
pub mod router;

pub use router::create_router;

#[cfg(test)]
mod router_tests;
