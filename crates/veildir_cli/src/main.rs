//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `veildir_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

fn main() {
    println!("veildir_core ping={}", veildir_core::ping());
    println!("veildir_core version={}", veildir_core::core_version());
}
