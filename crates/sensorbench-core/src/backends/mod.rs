//! Accelerated backend implementations
//!
//! One backend ships in-tree:
//! - **Software**: single-precision CPU emulation with a staged transfer phase
//!
//! GPU and NPU delegates plug in through [`crate::backend::BackendFactory`].

pub mod software;

pub use software::SoftwareBackend;
