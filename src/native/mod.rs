/// Native module contains implementations of core traits
/// that drive local toolchain binaries directly,
/// without containers or remote runners.
pub mod invoker;
pub mod toolchains;
