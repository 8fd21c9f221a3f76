pub mod invoker;
pub mod toolchain;
