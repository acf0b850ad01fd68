pub mod diagnostics;
pub mod http;
pub mod in_memory;
