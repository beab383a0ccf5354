pub mod fallback;
pub mod http;
