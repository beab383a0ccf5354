pub mod ai_research;
pub mod labeling;
pub mod normalizer;
pub mod quote_gateway;
pub mod quote_source;
pub mod scan_scheduler;
pub mod screening;
