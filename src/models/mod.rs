pub mod ai;
pub mod scan;
pub mod settings;
pub mod stock;
pub mod strategy;
pub mod universe;
