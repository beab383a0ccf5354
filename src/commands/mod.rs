pub mod scan_cmd;
pub mod settings_cmd;
