pub mod ports;
pub mod clean_use_case;
pub mod import_use_case;
