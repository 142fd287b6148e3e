pub mod config_doc;
pub mod launch;
pub mod params;
