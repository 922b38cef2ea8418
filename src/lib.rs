pub mod air_quality;
pub mod dashboard;
pub mod db;
pub mod logging;
pub mod render;
pub mod source;
