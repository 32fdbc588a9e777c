pub mod config;
pub mod log;
pub mod collections;
pub mod error;
pub mod net;
pub mod profile;
pub mod slug;
pub mod wikidata;
pub mod wiki;
pub mod hierarchy;
pub mod gisco;
pub mod dataset;
pub mod output;
