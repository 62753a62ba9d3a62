pub mod api;
pub mod batch;
pub mod config;
pub mod evidence;
pub mod fossilizer;
pub mod humanize;
pub mod merkle;
pub mod observability;
