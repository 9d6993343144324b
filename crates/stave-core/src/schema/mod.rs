mod albums;
mod artists;
pub mod db;
pub mod migrations;
mod tracks;

pub use db::{CatalogCounts, Database};
