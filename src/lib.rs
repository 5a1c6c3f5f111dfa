pub mod aggregate;
pub mod app;
pub mod config;
pub mod curated;
pub mod domain;
pub mod error;
pub mod html;
pub mod http;
pub mod normalize;
pub mod output;
pub mod payload;
pub mod providers;
pub mod report;
pub mod source;
pub mod workbook;
