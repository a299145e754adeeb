pub mod app;
pub mod bindingdb;
pub mod codec;
pub mod config;
pub mod domain;
pub mod error;
pub mod explode;
pub mod http;
pub mod knapsack;
pub mod output;
pub mod pdbj;
pub mod pipeline;
pub mod rcsb;
pub mod record;
pub mod stages;
pub mod store;
pub mod table;
