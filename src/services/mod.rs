pub mod assembler;
pub mod cascade;
pub mod catalog;
pub mod http_cache;
pub mod period;
pub mod scoring;
pub mod selection;
pub mod surface;
