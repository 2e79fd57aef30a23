pub mod error;
pub mod images;
pub mod invalidation;
pub mod pipeline;
pub mod queries;
pub mod render;
pub mod repos;
pub mod session;
pub mod slugs;
pub mod storage;
pub mod tags;
