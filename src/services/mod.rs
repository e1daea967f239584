pub mod media_service;
pub mod staging;
pub mod storage;
