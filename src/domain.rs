pub mod media_store;
pub mod user;
pub mod user_repository;
pub mod user_service;
