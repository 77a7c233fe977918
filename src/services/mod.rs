//! Core services: storage, catalog, external collaborators and the
//! workflows built on top of them.

pub mod admin;
pub mod catalog;
pub mod object_store;
pub mod poller;
pub mod presign;
pub mod probe;
pub mod qr;
pub mod render;
pub mod translation;
pub mod workflow;
