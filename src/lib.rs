// Library exports for Senior SNS
// Integration tests build the router through these modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod feed;
pub mod routes;
pub mod services;
pub mod social;
pub mod state;
