// src/lib.rs

//! sitecrawler: budgeted single-domain crawler library

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
