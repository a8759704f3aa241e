#![recursion_limit = "256"]

pub mod boxes;
pub mod config;
pub mod data;
pub mod debug;
pub mod error;
pub mod labels;
pub mod layers;
pub mod loss;
pub mod models;
pub mod schedule;
pub mod stats;
pub mod training;
pub mod transforms;
pub mod voc;
pub mod voc_labels;
