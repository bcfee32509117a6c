pub mod timestamp;
pub mod fields;
pub mod vendor;
pub mod validator;
pub mod parser;
pub mod normalizer;
pub mod reader;
pub mod optimizer;
pub mod classifier;
pub mod cost;
pub mod predictive;
pub mod health;
pub mod sessions;
pub mod analytics;
pub mod recommendations;
pub mod export;
pub mod pipeline;
