pub mod base_model;
pub mod detector;
pub mod iforest;
pub mod ipca;
pub mod window;
