pub mod data_stream;
pub mod evaluation;
pub mod visualization;
