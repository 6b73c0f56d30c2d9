pub mod feedback;
pub mod generator;
pub mod retriever;
pub mod tracer;
