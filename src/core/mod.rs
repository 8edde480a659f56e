// Core modules implementing content streams, limits, context, and error modeling.
pub mod context;
pub mod error;
pub mod framing;
pub mod layer;
pub mod limited;
pub mod metadata;
pub mod reader;
pub mod segment;
pub mod source;
pub mod writer;
