//! Turning captured images into the output PDF

pub mod assembler;
pub mod embed;
pub mod writer;

pub use assembler::DocumentAssembler;
pub use writer::ArtifactWriter;
