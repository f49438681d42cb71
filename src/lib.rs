pub mod archive;
pub mod convert;
pub mod error;
pub mod server;

// Re-export commonly used types
pub use convert::{
    process_batch, ConvertOptions, ConvertedImage, OutputFormat, ResizeSpec, SourceFile,
};
pub use error::ConvertError;
