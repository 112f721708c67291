pub mod codec;
pub mod crypto;
pub mod errors;
pub mod metadata;
pub mod pipeline;
pub mod stores;
pub mod tree;
