//! One [`Retriever`](crate::Retriever) per [`StrategyId`](crate::StrategyId).

mod files;
mod grep;
mod hybrid;
mod keyword;
mod vector;

pub use files::{FilesViaContentRetriever, FilesViaMetadataRetriever};
pub use grep::GrepRetriever;
pub use hybrid::HybridRetriever;
pub use keyword::Bm25Retriever;
pub use vector::VectorRetriever;
