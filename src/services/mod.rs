pub mod library;
pub mod merge;
pub mod spotify;
