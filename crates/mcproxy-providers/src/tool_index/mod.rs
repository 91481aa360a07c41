//! Tool Index implementation (§4.5).

mod inverted;

pub use inverted::InvertedToolIndex;
