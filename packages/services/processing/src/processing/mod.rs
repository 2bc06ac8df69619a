pub mod image;
pub mod validation;
pub mod storage;

pub use self::image::*;
pub use validation::*;
pub use storage::*;
