pub mod authorship;
pub mod paper;
pub mod publication;
pub mod researcher;
pub mod source;

pub use authorship::*;
pub use paper::*;
pub use publication::*;
pub use researcher::*;
pub use source::*;
