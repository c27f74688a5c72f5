pub mod adjustment;
pub mod fixture;
pub mod market;
pub mod pick;
pub mod team;

pub use adjustment::*;
pub use fixture::*;
pub use market::*;
pub use pick::*;
pub use team::*;
