pub mod inspect;
pub mod sync;
