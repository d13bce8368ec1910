pub mod doctor;
pub mod sync;
