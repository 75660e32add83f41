// Configuration modules for the Aspirant backend

pub mod limits;

pub use limits::FreeTierDefaults;
