pub mod detection;
pub mod io;
pub mod pipeline;
pub mod shared;
