pub mod io;
pub mod object;
pub mod poll;
