pub mod scan;
pub mod screenshot;
pub mod search;
