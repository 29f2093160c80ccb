pub mod check;
pub mod record;
pub mod screenshot;
