pub mod boundary;
pub mod clip;
pub mod mask;
pub mod ops;
pub mod repair;
