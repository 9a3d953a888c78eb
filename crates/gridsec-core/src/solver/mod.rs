pub mod backend;
pub mod registry;

pub use backend::{DenseMatrix, FaerSolver, GaussSolver, LinearSystemBackend};
pub use registry::SolverKind;
