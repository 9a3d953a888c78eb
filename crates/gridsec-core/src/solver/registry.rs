use super::backend::{FaerSolver, GaussSolver, LinearSystemBackend};
use crate::error::GridSecError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Linear solver used for the Newton-Raphson correction step.
///
/// Selected by name in load flow parameters; both backends solve the same
/// dense Jacobian and must agree to solver tolerance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    #[default]
    Gauss,
    Faer,
}

impl FromStr for SolverKind {
    type Err = GridSecError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let name = input.trim().to_ascii_lowercase();
        SolverKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| {
                GridSecError::Config(format!(
                    "unknown linear solver '{input}', expected one of: {}",
                    SolverKind::available().join(", ")
                ))
            })
    }
}

impl SolverKind {
    pub const ALL: [SolverKind; 2] = [SolverKind::Gauss, SolverKind::Faer];

    pub fn build_solver(self) -> Arc<dyn LinearSystemBackend> {
        match self {
            SolverKind::Gauss => Arc::new(GaussSolver),
            SolverKind::Faer => Arc::new(FaerSolver),
        }
    }

    pub fn available() -> &'static [&'static str] {
        &["gauss", "faer"]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SolverKind::Gauss => "gauss",
            SolverKind::Faer => "faer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::DenseMatrix;

    #[test]
    fn solver_kind_parsing_supports_all_engines() {
        assert_eq!("gauss".parse::<SolverKind>().unwrap(), SolverKind::Gauss);
        assert_eq!("FAER".parse::<SolverKind>().unwrap(), SolverKind::Faer);
        assert!(matches!(
            "lu".parse::<SolverKind>(),
            Err(GridSecError::Config(_))
        ));
    }

    #[test]
    fn solver_backend_options_solve_the_same_system() {
        let matrix = DenseMatrix::from_rows(&[vec![4.0, 1.0], vec![2.0, 3.0]]).unwrap();
        let rhs = vec![9.0, 13.0];

        for kind in SolverKind::ALL {
            let x = kind.build_solver().solve(&matrix, &rhs).unwrap();
            assert!((x[0] - 1.4).abs() < 1e-9, "{}: {:?}", kind.as_str(), x);
            assert!((x[1] - 3.4).abs() < 1e-9, "{}: {:?}", kind.as_str(), x);
        }
    }

    #[test]
    fn singular_matrix_is_rejected() {
        let matrix = DenseMatrix::from_rows(&[vec![1.0, 2.0], vec![2.0, 4.0]]).unwrap();
        assert!(GaussSolver.solve(&matrix, &[1.0, 1.0]).is_err());
        assert!(GaussSolver.solve(&matrix, &[1.0]).is_err());
        assert!(DenseMatrix::from_rows(&[vec![1.0, 2.0]]).is_err());
    }
}
