//! Solve request construction and the solver catalog

use crate::parser::{Matrix, Vector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error for a solver identifier outside the catalog
#[derive(Error, Debug, Clone, PartialEq)]
#[error("unknown solving method '{}', expected one of: {}", .0, SolverMethod::catalog())]
pub struct UnknownMethod(pub String);

/// Solving methods offered by the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverMethod {
    /// Direct LU-based solve for square, non-singular systems
    #[default]
    NumpyExactSolver,
    /// Least-squares solution, also for over/under-determined systems
    NumpyLstsqSolver,
    /// Solution through the Moore-Penrose pseudo-inverse
    NumpyPinvSolver,
    /// PETSc KSP solver
    PetscSolver,
    /// SciPy GMRES iterative solver
    ScipyGmresSolver,
}

impl SolverMethod {
    pub const ALL: [SolverMethod; 5] = [
        SolverMethod::NumpyExactSolver,
        SolverMethod::NumpyLstsqSolver,
        SolverMethod::NumpyPinvSolver,
        SolverMethod::PetscSolver,
        SolverMethod::ScipyGmresSolver,
    ];

    /// Wire identifier understood by the service
    pub fn as_str(&self) -> &'static str {
        match self {
            SolverMethod::NumpyExactSolver => "numpy_exact_solver",
            SolverMethod::NumpyLstsqSolver => "numpy_lstsq_solver",
            SolverMethod::NumpyPinvSolver => "numpy_pinv_solver",
            SolverMethod::PetscSolver => "petsc_solver",
            SolverMethod::ScipyGmresSolver => "scipy_gmres_solver",
        }
    }

    fn catalog() -> String {
        Self::ALL
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for SolverMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SolverMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

/// Channel through which the matrix and right-hand side reach the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DataSourceType {
    /// Data travels inline in the request body
    #[default]
    #[serde(rename = "http_request")]
    InlineData,
}

/// A complete solve request.
///
/// Only the matrix and vector are individually validated. Whether their
/// dimensions fit together is decided by the service, which knows what each
/// solver accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveRequest {
    pub source: DataSourceType,
    pub method: SolverMethod,
    pub matrix: Matrix,
    pub rhs: Vector,
}

impl SolveRequest {
    pub fn build(matrix: Matrix, rhs: Vector, method: SolverMethod) -> Self {
        Self {
            source: DataSourceType::InlineData,
            method,
            matrix,
            rhs,
        }
    }

    /// JSON body for `POST /solve`
    pub fn body(&self) -> SolveRequestBody<'_> {
        SolveRequestBody {
            data_source_type: self.source,
            slae_solving_method: self.method,
            params: InlineParams {
                matrix: &self.matrix,
                rhs: &self.rhs,
            },
        }
    }
}

/// Wire format of a solve request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveRequestBody<'a> {
    data_source_type: DataSourceType,
    slae_solving_method: SolverMethod,
    params: InlineParams<'a>,
}

#[derive(Debug, Serialize)]
struct InlineParams<'a> {
    matrix: &'a Matrix,
    rhs: &'a Vector,
}
