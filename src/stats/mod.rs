//! Numerical core: distributions, descriptive statistics, hypothesis tests,
//! correlation and factor analysis.

pub mod correlation;
pub mod descriptive;
pub mod factor;
pub mod inference;
pub mod matrix;
pub mod rank;
pub mod special;

pub use correlation::{CorrelationMethod, ItemCorrelationMatrix};
pub use descriptive::Descriptives;
pub use factor::{Bartlett, FactorSolution, Kmo, KmoLabel};
pub use inference::{ChiSquare, Magnitude, MannWhitney, TwoWayAnova, WelchT};
pub use matrix::Matrix;
