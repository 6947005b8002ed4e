//! Domain catalog.
//!
//! A [`Domain`] describes the set a variable or a constraint expression must
//! belong to: fixed values, one- or two-sided bounds, second-order cones, and
//! positive semidefinite matrices. Domains are created through the factory
//! functions in this module and validated against the attached shape when a
//! variable or constraint is declared.

use std::fmt;

use crate::error::{ModelError, Result};
use crate::expr::Shape;

/// A scalar or per-entry bound attached to a domain.
#[derive(Debug, Clone)]
pub enum Bound {
    /// One value applied to every entry.
    Scalar(f64),
    /// One value per entry.
    Vector(Vec<f64>),
}

impl Bound {
    /// Expand to one value per entry for a domain of size `n`.
    pub fn expand(&self, n: usize) -> Vec<f64> {
        match self {
            Bound::Scalar(v) => vec![*v; n],
            Bound::Vector(vs) => vs.clone(),
        }
    }

    /// Number of entries a vector bound pins the shape to, if any.
    fn fixed_len(&self) -> Option<usize> {
        match self {
            Bound::Scalar(_) => None,
            Bound::Vector(vs) => Some(vs.len()),
        }
    }
}

/// The set a variable or constraint expression is restricted to.
#[derive(Debug, Clone)]
pub enum Domain {
    /// No restriction.
    Free,
    /// Fixed to the bound value(s).
    EqualTo(Bound),
    /// Bounded below, entrywise.
    GreaterThan(Bound),
    /// Bounded above, entrywise.
    LessThan(Bound),
    /// Bounded on both sides, entrywise.
    Range(Bound, Bound),
    /// Second-order cone of dimension n: x[0] >= ||x[1..]||.
    QuadraticCone(usize),
    /// Rotated second-order cone of dimension n: 2 x[0] x[1] >= ||x[2..]||^2.
    RotatedQuadraticCone(usize),
    /// Cone of n x n symmetric positive semidefinite matrices.
    PsdCone(usize),
}

impl Domain {
    /// Check that `shape` can live in this domain.
    ///
    /// Returns the failure reason on mismatch; the caller decides which
    /// error variant to wrap it in.
    pub(crate) fn conforms(&self, shape: &Shape) -> std::result::Result<(), String> {
        match self {
            Domain::Free => Ok(()),
            Domain::EqualTo(b) | Domain::GreaterThan(b) | Domain::LessThan(b) => {
                check_bound_len(b, shape)
            }
            Domain::Range(lo, hi) => {
                check_bound_len(lo, shape)?;
                check_bound_len(hi, shape)
            }
            Domain::QuadraticCone(n) | Domain::RotatedQuadraticCone(n) => {
                if shape.cols() != 1 {
                    Err(format!("cone domain needs a vector, got shape {shape}"))
                } else if shape.size() != *n {
                    Err(format!(
                        "cone of dimension {n} does not fit shape {shape}"
                    ))
                } else {
                    Ok(())
                }
            }
            Domain::PsdCone(n) => {
                if shape.rows() == *n && shape.cols() == *n && shape.ndim() == 2 {
                    Ok(())
                } else {
                    Err(format!(
                        "semidefinite domain of order {n} needs shape ({n}, {n}), got {shape}"
                    ))
                }
            }
        }
    }
}

fn check_bound_len(bound: &Bound, shape: &Shape) -> std::result::Result<(), String> {
    match bound.fixed_len() {
        Some(len) if len != shape.size() => Err(format!(
            "bound of length {len} does not fit shape {shape}"
        )),
        _ => Ok(()),
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Free => write!(f, "free"),
            Domain::EqualTo(_) => write!(f, "equality"),
            Domain::GreaterThan(_) => write!(f, "lower bound"),
            Domain::LessThan(_) => write!(f, "upper bound"),
            Domain::Range(_, _) => write!(f, "range"),
            Domain::QuadraticCone(n) => write!(f, "quadratic cone ({n})"),
            Domain::RotatedQuadraticCone(n) => write!(f, "rotated quadratic cone ({n})"),
            Domain::PsdCone(n) => write!(f, "psd cone ({n})"),
        }
    }
}

/// Domain with no restriction.
pub fn unbounded() -> Domain {
    Domain::Free
}

/// Domain fixing every entry to `value`.
pub fn equal_to(value: f64) -> Domain {
    Domain::EqualTo(Bound::Scalar(value))
}

/// Domain fixing each entry to the corresponding value.
pub fn equal_to_vec(values: Vec<f64>) -> Domain {
    Domain::EqualTo(Bound::Vector(values))
}

/// Domain bounding every entry below by `lower`.
pub fn greater_than(lower: f64) -> Domain {
    Domain::GreaterThan(Bound::Scalar(lower))
}

/// Domain bounding each entry below by the corresponding value.
pub fn greater_than_vec(lowers: Vec<f64>) -> Domain {
    Domain::GreaterThan(Bound::Vector(lowers))
}

/// Domain bounding every entry above by `upper`.
pub fn less_than(upper: f64) -> Domain {
    Domain::LessThan(Bound::Scalar(upper))
}

/// Domain bounding each entry above by the corresponding value.
pub fn less_than_vec(uppers: Vec<f64>) -> Domain {
    Domain::LessThan(Bound::Vector(uppers))
}

/// Domain bounding every entry to `[lower, upper]`.
pub fn range(lower: f64, upper: f64) -> Result<Domain> {
    if !lower.is_finite() || !upper.is_finite() {
        return Err(ModelError::Shape(format!(
            "range bounds must be finite, got [{lower}, {upper}]"
        )));
    }
    if lower > upper {
        return Err(ModelError::Shape(format!(
            "empty range: lower {lower} exceeds upper {upper}"
        )));
    }
    Ok(Domain::Range(Bound::Scalar(lower), Bound::Scalar(upper)))
}

/// Domain bounding each entry to its own interval.
pub fn range_vec(lowers: Vec<f64>, uppers: Vec<f64>) -> Result<Domain> {
    if lowers.len() != uppers.len() {
        return Err(ModelError::dimension(
            "range",
            format!("{} lower bounds", lowers.len()),
            format!("{} upper bounds", uppers.len()),
        ));
    }
    for (i, (lo, hi)) in lowers.iter().zip(&uppers).enumerate() {
        if !lo.is_finite() || !hi.is_finite() {
            return Err(ModelError::Shape(format!(
                "range bounds at entry {i} must be finite, got [{lo}, {hi}]"
            )));
        }
        if lo > hi {
            return Err(ModelError::Shape(format!(
                "empty range at entry {i}: lower {lo} exceeds upper {hi}"
            )));
        }
    }
    Ok(Domain::Range(Bound::Vector(lowers), Bound::Vector(uppers)))
}

/// Second-order cone domain of dimension `n`.
///
/// Membership of a vector x means `x[0] >= ||x[1..]||_2`. `n` must be at
/// least 1.
pub fn quadratic_cone(n: usize) -> Result<Domain> {
    if n < 1 {
        return Err(ModelError::Shape(
            "quadratic cone needs dimension at least 1".into(),
        ));
    }
    Ok(Domain::QuadraticCone(n))
}

/// Rotated second-order cone domain of dimension `n`.
///
/// Membership of a vector x means `2 x[0] x[1] >= ||x[2..]||_2^2` with
/// `x[0], x[1] >= 0`. `n` must be at least 2.
pub fn rotated_quadratic_cone(n: usize) -> Result<Domain> {
    if n < 2 {
        return Err(ModelError::Shape(
            "rotated quadratic cone needs dimension at least 2".into(),
        ));
    }
    Ok(Domain::RotatedQuadraticCone(n))
}

/// Cone of symmetric positive semidefinite matrices of order `n`.
pub fn psd_cone(n: usize) -> Result<Domain> {
    if n < 1 {
        return Err(ModelError::Shape(
            "semidefinite cone needs order at least 1".into(),
        ));
    }
    Ok(Domain::PsdCone(n))
}
