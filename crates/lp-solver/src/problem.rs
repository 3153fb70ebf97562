// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Plain-data representation of a linear / mixed-integer program.
//!
//! A [`Problem`] owns no solver state. Copying one is a `clone()`, and any
//! [`crate::Solver`] can consume it, which lets callers perturb a solved
//! problem and re-solve the copy without touching the original.
//!
//! # Example
//! ```
//! use lp_solver::{Problem, Sense};
//!
//! let mut p = Problem::new("knapsack", Sense::Maximize);
//! let a = p.add_binary("a", 3.0);
//! let b = p.add_binary("b", 2.0);
//! p.add_constraint("weight", vec![(a, 2.0), (b, 2.0)], None, Some(3.0));
//! assert_eq!(p.num_variables(), 2);
//! ```

use crate::SolverError;
use std::collections::HashSet;

/// Index of a variable within its [`Problem`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct VarId(pub usize);

/// Index of a constraint within its [`Problem`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct ConstraintId(pub usize);

/// Optimisation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sense {
    Maximize,
    Minimize,
}

impl Sense {
    /// `+1` for maximisation, `-1` for minimisation.
    pub fn sign(&self) -> f64 {
        match self {
            Self::Maximize => 1.0,
            Self::Minimize => -1.0,
        }
    }
}

/// A decision variable `lower ≤ x ≤ upper` with objective coefficient.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Variable {
    pub name: String,
    /// Finite lower bound.
    pub lower: f64,
    /// Upper bound, `None` for unbounded above.
    pub upper: Option<f64>,
    pub integer: bool,
    pub objective: f64,
}

impl Variable {
    pub fn is_binary(&self) -> bool {
        self.integer && self.lower == 0.0 && self.upper == Some(1.0)
    }
}

/// A linear row `lower ≤ Σ coeff·x ≤ upper`. Either side may be absent.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Constraint {
    pub name: String,
    pub terms: Vec<(VarId, f64)>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl Constraint {
    /// Coefficient of `var` in this row (duplicate terms are summed).
    pub fn coefficient(&self, var: VarId) -> f64 {
        self.terms
            .iter()
            .filter(|(v, _)| *v == var)
            .map(|(_, c)| c)
            .sum()
    }
}

/// A complete optimisation problem.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Problem {
    pub name: String,
    pub sense: Sense,
    pub variables: Vec<Variable>,
    pub constraints: Vec<Constraint>,
}

impl Problem {
    pub fn new(name: impl Into<String>, sense: Sense) -> Self {
        Self {
            name: name.into(),
            sense,
            variables: Vec::new(),
            constraints: Vec::new(),
        }
    }

    /// Adds a variable and returns its id.
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        lower: f64,
        upper: Option<f64>,
        integer: bool,
        objective: f64,
    ) -> VarId {
        self.variables.push(Variable {
            name: name.into(),
            lower,
            upper,
            integer,
            objective,
        });
        VarId(self.variables.len() - 1)
    }

    /// Adds a `{0, 1}` variable.
    pub fn add_binary(&mut self, name: impl Into<String>, objective: f64) -> VarId {
        self.add_variable(name, 0.0, Some(1.0), true, objective)
    }

    /// Adds a constraint and returns its id.
    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        terms: Vec<(VarId, f64)>,
        lower: Option<f64>,
        upper: Option<f64>,
    ) -> ConstraintId {
        self.constraints.push(Constraint {
            name: name.into(),
            terms,
            lower,
            upper,
        });
        ConstraintId(self.constraints.len() - 1)
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn variable(&self, id: VarId) -> Result<&Variable, SolverError> {
        self.variables
            .get(id.0)
            .ok_or(SolverError::UnknownVariable(id.0))
    }

    pub fn constraint(&self, id: ConstraintId) -> Result<&Constraint, SolverError> {
        self.constraints
            .get(id.0)
            .ok_or(SolverError::UnknownConstraint(id.0))
    }

    pub fn variable_by_name(&self, name: &str) -> Option<VarId> {
        self.variables
            .iter()
            .position(|v| v.name == name)
            .map(VarId)
    }

    pub fn constraint_by_name(&self, name: &str) -> Option<ConstraintId> {
        self.constraints
            .iter()
            .position(|c| c.name == name)
            .map(ConstraintId)
    }

    /// Sets the objective coefficient of `var`.
    pub fn set_objective(&mut self, var: VarId, coefficient: f64) -> Result<(), SolverError> {
        let v = self
            .variables
            .get_mut(var.0)
            .ok_or(SolverError::UnknownVariable(var.0))?;
        v.objective = coefficient;
        Ok(())
    }

    /// Replaces the bounds of `var`.
    pub fn set_variable_bounds(
        &mut self,
        var: VarId,
        lower: f64,
        upper: Option<f64>,
    ) -> Result<(), SolverError> {
        let v = self
            .variables
            .get_mut(var.0)
            .ok_or(SolverError::UnknownVariable(var.0))?;
        v.lower = lower;
        v.upper = upper;
        Ok(())
    }

    /// Replaces the bounds of a constraint.
    pub fn set_constraint_bounds(
        &mut self,
        id: ConstraintId,
        lower: Option<f64>,
        upper: Option<f64>,
    ) -> Result<(), SolverError> {
        let c = self
            .constraints
            .get_mut(id.0)
            .ok_or(SolverError::UnknownConstraint(id.0))?;
        c.lower = lower;
        c.upper = upper;
        Ok(())
    }

    /// Sets the coefficient of `var` in a constraint, replacing any
    /// existing terms for that variable.
    pub fn set_coefficient(
        &mut self,
        id: ConstraintId,
        var: VarId,
        coefficient: f64,
    ) -> Result<(), SolverError> {
        if var.0 >= self.variables.len() {
            return Err(SolverError::UnknownVariable(var.0));
        }
        let c = self
            .constraints
            .get_mut(id.0)
            .ok_or(SolverError::UnknownConstraint(id.0))?;
        c.terms.retain(|(v, _)| *v != var);
        if coefficient != 0.0 {
            c.terms.push((var, coefficient));
        }
        Ok(())
    }

    /// Row activity `Σ coeff·x` of a constraint at `values`.
    pub fn activity(&self, id: ConstraintId, values: &[f64]) -> Result<f64, SolverError> {
        let c = self.constraint(id)?;
        c.terms.iter().try_fold(0.0, |acc, (v, coeff)| {
            values
                .get(v.0)
                .map(|x| acc + coeff * x)
                .ok_or(SolverError::UnknownVariable(v.0))
        })
    }

    /// Objective value at `values`.
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.variables
            .iter()
            .zip(values)
            .map(|(v, x)| v.objective * x)
            .sum()
    }

    /// `true` if `other` has the same variables and constraints, by name,
    /// kind and sparsity, regardless of numeric data.
    pub fn same_structure(&self, other: &Problem) -> bool {
        self.sense == other.sense
            && self.variables.len() == other.variables.len()
            && self.constraints.len() == other.constraints.len()
            && self
                .variables
                .iter()
                .zip(&other.variables)
                .all(|(a, b)| a.name == b.name && a.integer == b.integer)
            && self
                .constraints
                .iter()
                .zip(&other.constraints)
                .all(|(a, b)| {
                    a.name == b.name
                        && a.terms.len() == b.terms.len()
                        && a.terms.iter().zip(&b.terms).all(|(x, y)| x.0 == y.0)
                })
    }

    /// Checks that the problem is well formed.
    ///
    /// # Errors
    /// Returns [`SolverError::InvalidProblem`] for non-finite data, crossed
    /// bounds or duplicate names, and [`SolverError::UnknownVariable`] for
    /// terms that reference missing variables.
    pub fn validate(&self) -> Result<(), SolverError> {
        let invalid = |detail: String| SolverError::InvalidProblem {
            problem: self.name.clone(),
            detail,
        };

        let mut names = HashSet::new();
        for v in &self.variables {
            if !names.insert(v.name.as_str()) {
                return Err(invalid(format!("duplicate variable name '{}'", v.name)));
            }
            if !v.lower.is_finite() || !v.objective.is_finite() {
                return Err(invalid(format!(
                    "variable '{}' has a non-finite lower bound or objective",
                    v.name
                )));
            }
            match v.upper {
                Some(u) if !u.is_finite() => {
                    return Err(invalid(format!("variable '{}' has a non-finite upper bound", v.name)))
                }
                Some(u) if u < v.lower => {
                    return Err(invalid(format!(
                        "variable '{}' has upper bound {u} below lower bound {}",
                        v.name, v.lower
                    )))
                }
                _ => {}
            }
        }

        let mut names = HashSet::new();
        for c in &self.constraints {
            if !names.insert(c.name.as_str()) {
                return Err(invalid(format!("duplicate constraint name '{}'", c.name)));
            }
            for (var, coeff) in &c.terms {
                if var.0 >= self.variables.len() {
                    return Err(SolverError::UnknownVariable(var.0));
                }
                if !coeff.is_finite() {
                    return Err(invalid(format!(
                        "constraint '{}' has a non-finite coefficient",
                        c.name
                    )));
                }
            }
            if c.lower.is_some_and(|l| !l.is_finite()) || c.upper.is_some_and(|u| !u.is_finite()) {
                return Err(invalid(format!("constraint '{}' has a non-finite bound", c.name)));
            }
            if let (Some(l), Some(u)) = (c.lower, c.upper) {
                if u < l {
                    return Err(invalid(format!(
                        "constraint '{}' has upper bound {u} below lower bound {l}",
                        c.name
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Problem {
        let mut p = Problem::new("small", Sense::Maximize);
        let x = p.add_binary("x", 1.0);
        let y = p.add_variable("y", 0.0, Some(4.0), false, 2.0);
        p.add_constraint("cap", vec![(x, 1.0), (y, 0.5)], None, Some(2.0));
        p
    }

    #[test]
    fn test_lookup_by_name() {
        let p = small();
        assert_eq!(p.variable_by_name("y"), Some(VarId(1)));
        assert_eq!(p.constraint_by_name("cap"), Some(ConstraintId(0)));
        assert!(p.variable_by_name("z").is_none());
        assert!(p.variables[0].is_binary());
    }

    #[test]
    fn test_activity_and_objective() {
        let p = small();
        let values = [1.0, 2.0];
        assert_eq!(p.activity(ConstraintId(0), &values).unwrap(), 2.0);
        assert_eq!(p.objective_value(&values), 5.0);
        assert!(p.activity(ConstraintId(3), &values).is_err());
    }

    #[test]
    fn test_set_coefficient_replaces_terms() {
        let mut p = small();
        p.set_coefficient(ConstraintId(0), VarId(1), 3.0).unwrap();
        assert_eq!(p.constraints[0].coefficient(VarId(1)), 3.0);
        p.set_coefficient(ConstraintId(0), VarId(1), 0.0).unwrap();
        assert_eq!(p.constraints[0].terms.len(), 1);
        assert!(p.set_coefficient(ConstraintId(0), VarId(9), 1.0).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_data() {
        let mut p = small();
        assert!(p.validate().is_ok());

        p.add_binary("x", 0.0);
        assert!(matches!(p.validate(), Err(SolverError::InvalidProblem { .. })));

        let mut p = small();
        p.set_variable_bounds(VarId(1), 3.0, Some(1.0)).unwrap();
        assert!(p.validate().is_err());

        let mut p = small();
        p.add_constraint("bad", vec![(VarId(7), 1.0)], None, Some(1.0));
        assert!(matches!(p.validate(), Err(SolverError::UnknownVariable(7))));

        let mut p = small();
        p.set_objective(VarId(0), f64::NAN).unwrap();
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_clone_is_independent() {
        let original = small();
        let mut copy = original.clone();
        copy.set_constraint_bounds(ConstraintId(0), None, Some(10.0))
            .unwrap();
        assert_eq!(original.constraints[0].upper, Some(2.0));
        assert!(original.same_structure(&copy));

        copy.add_binary("extra", 1.0);
        assert!(!original.same_structure(&copy));
    }

    #[test]
    fn test_serde_roundtrip() {
        let p = small();
        let json = serde_json::to_string(&p).unwrap();
        let back: Problem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
