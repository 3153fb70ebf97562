// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Dense two-phase primal simplex for the LP relaxation.
//!
//! Every variable is shifted to `x = lower + y` with `y ≥ 0`, and every
//! row becomes `Σ a·y ≤ b`:
//!
//! ```text
//! constraint upper u   →   a·y ≤ u − a·lower
//! constraint lower l   →  −a·y ≤ −(l − a·lower)
//! variable upper  U    →     y ≤ U − lower
//! ```
//!
//! Each row gets a slack; rows with `b < 0` are negated and get an
//! artificial variable that phase 1 drives to zero. Pivoting uses Bland's
//! rule (lowest index enters, lowest basic index breaks ratio ties), which
//! cannot cycle.

use crate::{BasisStatus, Problem};

const PIVOT_EPS: f64 = 1e-9;
const FEAS_EPS: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LpStatus {
    Optimal,
    Infeasible,
    Unbounded,
    IterationLimit,
}

/// Optimal LP relaxation in the problem's own sense.
#[derive(Debug, Clone)]
pub(crate) struct LpResult {
    pub status: LpStatus,
    pub iterations: u64,
    pub objective: f64,
    pub values: Vec<f64>,
    pub duals: Vec<f64>,
    pub reduced_costs: Vec<f64>,
    pub basis: Vec<BasisStatus>,
}

impl LpResult {
    fn failed(status: LpStatus, iterations: u64) -> Self {
        Self {
            status,
            iterations,
            objective: 0.0,
            values: Vec::new(),
            duals: Vec::new(),
            reduced_costs: Vec::new(),
            basis: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum RowOrigin {
    Upper(usize),
    Lower(usize),
    Bound(usize),
}

struct Tableau {
    rows: Vec<Vec<f64>>,
    obj: Vec<f64>,
    basis: Vec<usize>,
    rhs: usize,
}

enum Stop {
    Unbounded,
    IterationLimit,
}

impl Tableau {
    fn pivot(&mut self, r: usize, c: usize) {
        let p = self.rows[r][c];
        for v in self.rows[r].iter_mut() {
            *v /= p;
        }
        let pivot_row = self.rows[r].clone();
        for (i, row) in self.rows.iter_mut().enumerate() {
            if i == r {
                continue;
            }
            let f = row[c];
            if f != 0.0 {
                for (v, pv) in row.iter_mut().zip(&pivot_row) {
                    *v -= f * pv;
                }
            }
        }
        let f = self.obj[c];
        if f != 0.0 {
            for (v, pv) in self.obj.iter_mut().zip(&pivot_row) {
                *v -= f * pv;
            }
        }
        self.basis[r] = c;
    }

    /// Maximises the current objective row over columns `< allowed`.
    fn run(&mut self, allowed: usize, iterations: &mut u64, max_iterations: u64) -> Result<(), Stop> {
        loop {
            let Some(enter) = (0..allowed).find(|&j| self.obj[j] > PIVOT_EPS) else {
                return Ok(());
            };
            if *iterations >= max_iterations {
                return Err(Stop::IterationLimit);
            }

            let mut leave: Option<(usize, f64)> = None;
            for (i, row) in self.rows.iter().enumerate() {
                let a = row[enter];
                if a <= PIVOT_EPS {
                    continue;
                }
                let ratio = row[self.rhs] / a;
                leave = match leave {
                    None => Some((i, ratio)),
                    Some((best, best_ratio)) => {
                        if ratio < best_ratio - 1e-12
                            || ((ratio - best_ratio).abs() <= 1e-12 && self.basis[i] < self.basis[best])
                        {
                            Some((i, ratio))
                        } else {
                            Some((best, best_ratio))
                        }
                    }
                };
            }

            let Some((r, _)) = leave else {
                return Err(Stop::Unbounded);
            };
            self.pivot(r, enter);
            *iterations += 1;
        }
    }
}

/// Solves the LP relaxation of `problem` with the given per-variable bounds
/// (which override the problem's own, for branch-and-bound nodes).
pub(crate) fn solve_relaxation(
    problem: &Problem,
    lower: &[f64],
    upper: &[Option<f64>],
    max_iterations: u64,
) -> LpResult {
    let n = problem.num_variables();
    let sign = problem.sense.sign();

    // Dense constraint matrix, shared by row construction and reduced costs.
    let dense: Vec<Vec<f64>> = problem
        .constraints
        .iter()
        .map(|c| {
            let mut a = vec![0.0; n];
            for (v, coeff) in &c.terms {
                a[v.0] += coeff;
            }
            a
        })
        .collect();

    let mut row_coeffs: Vec<Vec<f64>> = Vec::new();
    let mut row_rhs: Vec<f64> = Vec::new();
    let mut origins: Vec<RowOrigin> = Vec::new();

    for (ci, c) in problem.constraints.iter().enumerate() {
        let a = &dense[ci];
        let shift: f64 = a.iter().zip(lower).map(|(aj, lj)| aj * lj).sum();
        if let Some(u) = c.upper {
            row_coeffs.push(a.clone());
            row_rhs.push(u - shift);
            origins.push(RowOrigin::Upper(ci));
        }
        if let Some(l) = c.lower {
            row_coeffs.push(a.iter().map(|v| -v).collect());
            row_rhs.push(-(l - shift));
            origins.push(RowOrigin::Lower(ci));
        }
    }
    for j in 0..n {
        if let Some(u) = upper[j] {
            if u < lower[j] - FEAS_EPS {
                return LpResult::failed(LpStatus::Infeasible, 0);
            }
            let mut e = vec![0.0; n];
            e[j] = 1.0;
            row_coeffs.push(e);
            row_rhs.push((u - lower[j]).max(0.0));
            origins.push(RowOrigin::Bound(j));
        }
    }

    let m = row_coeffs.len();
    let n_art = row_rhs.iter().filter(|b| **b < 0.0).count();
    let width = n + m + n_art + 1;
    let rhs = width - 1;

    let mut tableau = Tableau {
        rows: Vec::with_capacity(m),
        obj: vec![0.0; width],
        basis: Vec::with_capacity(m),
        rhs,
    };
    let mut next_art = n + m;
    for (i, (coeffs, b)) in row_coeffs.iter().zip(&row_rhs).enumerate() {
        let mut row = vec![0.0; width];
        if *b >= 0.0 {
            row[..n].copy_from_slice(coeffs);
            row[n + i] = 1.0;
            row[rhs] = *b;
            tableau.basis.push(n + i);
        } else {
            for (dst, src) in row[..n].iter_mut().zip(coeffs) {
                *dst = -src;
            }
            row[n + i] = -1.0;
            row[next_art] = 1.0;
            row[rhs] = -b;
            tableau.basis.push(next_art);
            next_art += 1;
        }
        tableau.rows.push(row);
    }

    let mut iterations = 0u64;

    // Phase 1: maximise −Σ artificials.
    if n_art > 0 {
        for j in n + m..n + m + n_art {
            tableau.obj[j] = -1.0;
        }
        for i in 0..m {
            if tableau.basis[i] >= n + m {
                for (o, v) in tableau.obj.iter_mut().zip(&tableau.rows[i]) {
                    *o += v;
                }
            }
        }
        match tableau.run(width - 1, &mut iterations, max_iterations) {
            Ok(()) => {}
            Err(Stop::IterationLimit) => return LpResult::failed(LpStatus::IterationLimit, iterations),
            // Phase 1 is bounded above by zero.
            Err(Stop::Unbounded) => return LpResult::failed(LpStatus::Infeasible, iterations),
        }
        if tableau.obj[rhs] > FEAS_EPS {
            return LpResult::failed(LpStatus::Infeasible, iterations);
        }
        for r in 0..m {
            if tableau.basis[r] >= n + m {
                if let Some(c) = (0..n + m).find(|&j| tableau.rows[r][j].abs() > PIVOT_EPS) {
                    tableau.pivot(r, c);
                }
            }
        }
    }

    // Phase 2: original objective in maximisation form.
    tableau.obj.iter_mut().for_each(|v| *v = 0.0);
    for (j, var) in problem.variables.iter().enumerate() {
        tableau.obj[j] = sign * var.objective;
    }
    for i in 0..m {
        let b = tableau.basis[i];
        let cost = if b < n { tableau.obj[b] } else { 0.0 };
        if cost != 0.0 {
            let row = tableau.rows[i].clone();
            for (o, v) in tableau.obj.iter_mut().zip(&row) {
                *o -= cost * v;
            }
        }
    }
    match tableau.run(n + m, &mut iterations, max_iterations) {
        Ok(()) => {}
        Err(Stop::IterationLimit) => return LpResult::failed(LpStatus::IterationLimit, iterations),
        Err(Stop::Unbounded) => return LpResult::failed(LpStatus::Unbounded, iterations),
    }

    // Primal values.
    let mut y = vec![0.0; n];
    let mut is_basic = vec![false; n + m];
    for (i, &b) in tableau.basis.iter().enumerate() {
        if b < n + m {
            is_basic[b] = true;
        }
        if b < n {
            y[b] = tableau.rows[i][rhs].max(0.0);
        }
    }
    let values: Vec<f64> = (0..n).map(|j| lower[j] + y[j]).collect();

    // Row duals in maximisation form, then per-constraint in problem sense.
    let mut duals = vec![0.0; problem.num_constraints()];
    let mut bound_row = vec![None; n];
    for (i, origin) in origins.iter().enumerate() {
        let row_dual = -tableau.obj[n + i];
        match *origin {
            RowOrigin::Upper(ci) => duals[ci] += sign * row_dual,
            RowOrigin::Lower(ci) => duals[ci] -= sign * row_dual,
            RowOrigin::Bound(j) => bound_row[j] = Some(n + i),
        }
    }

    let reduced_costs: Vec<f64> = (0..n)
        .map(|j| {
            let priced: f64 = dense.iter().zip(&duals).map(|(a, d)| a[j] * d).sum();
            problem.variables[j].objective - priced
        })
        .collect();

    let basis: Vec<BasisStatus> = (0..n)
        .map(|j| {
            let var = &problem.variables[j];
            if var.upper == Some(var.lower) {
                return BasisStatus::Fixed;
            }
            let at_upper = upper[j].is_some_and(|u| (values[j] - u).abs() <= FEAS_EPS)
                && bound_row[j].map_or(false, |s| !is_basic[s]);
            if at_upper {
                BasisStatus::AtUpper
            } else if !is_basic[j] {
                BasisStatus::AtLower
            } else {
                BasisStatus::Basic
            }
        })
        .collect();

    LpResult {
        status: LpStatus::Optimal,
        iterations,
        objective: problem.objective_value(&values),
        values,
        duals,
        reduced_costs,
        basis,
    }
}
