use super::propagate_ellipse;
use crate::common::constants::PI2;
use crate::domain::{ModelError, ModelResult, Plane};
use crate::numerics::{LuError, dense_from_rows, lu_solve};
use crate::phase::{PhaseMatrix, PhaseVector, block_determinant, block_trace};
use crate::probe::Twiss;
use crate::scenario::{DEFAULT_STABILITY_TOLERANCE, Trajectory};
use num_complex::Complex64;
use serde::Serialize;
use tracing::debug;

/// Classification of a one-turn plane block by its trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Stability {
    Stable { phase_advance: f64 },
    Marginal { trace: f64 },
    Unstable { trace: f64 },
}

impl Stability {
    pub fn classify(trace: f64, m01: f64, tolerance: f64) -> Self {
        let distance = trace.abs() - 2.0;
        if distance < -tolerance {
            let mut phase_advance = (trace / 2.0).acos();
            if m01 < 0.0 {
                phase_advance = PI2 - phase_advance;
            }
            Self::Stable { phase_advance }
        } else if distance.abs() <= tolerance {
            Self::Marginal { trace }
        } else {
            Self::Unstable { trace }
        }
    }

    pub const fn is_stable(&self) -> bool {
        matches!(self, Self::Stable { .. })
    }
}

/// Periodic optics at one recorded state of a ring trajectory.
///
/// Plane functions are `None` when that plane is not stable; orbit and
/// dispersion are `None` when their fixed-point solve is singular.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RingPoint {
    pub element_id: String,
    pub position: f64,
    pub twiss_x: Option<Twiss>,
    pub twiss_y: Option<Twiss>,
    pub phase_x: Option<f64>,
    pub phase_y: Option<f64>,
    pub dispersion_x: Option<f64>,
    pub closed_orbit: Option<PhaseVector>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RingSummary {
    pub circumference: f64,
    pub stability_x: Stability,
    pub stability_y: Stability,
    pub tune_x: Option<f64>,
    pub tune_y: Option<f64>,
    pub full_tune_x: Option<f64>,
    pub full_tune_y: Option<f64>,
    pub closed_orbit: Option<PhaseVector>,
    pub dispersion: Option<[f64; 2]>,
    pub points: Vec<RingPoint>,
}

impl RingSummary {
    pub const fn is_stable(&self) -> bool {
        self.stability_x.is_stable() && self.stability_y.is_stable()
    }
}

/// Periodic solution of a ring whose one-turn map is the trajectory's final map.
///
/// Nothing is cached: every query recomputes from the borrowed trajectory.
#[derive(Debug, Clone, Copy)]
pub struct RingOptics<'a> {
    trajectory: &'a Trajectory,
    tolerance: f64,
}

impl<'a> RingOptics<'a> {
    pub fn new(trajectory: &'a Trajectory) -> Self {
        Self::with_tolerance(trajectory, DEFAULT_STABILITY_TOLERANCE)
    }

    pub fn with_tolerance(trajectory: &'a Trajectory, tolerance: f64) -> Self {
        Self {
            trajectory,
            tolerance,
        }
    }

    pub fn trajectory(&self) -> &'a Trajectory {
        self.trajectory
    }

    pub fn one_turn_map(&self) -> PhaseMatrix {
        self.trajectory.final_map()
    }

    /// One-turn map starting at state `index`: `Phi_i M Phi_i^-1`.
    pub fn one_turn_map_at(&self, index: usize) -> ModelResult<PhaseMatrix> {
        let to_state = self.trajectory.transfer_map_between(0, index)?;
        let from_state = to_state
            .inverse()
            .map_err(|error| singular("RING.ONE_TURN_AT", error))?;
        Ok(to_state * self.one_turn_map() * from_state)
    }

    pub fn stability(&self, plane: Plane) -> Stability {
        let block = self.one_turn_map().plane_block(plane);
        Stability::classify(block_trace(&block), block[0][1], self.tolerance)
    }

    /// One-turn betatron phase advance in (0, 2 pi).
    pub fn phase_advance(&self, plane: Plane) -> ModelResult<f64> {
        match self.stability(plane) {
            Stability::Stable { phase_advance } => Ok(phase_advance),
            Stability::Marginal { trace } => Err(ModelError::unstable(
                "RING.MARGINAL",
                format!("{plane} plane is marginally stable (trace {trace})"),
            )),
            Stability::Unstable { trace } => Err(ModelError::unstable(
                "RING.UNSTABLE",
                format!("{plane} plane is unstable (trace {trace})"),
            )),
        }
    }

    /// Fractional tune in [0, 1).
    pub fn fractional_tune(&self, plane: Plane) -> ModelResult<f64> {
        Ok(self.phase_advance(plane)? / PI2)
    }

    /// Periodic ellipse at the ring start; emittance is left at zero.
    pub fn periodic_twiss(&self, plane: Plane) -> ModelResult<Twiss> {
        let mu = self.phase_advance(plane)?;
        let block = self.one_turn_map().plane_block(plane);
        let sin_mu = mu.sin();
        Ok(Twiss::new(
            block[0][1] / sin_mu,
            (block[0][0] - block[1][1]) / (2.0 * sin_mu),
            0.0,
        ))
    }

    /// Periodic ellipse and accumulated phase at every recorded state.
    pub fn lattice_functions(&self, plane: Plane) -> ModelResult<Vec<(Twiss, f64)>> {
        let initial = self.periodic_twiss(plane)?;
        Ok(propagate_ellipse(self.trajectory.states(), initial, plane))
    }

    pub fn twiss_at(&self, index: usize, plane: Plane) -> ModelResult<Twiss> {
        self.function_at(index, plane).map(|(twiss, _)| twiss)
    }

    pub fn twiss_at_element(&self, element_id: &str, plane: Plane) -> ModelResult<Twiss> {
        self.twiss_at(self.trajectory.require_element(element_id)?, plane)
    }

    /// Betatron phase accumulated from the ring start to state `index`.
    pub fn phase_at(&self, index: usize, plane: Plane) -> ModelResult<f64> {
        self.function_at(index, plane).map(|(_, phase)| phase)
    }

    pub fn phase_advance_between(
        &self,
        from_id: &str,
        to_id: &str,
        plane: Plane,
    ) -> ModelResult<f64> {
        let from = self.trajectory.require_element(from_id)?;
        let to = self.trajectory.require_element(to_id)?;
        let functions = self.lattice_functions(plane)?;
        Ok(functions[to].1 - functions[from].1)
    }

    /// Integer and fractional tune from the phase accumulated over one turn.
    pub fn full_tune(&self, plane: Plane) -> ModelResult<f64> {
        let functions = self.lattice_functions(plane)?;
        Ok(functions.last().map_or(0.0, |(_, phase)| *phase) / PI2)
    }

    /// Roots of `lambda^2 - Tr lambda + det = 0` for the plane block.
    pub fn eigenvalues(&self, plane: Plane) -> [Complex64; 2] {
        let block = self.one_turn_map().plane_block(plane);
        let half_trace = block_trace(&block) / 2.0;
        let discriminant = half_trace * half_trace - block_determinant(&block);
        let root = Complex64::new(discriminant, 0.0).sqrt();
        let centre = Complex64::new(half_trace, 0.0);
        [centre + root, centre - root]
    }

    /// Fixed point of the transverse one-turn map at the ring start (on momentum).
    pub fn closed_orbit(&self) -> ModelResult<PhaseVector> {
        let map = self.one_turn_map();
        let mut rows = [[0.0; 4]; 4];
        let mut rhs = [0.0; 4];
        for row in 0..4 {
            for col in 0..4 {
                let identity = if row == col { 1.0 } else { 0.0 };
                rows[row][col] = identity - map[(row, col)];
            }
            rhs[row] = map[(row, 6)];
        }

        let solution = lu_solve(&dense_from_rows(&rows), &rhs)
            .map_err(|error| singular("RING.CLOSED_ORBIT", error))?;
        debug!(
            x = solution[0],
            xp = solution[1],
            y = solution[2],
            yp = solution[3],
            "closed orbit solved"
        );
        Ok(PhaseVector::from_coordinates(
            solution[0],
            solution[1],
            solution[2],
            solution[3],
            0.0,
            0.0,
        ))
    }

    pub fn closed_orbit_at(&self, index: usize) -> ModelResult<PhaseVector> {
        let start = self.closed_orbit()?;
        Ok(self.trajectory.transfer_map_between(0, index)?.apply_to(&start))
    }

    /// Periodic horizontal dispersion `(eta, eta')` at the ring start.
    pub fn dispersion(&self) -> ModelResult<[f64; 2]> {
        let map = self.one_turn_map();
        let rows = [
            [1.0 - map[(0, 0)], -map[(0, 1)]],
            [-map[(1, 0)], 1.0 - map[(1, 1)]],
        ];
        let rhs = [map[(0, 5)], map[(1, 5)]];
        let solution = lu_solve(&dense_from_rows(&rows), &rhs)
            .map_err(|error| singular("RING.DISPERSION", error))?;
        Ok([solution[0], solution[1]])
    }

    pub fn dispersion_at(&self, index: usize) -> ModelResult<[f64; 2]> {
        let [eta, eta_prime] = self.dispersion()?;
        let map = self.trajectory.transfer_map_between(0, index)?;
        Ok([
            map[(0, 0)] * eta + map[(0, 1)] * eta_prime + map[(0, 5)],
            map[(1, 0)] * eta + map[(1, 1)] * eta_prime + map[(1, 5)],
        ])
    }

    /// Tunes, closed orbit and periodic functions at every element exit.
    ///
    /// Never fails on stability: a plane that is not stable keeps its
    /// classification and reports no optics.
    pub fn summary(&self) -> ModelResult<RingSummary> {
        let functions_x = self.lattice_functions(Plane::X).ok();
        let functions_y = self.lattice_functions(Plane::Y).ok();
        let closed_orbit = self.closed_orbit().ok();
        let dispersion = self.dispersion().ok();
        debug!(
            plane_x = functions_x.is_some(),
            plane_y = functions_y.is_some(),
            closed_orbit = closed_orbit.is_some(),
            dispersion = dispersion.is_some(),
            "ring summary optics available"
        );

        let at = |functions: &Option<Vec<(Twiss, f64)>>, index: usize| {
            functions.as_ref().and_then(|values| values.get(index).copied())
        };
        let full_tune = |functions: &Option<Vec<(Twiss, f64)>>| {
            functions
                .as_ref()
                .map(|values| values.last().map_or(0.0, |(_, phase)| *phase) / PI2)
        };

        let mut points = Vec::new();
        for (index, state) in self.trajectory.element_states() {
            let to_state = self.trajectory.transfer_map_between(0, index)?;
            let (x, y) = (at(&functions_x, index), at(&functions_y, index));
            points.push(RingPoint {
                element_id: state.element_id.clone(),
                position: state.position,
                twiss_x: x.map(|(twiss, _)| twiss),
                twiss_y: y.map(|(twiss, _)| twiss),
                phase_x: x.map(|(_, phase)| phase),
                phase_y: y.map(|(_, phase)| phase),
                dispersion_x: dispersion.map(|[eta, eta_prime]| {
                    to_state[(0, 0)] * eta + to_state[(0, 1)] * eta_prime + to_state[(0, 5)]
                }),
                closed_orbit: closed_orbit.map(|orbit| to_state.apply_to(&orbit)),
            });
        }

        Ok(RingSummary {
            circumference: self.trajectory.length(),
            stability_x: self.stability(Plane::X),
            stability_y: self.stability(Plane::Y),
            tune_x: self.fractional_tune(Plane::X).ok(),
            tune_y: self.fractional_tune(Plane::Y).ok(),
            full_tune_x: full_tune(&functions_x),
            full_tune_y: full_tune(&functions_y),
            closed_orbit,
            dispersion,
            points,
        })
    }

    fn function_at(&self, index: usize, plane: Plane) -> ModelResult<(Twiss, f64)> {
        let functions = self.lattice_functions(plane)?;
        functions.get(index).copied().ok_or_else(|| {
            ModelError::construction(
                "TRAJECTORY.INDEX",
                format!(
                    "state index {index} outside trajectory of {} states",
                    functions.len()
                ),
            )
        })
    }
}

fn singular(placeholder: &'static str, error: LuError) -> ModelError {
    ModelError::singular_solve(placeholder, error.to_string())
}
