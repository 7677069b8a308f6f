use crate::common::constants::PI2;
use crate::domain::ModelError;
use crate::numerics::{LuError, dense_from_rows, lu_factorize, stable_mean, wrap_phase};
use rustfft::{FftPlanner, num_complex::Complex64};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

pub const MINIMUM_FIT_POINTS: usize = 8;
const PARAMETER_COUNT: usize = 5;
const ZERO_PADDING_FACTOR: usize = 8;
const DAMPING_LIMIT: f64 = 1.0e16;
const AMPLITUDE_INDEX: usize = 0;
const FREQUENCY_INDEX: usize = 1;
const PHASE_INDEX: usize = 2;
const SLOPE_INDEX: usize = 3;
const OFFSET_INDEX: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SinusoidFitConfig {
    pub max_iterations: usize,
    /// Relative chi-square decrease below which the refinement stops.
    pub tolerance: f64,
    /// Known rms noise per sample; 0 estimates it from the residuals.
    pub noise_level: f64,
}

impl Default for SinusoidFitConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1.0e-12,
            noise_level: 0.0,
        }
    }
}

/// Best fit of `A cos(2 pi f n + phase) exp(-slope n) + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SinusoidFit {
    /// Tune in [0, 0.5].
    pub frequency: f64,
    /// In (-pi, pi].
    pub phase: f64,
    pub slope: f64,
    pub amplitude: f64,
    pub offset: f64,
    pub frequency_variance: f64,
    pub slope_variance: f64,
    pub offset_variance: f64,
    pub amplitude_variance: f64,
    /// Not estimated.
    pub phase_variance: Option<f64>,
    pub iterations: usize,
    pub residual_rms: f64,
}

impl SinusoidFit {
    pub fn evaluate(&self, sample: f64) -> f64 {
        model(
            &[
                self.amplitude,
                self.frequency,
                self.phase,
                self.slope,
                self.offset,
            ],
            sample,
        )
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error("sinusoid fit needs at least {minimum} points, got {count}")]
    InsufficientPoints { count: usize, minimum: usize },
    #[error("degenerate signal: {0}")]
    DegenerateSignal(String),
    #[error("fit did not converge after {iterations} iterations (chi-square {chi_square:e})")]
    NotConverged { iterations: usize, chi_square: f64 },
}

impl From<FitError> for ModelError {
    fn from(error: FitError) -> Self {
        let placeholder = match error {
            FitError::InsufficientPoints { .. } => "FIT.INSUFFICIENT_POINTS",
            FitError::DegenerateSignal(_) => "FIT.DEGENERATE_SIGNAL",
            FitError::NotConverged { .. } => "FIT.NOT_CONVERGED",
        };
        ModelError::fit_non_convergent(placeholder, error.to_string())
    }
}

/// Fits a damped sinusoid to uniformly sampled turn-by-turn data.
///
/// Levenberg-Marquardt steps move frequency and slope; amplitude, phase and
/// offset are re-solved by linear least squares at every trial point.
pub fn fit_damped_sinusoid(
    signal: &[f64],
    config: &SinusoidFitConfig,
) -> Result<SinusoidFit, FitError> {
    let count = signal.len();
    if count < MINIMUM_FIT_POINTS {
        return Err(FitError::InsufficientPoints {
            count,
            minimum: MINIMUM_FIT_POINTS,
        });
    }
    if let Some(index) = signal.iter().position(|value| !value.is_finite()) {
        return Err(FitError::DegenerateSignal(format!(
            "sample {index} is not finite"
        )));
    }

    let mean = stable_mean(signal).unwrap_or(0.0);
    let centered: Vec<f64> = signal.iter().map(|value| value - mean).collect();
    let scale = signal.iter().fold(0.0_f64, |acc, value| acc.max(value.abs()));
    if centered.iter().all(|value| value.abs() <= f64::EPSILON * scale) {
        return Err(FitError::DegenerateSignal("signal is constant".to_string()));
    }

    let frequency = spectral_peak(&centered);
    let slope = half_signal_decay(&centered);
    let mut parameters = linear_estimate(signal, frequency, slope)?;
    debug!(
        frequency,
        slope,
        amplitude = parameters[AMPLITUDE_INDEX],
        "initial sinusoid estimate"
    );

    let floor = count as f64 * (1.0e-15 * scale).powi(2);
    let mut chi_square = chi_square_of(signal, &parameters);
    let mut damping = 1.0e-3;
    let mut iterations = 0;
    let mut converged = chi_square <= floor;

    while !converged && iterations < config.max_iterations {
        iterations += 1;
        let (normal, gradient) = normal_equations(signal, &parameters);

        let mut accepted = None;
        while damping <= DAMPING_LIMIT {
            if let Some(candidate) = damped_step(&normal, &gradient, damping)
                .ok()
                .and_then(|step| {
                    let frequency = parameters[FREQUENCY_INDEX] + step[FREQUENCY_INDEX];
                    let slope = parameters[SLOPE_INDEX] + step[SLOPE_INDEX];
                    linear_estimate(signal, frequency, slope).ok()
                })
            {
                let candidate_chi = chi_square_of(signal, &candidate);
                if candidate_chi < chi_square {
                    accepted = Some((candidate, candidate_chi));
                    break;
                }
            }
            damping *= 10.0;
        }

        let Some((candidate, candidate_chi)) = accepted else {
            // No downhill step at any damping: the fit is stationary.
            converged = true;
            break;
        };
        let decrease = chi_square - candidate_chi;
        let previous = chi_square;
        parameters = candidate;
        chi_square = candidate_chi;
        damping = (damping / 10.0).max(1.0e-12);
        trace!(iterations, chi_square, damping, "levenberg-marquardt step");

        converged = chi_square <= floor || decrease <= config.tolerance * previous;
    }

    if !converged {
        return Err(FitError::NotConverged {
            iterations,
            chi_square,
        });
    }

    canonicalize(&mut parameters);
    let degrees_of_freedom = (count - PARAMETER_COUNT) as f64;
    let noise_variance = if config.noise_level > 0.0 {
        config.noise_level * config.noise_level
    } else {
        chi_square / degrees_of_freedom
    };
    let variances = parameter_variances(signal, &parameters, noise_variance);

    Ok(SinusoidFit {
        frequency: parameters[FREQUENCY_INDEX],
        phase: parameters[PHASE_INDEX],
        slope: parameters[SLOPE_INDEX],
        amplitude: parameters[AMPLITUDE_INDEX],
        offset: parameters[OFFSET_INDEX],
        frequency_variance: variances[FREQUENCY_INDEX],
        slope_variance: variances[SLOPE_INDEX],
        offset_variance: variances[OFFSET_INDEX],
        amplitude_variance: variances[AMPLITUDE_INDEX],
        phase_variance: None,
        iterations,
        residual_rms: (chi_square / count as f64).sqrt(),
    })
}

fn model(parameters: &[f64; PARAMETER_COUNT], sample: f64) -> f64 {
    let [amplitude, frequency, phase, slope, offset] = *parameters;
    amplitude * (PI2 * frequency * sample + phase).cos() * (-slope * sample).exp() + offset
}

fn gradient_row(parameters: &[f64; PARAMETER_COUNT], sample: f64) -> [f64; PARAMETER_COUNT] {
    let [amplitude, frequency, phase, slope, _] = *parameters;
    let (sin, cos) = (PI2 * frequency * sample + phase).sin_cos();
    let envelope = (-slope * sample).exp();
    [
        cos * envelope,
        -amplitude * sin * envelope * PI2 * sample,
        -amplitude * sin * envelope,
        -sample * amplitude * cos * envelope,
        1.0,
    ]
}

fn chi_square_of(signal: &[f64], parameters: &[f64; PARAMETER_COUNT]) -> f64 {
    signal
        .iter()
        .enumerate()
        .map(|(index, value)| {
            let residual = value - model(parameters, index as f64);
            residual * residual
        })
        .sum()
}

/// `J^T J` and `J^T r` for the current parameters.
fn normal_equations(
    signal: &[f64],
    parameters: &[f64; PARAMETER_COUNT],
) -> ([[f64; PARAMETER_COUNT]; PARAMETER_COUNT], [f64; PARAMETER_COUNT]) {
    let mut normal = [[0.0; PARAMETER_COUNT]; PARAMETER_COUNT];
    let mut gradient = [0.0; PARAMETER_COUNT];
    for (index, value) in signal.iter().enumerate() {
        let sample = index as f64;
        let row = gradient_row(parameters, sample);
        let residual = value - model(parameters, sample);
        for i in 0..PARAMETER_COUNT {
            gradient[i] += row[i] * residual;
            for j in 0..PARAMETER_COUNT {
                normal[i][j] += row[i] * row[j];
            }
        }
    }
    (normal, gradient)
}

fn damped_step(
    normal: &[[f64; PARAMETER_COUNT]; PARAMETER_COUNT],
    gradient: &[f64; PARAMETER_COUNT],
    damping: f64,
) -> Result<Vec<f64>, LuError> {
    let mut augmented = *normal;
    for (index, row) in augmented.iter_mut().enumerate() {
        row[index] *= 1.0 + damping;
    }
    lu_factorize(&dense_from_rows(&augmented))?.solve(gradient)
}

/// Peak of the zero-padded power spectrum, refined by a parabola through its neighbours.
fn spectral_peak(centered: &[f64]) -> f64 {
    let padded = (centered.len() * ZERO_PADDING_FACTOR).next_power_of_two();
    let half = padded / 2;
    let mut spectrum: Vec<Complex64> = centered
        .iter()
        .map(|&value| Complex64::new(value, 0.0))
        .collect();
    spectrum.resize(padded, Complex64::new(0.0, 0.0));
    FftPlanner::<f64>::new()
        .plan_fft_forward(padded)
        .process(&mut spectrum);
    let power: Vec<f64> = spectrum[..=half].iter().map(|bin| bin.norm_sqr()).collect();

    let mut peak = 1;
    for bin in 2..=half {
        if power[bin] > power[peak] {
            peak = bin;
        }
    }

    if peak == half {
        // The mirrored parabola about Nyquist is flat, and at exactly 0.5 the
        // sine column vanishes; start one padded bin inside.
        return (half - 1) as f64 / padded as f64;
    }
    let (left, centre, right) = (power[peak - 1], power[peak], power[peak + 1]);
    let curvature = left - 2.0 * centre + right;
    let mut estimate = peak as f64;
    if curvature != 0.0 {
        estimate += 0.5 * (left - right) / curvature;
    }
    (estimate / padded as f64).clamp(0.0, 0.5)
}

/// Decay rate from the rms ratio of the two signal halves.
fn half_signal_decay(centered: &[f64]) -> f64 {
    let half = centered.len() / 2;
    let rms = |values: &[f64]| {
        (values.iter().map(|value| value * value).sum::<f64>() / values.len() as f64).sqrt()
    };
    let first = rms(&centered[..half]);
    let second = rms(&centered[half..2 * half]);
    if first > 0.0 && second > 0.0 {
        (first / second).ln() / half as f64
    } else {
        0.0
    }
}

/// Linear least squares for amplitude, phase and offset at fixed frequency and slope.
fn linear_estimate(
    signal: &[f64],
    frequency: f64,
    slope: f64,
) -> Result<[f64; PARAMETER_COUNT], FitError> {
    let mut normal = [[0.0; 3]; 3];
    let mut rhs = [0.0; 3];
    for (index, value) in signal.iter().enumerate() {
        let sample = index as f64;
        let (sin, cos) = (PI2 * frequency * sample).sin_cos();
        let envelope = (-slope * sample).exp();
        let basis = [cos * envelope, sin * envelope, 1.0];
        for i in 0..3 {
            rhs[i] += basis[i] * value;
            for j in 0..3 {
                normal[i][j] += basis[i] * basis[j];
            }
        }
    }

    let solution = lu_factorize(&dense_from_rows(&normal))
        .and_then(|lu| lu.solve(&rhs))
        .map_err(|error| {
            FitError::DegenerateSignal(format!("initial amplitude estimate failed: {error}"))
        })?;
    let (cosine, sine, offset) = (solution[0], solution[1], solution[2]);
    Ok([
        cosine.hypot(sine),
        frequency,
        (-sine).atan2(cosine),
        slope,
        offset,
    ])
}

/// Positive amplitude, frequency folded into [0, 0.5], phase wrapped to (-pi, pi].
fn canonicalize(parameters: &mut [f64; PARAMETER_COUNT]) {
    if parameters[AMPLITUDE_INDEX] < 0.0 {
        parameters[AMPLITUDE_INDEX] = -parameters[AMPLITUDE_INDEX];
        parameters[PHASE_INDEX] += std::f64::consts::PI;
    }
    let mut frequency = parameters[FREQUENCY_INDEX].rem_euclid(1.0);
    if frequency > 0.5 {
        frequency = 1.0 - frequency;
        parameters[PHASE_INDEX] = -parameters[PHASE_INDEX];
    }
    parameters[FREQUENCY_INDEX] = frequency;
    parameters[PHASE_INDEX] = wrap_phase(parameters[PHASE_INDEX]);
}

fn parameter_variances(
    signal: &[f64],
    parameters: &[f64; PARAMETER_COUNT],
    noise_variance: f64,
) -> [f64; PARAMETER_COUNT] {
    let (normal, _) = normal_equations(signal, parameters);
    let mut variances = [f64::NAN; PARAMETER_COUNT];
    if let Ok(inverse) = lu_factorize(&dense_from_rows(&normal)).and_then(|lu| lu.invert()) {
        for (index, variance) in variances.iter_mut().enumerate() {
            *variance = noise_variance * inverse[(index, index)];
        }
    }
    variances
}
