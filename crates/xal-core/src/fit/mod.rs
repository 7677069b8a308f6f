pub mod injection;
pub mod sinusoid;

pub use injection::{BetatronCoordinates, BetatronMapper};
pub use sinusoid::{
    FitError, MINIMUM_FIT_POINTS, SinusoidFit, SinusoidFitConfig, fit_damped_sinusoid,
};
