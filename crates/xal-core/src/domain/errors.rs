use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelErrorKind {
    Construction,
    Synchronization,
    Unstable,
    SingularSolve,
    FitNonConvergent,
    Cancelled,
}

impl ModelErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Construction => "ConstructionError",
            Self::Synchronization => "SyncError",
            Self::Unstable => "Unstable",
            Self::SingularSolve => "SingularSolve",
            Self::FitNonConvergent => "FitNonConvergent",
            Self::Cancelled => "Cancelled",
        }
    }

    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Construction => 2,
            Self::Synchronization => 3,
            Self::Unstable | Self::SingularSolve => 4,
            Self::FitNonConvergent => 5,
            Self::Cancelled => 6,
        }
    }
}

impl Display for ModelErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelError {
    kind: ModelErrorKind,
    placeholder: &'static str,
    message: String,
}

impl ModelError {
    pub fn new(kind: ModelErrorKind, placeholder: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            placeholder,
            message: message.into(),
        }
    }

    pub fn construction(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::Construction, placeholder, message)
    }

    pub fn synchronization(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::Synchronization, placeholder, message)
    }

    pub fn unstable(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::Unstable, placeholder, message)
    }

    pub fn singular_solve(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::SingularSolve, placeholder, message)
    }

    pub fn fit_non_convergent(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::FitNonConvergent, placeholder, message)
    }

    pub fn cancelled(placeholder: &'static str, message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::Cancelled, placeholder, message)
    }

    pub const fn kind(&self) -> ModelErrorKind {
        self.kind
    }

    pub const fn placeholder(&self) -> &'static str {
        self.placeholder
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.placeholder, self.message)
    }
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}", self.kind, self.placeholder, self.message)
    }
}

impl Error for ModelError {}
