use dynarep::error::DynarepError;
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

/// Returns whether terminal output should include backtraces.
fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

pub type DeployerResult<T> = Result<T, DeployerError>;

/// Captured backtrace wrapper to avoid thiserror's unstable feature detection.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for the deployer binary.
///
/// Wraps [`DynarepError`] for deployment failures and adds the startup failures of the binary.
#[derive(Debug)]
pub enum DeployerError {
    /// Deployment or removal failure.
    Dynarep(DynarepError),
    /// Configuration or telemetry setup error.
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    /// I/O error.
    Io(std::io::Error, CapturedBacktrace),
}

impl DeployerError {
    /// Returns a short category label for this error.
    pub fn category(&self) -> &'static str {
        match self {
            DeployerError::Dynarep(_) => "deployment error",
            DeployerError::Config(_, _) => "configuration error",
            DeployerError::Io(_, _) => "i/o error",
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            DeployerError::Dynarep(err) => err.backtrace(),
            DeployerError::Config(_, cb) => Some(&cb.0),
            DeployerError::Io(_, cb) => Some(&cb.0),
        }
    }

    /// Creates a configuration error from any source.
    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        DeployerError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    /// Returns a user-oriented report for terminal output.
    ///
    /// Aggregated deployment errors list every failed region through their display output, so
    /// the cause chain is only walked for single errors.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("deployer failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {}\n", self));

        if !matches!(self, DeployerError::Dynarep(err) if err.errors().is_some()) {
            let mut source = Error::source(self);
            let mut idx = 1usize;
            while let Some(err) = source {
                out.push_str(&format!("cause {idx}: {err}\n"));
                source = err.source();
                idx += 1;
            }
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for DeployerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployerError::Dynarep(err) => write!(f, "{err}"),
            DeployerError::Config(source, _) => write!(f, "configuration error: {source}"),
            DeployerError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for DeployerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DeployerError::Dynarep(err) => err.source(),
            DeployerError::Config(source, _) => Some(source.as_ref()),
            DeployerError::Io(source, _) => Some(source),
        }
    }
}

impl From<DynarepError> for DeployerError {
    fn from(err: DynarepError) -> Self {
        DeployerError::Dynarep(err)
    }
}

impl From<std::io::Error> for DeployerError {
    fn from(err: std::io::Error) -> Self {
        DeployerError::Io(err, CapturedBacktrace::capture())
    }
}
