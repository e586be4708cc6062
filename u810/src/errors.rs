use crate::lifecycle::EndpointKind;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("out of transfer resources")]
    NoMemory,
    #[error("device is gone")]
    NoDevice,
    #[error("request cancelled")]
    Cancelled,
    #[error(transparent)]
    Backend(BoxError),
}

impl TransportError {
    pub fn backend<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Backend(err.into())
    }
}

#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct InputError(#[from] BoxError);

impl From<std::io::Error> for InputError {
    fn from(value: std::io::Error) -> Self {
        Self(Box::new(value))
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("orientation {0} is not one of 0 (normal), 1 (left), 2 (inverted), 3 (right)")]
    Orientation(i32),
    #[error("degenerate {axis} bounds: min {min} and max {max} leave a zero span")]
    DegenerateBounds { axis: char, min: i32, max: i32 },
}

#[derive(Debug, thiserror::Error)]
pub enum AttachError {
    #[error("expected one interrupt-in endpoint, found {count} endpoint(s){}", kind_suffix(.first))]
    ShapeMismatch {
        count: usize,
        first: Option<EndpointKind>,
    },
    #[error("endpoint max packet size {max_packet} is below the report length")]
    ShortEndpoint { max_packet: u16 },
    #[error("resource exhaustion while allocating the transfer: {0}")]
    ResourceExhaustion(#[source] TransportError),
    #[error("parameter store unavailable: {0}")]
    Params(#[source] BoxError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("input registration failed: {0}")]
    Register(#[source] InputError),
    #[error("could not arm the report request: {0}")]
    Arm(#[source] TransportError),
    #[error(transparent)]
    Transport(TransportError),
}

fn kind_suffix(kind: &Option<EndpointKind>) -> String {
    match kind {
        Some(kind) => format!(" (first is {kind})"),
        None => String::new(),
    }
}
