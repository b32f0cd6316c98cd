use crate::auth::AuthError;
use crate::dht::SensorError;
use crate::gas::GasError;
use crate::sequence::StoreError;
use crate::transport::TransportError;

/// Everything that can end a measurement cycle early. None of these are fatal
/// to the node: the cycle is abandoned and the node goes back to sleep.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("sensor: {0}")]
    Sensor(#[from] SensorError),
    #[error("gas estimate: {0}")]
    Gas(#[from] GasError),
    #[error("auth: {0}")]
    Auth(#[from] AuthError),
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
    #[error("sequence: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameError;

    #[test]
    fn frame_rejection_surfaces_through_auth() {
        let err = Error::from(AuthError::from(FrameError::UnsupportedVersion(9)));
        assert!(matches!(
            err,
            Error::Auth(AuthError::Frame(FrameError::UnsupportedVersion(9)))
        ));
        assert_eq!(
            err.to_string(),
            "auth: authenticated frame rejected: unsupported protocol version 9"
        );
    }
}
