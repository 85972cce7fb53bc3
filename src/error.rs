use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    /// Opening the catalog or the images root failed.
    #[display("startup failed")]
    Setup,
    #[display("could not read {_0}")]
    Input(#[error(not(source))] String),
    /// The catalog refused the request as given (invalid, missing or conflicting).
    #[display("request rejected")]
    Rejected,
    /// A transient failure; the same command may succeed later.
    #[display("command failed, try again")]
    Unavailable,
    #[display("command failed")]
    Command,
    #[display("could not write output")]
    Output,
}

impl ErrorKind {
    /// Process exit status reported for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Rejected => 2,
            Self::Config | Self::Input(_) => 78,
            Self::Unavailable => 75,
            Self::Setup | Self::Command | Self::Output => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::Rejected, 2)]
    #[case(ErrorKind::Unavailable, 75)]
    #[case(ErrorKind::Input("page.png".into()), 78)]
    #[case(ErrorKind::Command, 1)]
    fn test_exit_codes(#[case] kind: ErrorKind, #[case] expected: u8) {
        assert_eq!(kind.exit_code(), expected);
    }
}
