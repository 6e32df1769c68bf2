use core::fmt::{Debug, Display};
use micosi_concepts::*;

macro_rules! impl_error_variant {
    ($name: ident, $($err_var: ident),+) => {
        // Implement Display for ErrorVariant
        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        $name::$err_var(message) => write!(f, "{}", message),
                    )+
                }
            }
        }
    }
}

macro_rules! impl_from_error {
    ($name: ident, $(($err_var: ident, $err_type: ty)),+) => {
        $(
            // Implement conversion from error to errorvariant
            impl From<$err_type> for $name {
                fn from(err: $err_type) -> Self {
                    $name::$err_var(err)
                }
            }
        )+
    }
}

/// Errors related to reading and writing stored simulations.
#[derive(Debug)]
pub enum StorageError {
    /// Error related to file operations
    IoError(std::io::Error),
    /// Low-level XML reader or writer error
    QuickXmlError(quick_xml::Error),
    /// Could not deserialize an XML document into the requested type
    XmlDeserializeError(quick_xml::DeError),
    /// Could not serialize a value as XML
    XmlSerializeError(quick_xml::SeError),
    /// The file does not follow the container layout or its content is inconsistent
    FormatError(String),
    /// Version or build flags of the file differ from the running program
    VersionError(VersionError),
    /// The file is used by another simulation or was never locked
    LockError(String),
    /// Requested time layer does not exist
    IndexError(IndexError),
    /// Stored simulation parameters could not be applied
    ParamsError(ParamsError),
    /// Stored generator state could not be restored
    RngError(RngError),
    /// Errors when parsing numbers from text
    ParseIntError(std::num::ParseIntError),
}

impl_from_error! {StorageError,
    (IoError, std::io::Error),
    (QuickXmlError, quick_xml::Error),
    (XmlDeserializeError, quick_xml::DeError),
    (XmlSerializeError, quick_xml::SeError),
    (VersionError, VersionError),
    (IndexError, IndexError),
    (ParamsError, ParamsError),
    (RngError, RngError),
    (ParseIntError, std::num::ParseIntError)
}

impl_error_variant! {StorageError,
    IoError,
    QuickXmlError,
    XmlDeserializeError,
    XmlSerializeError,
    FormatError,
    VersionError,
    LockError,
    IndexError,
    ParamsError,
    RngError,
    ParseIntError
}

impl std::error::Error for StorageError {}

impl From<quick_xml::events::attributes::AttrError> for StorageError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        StorageError::QuickXmlError(quick_xml::Error::from(err))
    }
}

/// Covers all errors that can occur while running a simulation.
/// The errors are listed from very likely to be a user error to almost certainly an internal error.
#[derive(Debug)]
pub enum SimulationError {
    // Very likely to be user errors
    /// Cells or the simulator could not be set up
    SetupError(SetupError),
    /// Invalid parameters
    ParamsError(ParamsError),
    /// Generator states could not be derived
    RngError(RngError),
    /// Iterating a simulation which is already finished
    StateError(String),

    // Less likely but possible to be user errors
    /// Saving or loading failed
    StorageError(StorageError),
    /// Progress bar could not be created or updated
    ProgressError(String),
    /// General calculation error
    CalcError(CalcError),

    // Highly unlikely to be user errors
    /// Information missing at an expected place
    IndexError(IndexError),
    /// Error related to file operations
    IoError(std::io::Error),
    /// Worker pool could not be built
    ThreadingError(rayon::ThreadPoolBuildError),
}

impl_from_error! {SimulationError,
    (SetupError, SetupError),
    (ParamsError, ParamsError),
    (RngError, RngError),
    (StorageError, StorageError),
    (CalcError, CalcError),
    (IndexError, IndexError),
    (IoError, std::io::Error),
    (ThreadingError, rayon::ThreadPoolBuildError)
}

impl_error_variant! {SimulationError,
    SetupError,
    ParamsError,
    RngError,
    StateError,
    StorageError,
    ProgressError,
    CalcError,
    IndexError,
    IoError,
    ThreadingError
}

impl std::error::Error for SimulationError {}

#[cfg(test)]
mod test_errors {
    use super::*;

    #[test]
    fn display_forwards_message() {
        let err = SimulationError::from(SetupError("cannot initialize".into()));
        assert_eq!(format!("{err}"), "cannot initialize");
        let err = StorageError::FormatError("bad chunk".into());
        assert_eq!(format!("{err}"), "bad chunk");
    }

    #[test]
    fn storage_error_nests() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read");
        let err: SimulationError = StorageError::from(io).into();
        assert!(matches!(
            err,
            SimulationError::StorageError(StorageError::IoError(_))
        ));
        assert_eq!(format!("{err}"), "short read");
    }
}
