use core::fmt::Display;
use std::error::Error;

use crate::version::{CompilationFlags, Version};

macro_rules! define_errors {
    ($(($err_name: ident, $err_descr: expr)),+) => {
        $(
            #[doc = $err_descr]
            #[derive(Debug, Clone, PartialEq)]
            pub struct $err_name(
                #[doc = "Error message associated with "]
                #[doc = stringify!($err_name)]
                #[doc = " error type."]
                pub String,
            );

            impl Display for $err_name {
                fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl Error for $err_name {}

            impl From<String> for $err_name {
                fn from(value: String) -> Self {
                    $err_name(value)
                }
            }

            impl From<&str> for $err_name {
                fn from(value: &str) -> Self {
                    $err_name(value.to_owned())
                }
            }
        )+
    }
}

define_errors!(
    (
        ParamsError,
        "Unknown parameter names, unparsable or out-of-range values and access violations"
    ),
    (
        RngError,
        "Malformed serialized generator states or exhausted substate generation"
    ),
    (CalcError, "General calculation error"),
    (
        IndexError,
        "Can occur internally when information is not present at expected place"
    ),
    (SetupError, "Occurs during setup of a new cell or simulation")
);

/// Mismatch between the running program and the producer of a stored file.
#[derive(Clone, Debug, PartialEq)]
pub enum VersionError {
    /// The file was written with another file format version.
    VersionConflict {
        /// Version of the running program
        current: Version,
        /// Version that wrote the file
        required: Version,
    },
    /// The file was written by a build with other precision or generator flags.
    CompilationConflict {
        /// Flags of the running program
        current: CompilationFlags,
        /// Flags of the build that wrote the file
        required: CompilationFlags,
    },
}

impl Display for VersionError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            VersionError::VersionConflict { current, required } => {
                let direction = if current < required {
                    "upgrade"
                } else {
                    "downgrade"
                };
                write!(
                    f,
                    "version conflict: program version is {current}, file requires {required} \
                    ({direction} the program)"
                )
            }
            VersionError::CompilationConflict { current, required } => write!(
                f,
                "compilation conflict: program was built with \"{current}\", \
                file requires \"{required}\""
            ),
        }
    }
}

impl Error for VersionError {}

impl From<SetupError> for CalcError {
    fn from(value: SetupError) -> Self {
        CalcError(format!("{}", value))
    }
}

impl From<ParamsError> for SetupError {
    fn from(value: ParamsError) -> Self {
        SetupError(format!("{}", value))
    }
}

impl From<RngError> for SetupError {
    fn from(value: RngError) -> Self {
        SetupError(format!("{}", value))
    }
}
