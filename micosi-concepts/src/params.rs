//! Registry of named simulation parameters.
//!
//! Every parameter carries a [Descriptor] with its default, an SI multiplier converting the
//! stored user unit into SI units, optional bounds and a flag marking it constant for the
//! lifetime of a simulation.
//!
//! | Access | Effect on setters |
//! |--------|-------------------|
//! | [Access::Initialize] | any in-bounds value is accepted |
//! | [Access::Update] | constant parameters reject values different from the current one |
//! | [Access::ReadOnly] | every change is rejected |
//!
//! ```
//! # use micosi_concepts::{Access, DoubleParam, SimParams};
//! let mut params = SimParams::new();
//! params.set_access(Access::Initialize);
//! params.import_props("dt = 0.5 # seconds\nT_END=10").unwrap();
//! assert_eq!(params.get_double(DoubleParam::Dt), 0.5);
//! assert_eq!(params.get_double(DoubleParam::TEnd), 10.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::ParamsError;
use crate::PI;

/// Static description of one parameter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Descriptor<T> {
    /// Lower-case name used in text formats
    pub name: &'static str,
    /// Whether the value must stay fixed once a simulation is running
    pub constant: bool,
    /// Default value in user units
    pub default: T,
    /// Factor converting the user unit into SI units
    pub si_multiplier: f64,
    /// Inclusive lower bound
    pub lower: Option<T>,
    /// Inclusive upper bound
    pub upper: Option<T>,
}

impl<T: PartialOrd + Copy + core::fmt::Display> Descriptor<T> {
    fn check_bounds(&self, value: T) -> Result<(), ParamsError> {
        let below = self.lower.is_some_and(|lo| !(value >= lo));
        let above = self.upper.is_some_and(|hi| !(value <= hi));
        if below || above {
            return Err(ParamsError(format!(
                "value {} of parameter \"{}\" is out of range [{}, {}]",
                value,
                self.name,
                self.lower.map_or("-inf".to_owned(), |v| v.to_string()),
                self.upper.map_or("inf".to_owned(), |v| v.to_string()),
            )));
        }
        Ok(())
    }
}

macro_rules! define_params {
    (
        $enum_name:ident, $value:ty, $count:ident,
        $(($variant:ident, $name:expr, $constant:expr, $default:expr, $si:expr, $lower:expr, $upper:expr)),+ $(,)?
    ) => {
        #[allow(missing_docs)]
        #[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
        pub enum $enum_name {
            $($variant,)+
        }

        /// Number of registered parameters of this kind.
        pub const $count: usize = [$($enum_name::$variant,)+].len();

        impl $enum_name {
            /// All parameters in registration order.
            pub const ALL: [$enum_name; $count] = [$($enum_name::$variant,)+];

            /// Static description of the parameter.
            pub fn descriptor(&self) -> Descriptor<$value> {
                match self {
                    $($enum_name::$variant => Descriptor {
                        name: $name,
                        constant: $constant,
                        default: $default,
                        si_multiplier: $si,
                        lower: $lower,
                        upper: $upper,
                    },)+
                }
            }

            /// Lower-case name of the parameter.
            pub fn name(&self) -> &'static str {
                self.descriptor().name
            }

            /// Case-insensitive lookup by name.
            pub fn parse(name: &str) -> Option<Self> {
                let name = name.trim();
                Self::ALL
                    .into_iter()
                    .find(|p| p.name().eq_ignore_ascii_case(name))
            }

            fn index(&self) -> usize {
                *self as usize
            }
        }
    };
}

define_params!(
    IntParam, i32, INT_PARAM_COUNT,
    (NMtTotal, "n_mt_total", true, 750, 1.0, Some(0), None),
    (NCrTotal, "n_cr_total", true, 23, 1.0, Some(0), None),
    (SpringBrakeType, "spring_brake_type", false, 0, 1.0, Some(0), Some(1)),
    (SpringBrakeMts, "spring_brake_mts", false, 25, 1.0, Some(0), None),
    (NNods, "n_nods", true, 676, 1.0, Some(0), None),
    (SpringType, "spring_type", false, 0, 1.0, Some(0), Some(1)),
    (FrozenCoords, "frozen_coords", false, 0, 1.0, Some(0), Some(1)),
    (MtWrapping, "mt_wrapping", false, 1, 1.0, Some(0), Some(1)),
    (MtLateralAttachments, "mt_lateral_attachments", false, 0, 1.0, Some(0), Some(1)),
    (NKmtMax, "n_kmt_max", false, 50, 1.0, Some(0), None),
);

define_params!(
    DoubleParam, f64, DOUBLE_PARAM_COUNT,
    (LPoles, "l_poles", true, 14.0, 1e-6, Some(0.0), None),
    (RCell, "r_cell", true, 8.0, 1e-6, Some(0.0), None),
    (SpringBrakeForce, "spring_brake_force", false, 700.0, 1e-12, Some(0.0), None),
    (VPol, "v_pol", false, 12.8, 1e-6 / 60.0, Some(0.0), None),
    (VDep, "v_dep", false, 14.1, 1e-6 / 60.0, Some(0.0), None),
    (FCat, "f_cat", false, 0.058, 1.0, Some(0.0), Some(1.0)),
    (FRes, "f_res", false, 0.045, 1.0, Some(0.0), Some(1.0)),
    (Gamma, "gamma", false, 0.006, 1e-12 / 1e-9, Some(0.0), None),
    (Ieta, "ieta", false, 5700.0, 1e-12 * 1e-9, Some(0.0), None),
    (L1, "l1", true, 100.0, 1e-9, Some(0.0), None),
    (L3, "l3", true, 60.0, 1e-9, Some(0.0), None),
    (Eps, "eps", false, 0.05, 1.0, Some(0.0), Some(1.0)),
    (KOn, "k_on", false, 1.0, 1.0, Some(0.0), None),
    (KOff, "k_off", false, 4.0, 1.0, Some(0.0), None),
    (Dt, "dt", false, 0.1, 1.0, Some(1e-3), None),
    (TEnd, "t_end", false, 100.0, 1.0, Some(0.0), None),
    (SaveFreqMicro, "save_freq_micro", false, 0.1, 1.0, Some(0.0), None),
    (SaveFreqMacro, "save_freq_macro", false, 0.1, 1.0, Some(0.0), None),
    (CrL, "cr_l", true, 5.0, 1e-6, Some(0.0), None),
    (CrKinL, "cr_kin_l", true, 0.5, 1e-6, Some(0.0), None),
    (CrKinD, "cr_kin_d", true, 0.3, 1e-6, Some(0.0), None),
    (CrKinAngle, "cr_kin_angle", true, 115.0, PI_F64 / 180.0, Some(0.0), Some(180.0)),
    (CrHandD, "cr_hand_d", true, 0.5, 1e-6, Some(0.0), None),
    (ConstA, "const_a", false, 45.0, 1e-12, Some(0.0), None),
    (ConstB, "const_b", false, 45.0 / 12.8, 1e-12 * 60.0 / 1e-6, Some(0.0), None),
    (DTrans, "d_trans", false, 0.01, 1e-9 * 1e-9, Some(0.0), None),
    (DRot, "d_rot", false, 1.5e-3, 1.0, Some(0.0), None),
    (SpringLength, "spring_length", true, 0.0, 1e-6, Some(0.0), None),
    (SpringK, "spring_k", false, 500.0, 1e-6, Some(20.0), None),
);

const PI_F64: f64 = PI as f64;

/// Gate for parameter changes.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Access {
    /// Any value may be set
    Initialize = 1,
    /// Constant parameters keep their current value
    Update = 2,
    /// Nothing may be set
    ReadOnly = 3,
}

/// Values of all simulation parameters.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SimParams {
    access: Access,
    ints: Vec<i32>,
    doubles: Vec<f64>,
}

impl Default for SimParams {
    fn default() -> Self {
        Self::new()
    }
}

impl SimParams {
    /// Registry holding the defaults in [Access::ReadOnly] mode.
    pub fn new() -> Self {
        Self {
            access: Access::ReadOnly,
            ints: IntParam::ALL.iter().map(|p| p.descriptor().default).collect(),
            doubles: DoubleParam::ALL
                .iter()
                .map(|p| p.descriptor().default)
                .collect(),
        }
    }

    /// Current access mode.
    pub fn access(&self) -> Access {
        self.access
    }

    /// Changes the access mode.
    pub fn set_access(&mut self, access: Access) {
        self.access = access;
    }

    /// Integer value of a parameter.
    pub fn get_int(&self, param: IntParam) -> i32 {
        self.ints[param.index()]
    }

    /// Floating point value of a parameter in user units.
    pub fn get_double(&self, param: DoubleParam) -> f64 {
        self.doubles[param.index()]
    }

    /// Floating point value of a parameter in SI units.
    pub fn get_double_si(&self, param: DoubleParam) -> f64 {
        self.doubles[param.index()] * param.descriptor().si_multiplier
    }

    fn check_writable(&self) -> Result<(), ParamsError> {
        if self.access == Access::ReadOnly {
            return Err(ParamsError(
                "the value of parameter cannot be changed due to read-only restriction".into(),
            ));
        }
        Ok(())
    }

    /// Sets an integer parameter.
    pub fn set_int(&mut self, param: IntParam, value: i32) -> Result<(), ParamsError> {
        self.check_writable()?;
        let descr = param.descriptor();
        if self.access == Access::Update && descr.constant && self.get_int(param) != value {
            return Err(ParamsError(format!(
                "cannot change the value of constant parameter \"{}\"",
                descr.name
            )));
        }
        descr.check_bounds(value)?;
        self.ints[param.index()] = value;
        Ok(())
    }

    /// Sets a floating point parameter given in user units.
    pub fn set_double(&mut self, param: DoubleParam, value: f64) -> Result<(), ParamsError> {
        self.check_writable()?;
        let descr = param.descriptor();
        if value.is_nan() {
            return Err(ParamsError(format!(
                "value of parameter \"{}\" is not a number",
                descr.name
            )));
        }
        if self.access == Access::Update && descr.constant && self.get_double(param) != value {
            return Err(ParamsError(format!(
                "cannot change the value of constant parameter \"{}\"",
                descr.name
            )));
        }
        descr.check_bounds(value)?;
        self.doubles[param.index()] = value;
        Ok(())
    }

    /// Sets a floating point parameter given in SI units.
    pub fn set_double_si(&mut self, param: DoubleParam, value: f64) -> Result<(), ParamsError> {
        self.set_double(param, value / param.descriptor().si_multiplier)
    }

    /// Value of the named parameter formatted as string.
    pub fn get_by_name(&self, name: &str, si: bool) -> Result<String, ParamsError> {
        if let Some(param) = IntParam::parse(name) {
            return Ok(self.get_int(param).to_string());
        }
        if let Some(param) = DoubleParam::parse(name) {
            let value = if si {
                self.get_double_si(param)
            } else {
                self.get_double(param)
            };
            return Ok(value.to_string());
        }
        Err(ParamsError(format!("parameter \"{name}\" is not known")))
    }

    /// Parses and sets the named parameter.
    pub fn set_by_name(&mut self, name: &str, value: &str, si: bool) -> Result<(), ParamsError> {
        let parse_error = || {
            ParamsError(format!(
                "failed to parse value \"{value}\" of parameter \"{name}\""
            ))
        };
        if let Some(param) = IntParam::parse(name) {
            let value = value.trim().parse::<i32>().map_err(|_| parse_error())?;
            return self.set_int(param, value);
        }
        if let Some(param) = DoubleParam::parse(name) {
            let value = value.trim().parse::<f64>().map_err(|_| parse_error())?;
            return if si {
                self.set_double_si(param, value)
            } else {
                self.set_double(param, value)
            };
        }
        Err(ParamsError(format!("parameter \"{name}\" is not known")))
    }

    /// Resets all parameters to their defaults, honoring the access mode.
    pub fn set_default(&mut self) -> Result<(), ParamsError> {
        for param in IntParam::ALL {
            self.set_int(param, param.descriptor().default)?;
        }
        for param in DoubleParam::ALL {
            self.set_double(param, param.descriptor().default)?;
        }
        Ok(())
    }

    /// All values as name/value pairs in user units.
    pub fn export_values(&self) -> Vec<(String, String)> {
        IntParam::ALL
            .iter()
            .map(|p| (p.name().to_owned(), self.get_int(*p).to_string()))
            .chain(
                DoubleParam::ALL
                    .iter()
                    .map(|p| (p.name().to_owned(), self.get_double(*p).to_string())),
            )
            .collect()
    }

    /// Sets all given name/value pairs in order. Stops at the first failure.
    pub fn import_values<N, V>(&mut self, values: &[(N, V)]) -> Result<(), ParamsError>
    where
        N: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in values {
            self.set_by_name(name.as_ref(), value.as_ref(), false)?;
        }
        Ok(())
    }

    /// Writes all values as `name=value` lines.
    pub fn export_props(&self) -> String {
        self.export_values()
            .into_iter()
            .map(|(name, value)| format!("{name}={value}\n"))
            .collect()
    }

    /// Parses `name=value` lines and imports them once the whole text has been parsed.
    ///
    /// `#` starts a comment, whitespace runs collapse and empty lines are skipped.
    pub fn import_props(&mut self, props: &str) -> Result<(), ParamsError> {
        let records = parse_props(props)?;
        self.import_values(&records)
            .map_err(|e| ParamsError(format!("failed to import config. {e}")))
    }
}

fn parse_props(props: &str) -> Result<Vec<(String, String)>, ParamsError> {
    let mut records = Vec::new();
    for line in props.lines() {
        let content = line.split(['#', '\r']).next().unwrap_or_default();
        let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            continue;
        }
        let wrong_record = || ParamsError(format!("wrong config record \"{line}\""));
        let (name, value) = collapsed.split_once('=').ok_or_else(wrong_record)?;
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() || value.is_empty() {
            return Err(wrong_record());
        }
        records.push((name.to_owned(), value.to_owned()));
    }
    Ok(records)
}
