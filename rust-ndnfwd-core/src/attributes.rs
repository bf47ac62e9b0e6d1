//! Name/value configuration surface.
//!
//! Objects expose tunables under string names so they can be driven from
//! configuration files and the command line without a typed setter per knob.

use crate::error::Error;
use std::str::FromStr;

pub trait Attributes {
    fn set_attribute(&mut self, name: &str, value: &str) -> Result<(), Error>;

    fn get_attribute(&self, name: &str) -> Result<String, Error>;
}

/// Parses an attribute value, mapping failures to [`Error::InvalidAttribute`].
pub(crate) fn parse_value<T: FromStr>(name: &str, value: &str) -> Result<T, Error> {
    value.trim().parse().map_err(|_| Error::InvalidAttribute {
        name: name.to_string(),
        value: value.to_string(),
    })
}
