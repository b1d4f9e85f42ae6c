//! Named value converters for scraped field values
//!
//! The HTTP field schema refers to converters by name; the registry hands
//! out a shared, stateless instance per name. Converters turn the raw text
//! captured by a regex group into a typed value, and `None` input (a scrape
//! miss) always converts to `None` so the field stays unset.

use crate::data::ModbusType;
use crate::error::{ConvertError, ConvertResult};

/// Registry name of the integer converter
pub const INT_CONVERTER: &str = "int";
/// Registry name of the Modbus protocol-type converter
pub const MODBUS_TYPE_CONVERTER: &str = "modbus_type";

/// A typed value produced by a converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertedValue {
    Int(i32),
    Modbus(ModbusType),
}

impl ConvertedValue {
    pub fn as_int(self) -> Option<i32> {
        match self {
            ConvertedValue::Int(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_modbus_type(self) -> Option<ModbusType> {
        match self {
            ConvertedValue::Modbus(value) => Some(value),
            _ => None,
        }
    }
}

/// Conversion between raw wire strings and typed field values.
///
/// Implementations are stateless and shared; the registry returns the same
/// instance on every lookup of a given name.
pub trait ValueConverter: Send + Sync + std::fmt::Debug {
    fn convert(&self, raw: Option<&str>) -> ConvertResult<Option<ConvertedValue>>;
}

/// Lenient integer converter: unparsable text converts to `0`.
///
/// The device renders disabled ports without numeric fields, so a token
/// that fails to parse is treated as "no meaningful value" rather than an
/// error. This mirrors the device tooling this manager replaces; the
/// Modbus-type converter below is deliberately stricter.
#[derive(Debug)]
pub struct IntConverter;

impl ValueConverter for IntConverter {
    fn convert(&self, raw: Option<&str>) -> ConvertResult<Option<ConvertedValue>> {
        Ok(raw.map(|text| ConvertedValue::Int(text.trim().parse::<i32>().unwrap_or(0))))
    }
}

/// Strict protocol-type converter: only the literal page tokens are
/// accepted. An unknown token means the status page format changed, and
/// silently defaulting would corrupt the snapshot, so it fails instead.
#[derive(Debug)]
pub struct ModbusTypeConverter;

impl ValueConverter for ModbusTypeConverter {
    fn convert(&self, raw: Option<&str>) -> ConvertResult<Option<ConvertedValue>> {
        match raw {
            None => Ok(None),
            Some("ASCII") => Ok(Some(ConvertedValue::Modbus(ModbusType::Ascii))),
            Some("RTU") => Ok(Some(ConvertedValue::Modbus(ModbusType::Rtu))),
            Some(other) => Err(ConvertError::UnrecognizedValue {
                converter: MODBUS_TYPE_CONVERTER,
                token: other.to_string(),
            }),
        }
    }
}

static INT_INSTANCE: IntConverter = IntConverter;
static MODBUS_TYPE_INSTANCE: ModbusTypeConverter = ModbusTypeConverter;

/// Name-to-instance converter lookup.
pub struct ConverterRegistry;

impl ConverterRegistry {
    /// Return the shared converter registered under `name`.
    pub fn get(name: &str) -> ConvertResult<&'static dyn ValueConverter> {
        match name {
            INT_CONVERTER => Ok(&INT_INSTANCE),
            MODBUS_TYPE_CONVERTER => Ok(&MODBUS_TYPE_INSTANCE),
            _ => Err(ConvertError::UnknownConverter { name: name.to_string() }),
        }
    }
}
