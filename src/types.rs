use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Values bound as parameters or read back from columns.
///
/// ```rust
/// use mssql_request::prelude::*;
///
/// let params = vec![
///     RowValues::Int(1),
///     RowValues::Text("alice".into()),
///     RowValues::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RowValues {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
    /// JSON value
    JSON(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
}

impl RowValues {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<&i64> {
        if let RowValues::Int(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let RowValues::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<&bool> {
        if let RowValues::Bool(value) = self {
            return Some(value);
        } else if let Some(i) = self.as_int() {
            if *i == 1 {
                return Some(&true);
            } else if *i == 0 {
                return Some(&false);
            }
        }
        None
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let RowValues::Timestamp(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let RowValues::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        if let RowValues::Blob(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    /// Map a parsed JSON value onto the closest scalar variant.
    #[must_use]
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => RowValues::Null,
            JsonValue::Bool(b) => RowValues::Bool(b),
            JsonValue::String(s) => RowValues::Text(s),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => RowValues::Int(i),
                None => n.as_f64().map_or(RowValues::Null, RowValues::Float),
            },
            other => RowValues::JSON(other),
        }
    }
}

/// String form used when a value has to become text (string-typed parameters,
/// chunk fragments, binary-from-string conversion).
impl fmt::Display for RowValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowValues::Int(i) => write!(f, "{i}"),
            RowValues::Float(x) => write!(f, "{x}"),
            RowValues::Text(s) => f.write_str(s),
            RowValues::Bool(b) => write!(f, "{b}"),
            RowValues::Timestamp(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.3f")),
            RowValues::Null => Ok(()),
            RowValues::JSON(v) => write!(f, "{v}"),
            RowValues::Blob(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
        }
    }
}

/// Direction of a request parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterDirection {
    Input = 1,
    Output = 2,
}

/// SQL Server data types understood by the declaration and coercion layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Bit,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Real,
    Decimal,
    Numeric,
    Money,
    SmallMoney,
    Char,
    NChar,
    VarChar,
    NVarChar,
    Text,
    NText,
    Xml,
    Binary,
    VarBinary,
    Image,
    Date,
    Time,
    DateTime,
    DateTime2,
    DateTimeOffset,
    SmallDateTime,
    UniqueIdentifier,
    Variant,
    Udt,
    Geography,
    Geometry,
}

impl SqlType {
    /// Server-side type name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            SqlType::Bit => "bit",
            SqlType::TinyInt => "tinyint",
            SqlType::SmallInt => "smallint",
            SqlType::Int => "int",
            SqlType::BigInt => "bigint",
            SqlType::Float => "float",
            SqlType::Real => "real",
            SqlType::Decimal => "decimal",
            SqlType::Numeric => "numeric",
            SqlType::Money => "money",
            SqlType::SmallMoney => "smallmoney",
            SqlType::Char => "char",
            SqlType::NChar => "nchar",
            SqlType::VarChar => "varchar",
            SqlType::NVarChar => "nvarchar",
            SqlType::Text => "text",
            SqlType::NText => "ntext",
            SqlType::Xml => "xml",
            SqlType::Binary => "binary",
            SqlType::VarBinary => "varbinary",
            SqlType::Image => "image",
            SqlType::Date => "date",
            SqlType::Time => "time",
            SqlType::DateTime => "datetime",
            SqlType::DateTime2 => "datetime2",
            SqlType::DateTimeOffset => "datetimeoffset",
            SqlType::SmallDateTime => "smalldatetime",
            SqlType::UniqueIdentifier => "uniqueidentifier",
            SqlType::Variant => "sql_variant",
            SqlType::Udt => "udt",
            SqlType::Geography => "geography",
            SqlType::Geometry => "geometry",
        }
    }

    /// Resolve a server-side type name (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<SqlType> {
        let ty = match name.to_ascii_lowercase().as_str() {
            "bit" => SqlType::Bit,
            "tinyint" => SqlType::TinyInt,
            "smallint" => SqlType::SmallInt,
            "int" => SqlType::Int,
            "bigint" => SqlType::BigInt,
            "float" => SqlType::Float,
            "real" => SqlType::Real,
            "decimal" => SqlType::Decimal,
            "numeric" => SqlType::Numeric,
            "money" => SqlType::Money,
            "smallmoney" => SqlType::SmallMoney,
            "char" => SqlType::Char,
            "nchar" => SqlType::NChar,
            "varchar" => SqlType::VarChar,
            "nvarchar" => SqlType::NVarChar,
            "text" => SqlType::Text,
            "ntext" => SqlType::NText,
            "xml" => SqlType::Xml,
            "binary" => SqlType::Binary,
            "varbinary" => SqlType::VarBinary,
            "image" => SqlType::Image,
            "date" => SqlType::Date,
            "time" => SqlType::Time,
            "datetime" => SqlType::DateTime,
            "datetime2" => SqlType::DateTime2,
            "datetimeoffset" => SqlType::DateTimeOffset,
            "smalldatetime" => SqlType::SmallDateTime,
            "uniqueidentifier" => SqlType::UniqueIdentifier,
            "sql_variant" => SqlType::Variant,
            "udt" => SqlType::Udt,
            "geography" => SqlType::Geography,
            "geometry" => SqlType::Geometry,
            _ => return None,
        };
        Some(ty)
    }

    #[must_use]
    pub fn is_string(self) -> bool {
        matches!(
            self,
            SqlType::Char
                | SqlType::NChar
                | SqlType::VarChar
                | SqlType::NVarChar
                | SqlType::Text
                | SqlType::NText
                | SqlType::Xml
        )
    }

    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            SqlType::TinyInt | SqlType::SmallInt | SqlType::Int | SqlType::BigInt
        )
    }

    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(
            self,
            SqlType::Float
                | SqlType::Real
                | SqlType::Decimal
                | SqlType::Numeric
                | SqlType::Money
                | SqlType::SmallMoney
        )
    }

    #[must_use]
    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            SqlType::Date
                | SqlType::Time
                | SqlType::DateTime
                | SqlType::DateTime2
                | SqlType::DateTimeOffset
                | SqlType::SmallDateTime
        )
    }

    #[must_use]
    pub fn is_binary(self) -> bool {
        matches!(self, SqlType::Binary | SqlType::VarBinary | SqlType::Image)
    }

    /// Declaration text used in `DECLARE` and `CREATE TABLE`.
    ///
    /// `length` of `None` on a variable-length type means `MAX`.
    #[must_use]
    pub fn declaration(self, length: Option<u32>, precision: Option<u8>, scale: Option<u8>) -> String {
        match self {
            SqlType::VarChar | SqlType::VarBinary => match length {
                Some(n) if n <= 8000 => format!("{}({n})", self.name()),
                _ => format!("{}(MAX)", self.name()),
            },
            SqlType::NVarChar => match length {
                Some(n) if n <= 4000 => format!("{}({n})", self.name()),
                _ => format!("{}(MAX)", self.name()),
            },
            SqlType::Char | SqlType::NChar | SqlType::Binary => {
                format!("{}({})", self.name(), length.unwrap_or(1))
            }
            SqlType::Decimal | SqlType::Numeric => format!(
                "{}({}, {})",
                self.name(),
                precision.unwrap_or(18),
                scale.unwrap_or(0)
            ),
            SqlType::Time | SqlType::DateTime2 | SqlType::DateTimeOffset => {
                format!("{}({})", self.name(), scale.unwrap_or(7))
            }
            _ => self.name().to_string(),
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declarations_follow_server_limits() {
        assert_eq!(SqlType::Int.declaration(None, None, None), "int");
        assert_eq!(SqlType::Money.declaration(None, None, None), "money");
        assert_eq!(SqlType::NVarChar.declaration(Some(50), None, None), "nvarchar(50)");
        assert_eq!(SqlType::NVarChar.declaration(Some(4001), None, None), "nvarchar(MAX)");
        assert_eq!(SqlType::VarChar.declaration(None, None, None), "varchar(MAX)");
        assert_eq!(SqlType::Char.declaration(None, None, None), "char(1)");
        assert_eq!(SqlType::Decimal.declaration(None, Some(10), Some(2)), "decimal(10, 2)");
        assert_eq!(SqlType::Numeric.declaration(None, None, None), "numeric(18, 0)");
        assert_eq!(SqlType::Time.declaration(None, None, Some(3)), "time(3)");
    }

    #[test]
    fn type_names_round_trip_case_insensitively() {
        assert_eq!(SqlType::from_name("DateTime2"), Some(SqlType::DateTime2));
        assert_eq!(SqlType::from_name("sql_variant"), Some(SqlType::Variant));
        assert_eq!(SqlType::from_name("nope"), None);
    }

    #[test]
    fn json_numbers_map_to_int_or_float() {
        assert_eq!(RowValues::from_json(serde_json::json!(1)), RowValues::Int(1));
        assert_eq!(RowValues::from_json(serde_json::json!(1.5)), RowValues::Float(1.5));
        assert_eq!(
            RowValues::from_json(serde_json::json!([1, 2])),
            RowValues::JSON(serde_json::json!([1, 2]))
        );
    }
}
