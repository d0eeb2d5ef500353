use std::borrow::Cow;

use tiberius::{ColumnData, IntoSql};

use crate::types::{RowValues, SqlType};

/// Owned binding of a value as a tiberius parameter.
impl<'a> IntoSql<'a> for RowValues {
    fn into_sql(self) -> ColumnData<'a> {
        match self {
            RowValues::Int(i) => ColumnData::I64(Some(i)),
            RowValues::Float(f) => ColumnData::F64(Some(f)),
            RowValues::Text(s) => ColumnData::String(Some(Cow::Owned(s))),
            RowValues::Bool(b) => ColumnData::Bit(Some(b)),
            RowValues::Timestamp(dt) => dt.into_sql(),
            RowValues::Null => ColumnData::String(None),
            RowValues::JSON(jsval) => ColumnData::String(Some(Cow::Owned(jsval.to_string()))),
            RowValues::Blob(bytes) => ColumnData::Binary(Some(Cow::Owned(bytes))),
        }
    }
}

/// Bulk-load cell for a column of type `ty`.
///
/// Bulk load does not let the server convert, so integer and float widths must
/// match the destination column exactly.
pub(crate) fn bulk_cell(value: RowValues, ty: SqlType) -> ColumnData<'static> {
    match (value, ty) {
        (RowValues::Null, SqlType::TinyInt) => ColumnData::U8(None),
        (RowValues::Null, SqlType::SmallInt) => ColumnData::I16(None),
        (RowValues::Null, SqlType::Int) => ColumnData::I32(None),
        (RowValues::Null, SqlType::BigInt) => ColumnData::I64(None),
        (RowValues::Null, SqlType::Real) => ColumnData::F32(None),
        (RowValues::Null, SqlType::Bit) => ColumnData::Bit(None),
        (RowValues::Null, t) if t.is_float() => ColumnData::F64(None),
        (RowValues::Null, t) if t.is_binary() => ColumnData::Binary(None),
        (RowValues::Int(i), SqlType::TinyInt) => ColumnData::U8(u8::try_from(i).ok()),
        (RowValues::Int(i), SqlType::SmallInt) => ColumnData::I16(i16::try_from(i).ok()),
        (RowValues::Int(i), SqlType::Int) => ColumnData::I32(i32::try_from(i).ok()),
        #[allow(clippy::cast_possible_truncation)]
        (RowValues::Float(f), SqlType::Real) => ColumnData::F32(Some(f as f32)),
        (value, _) => value.into_sql(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_cells_match_column_width() {
        assert!(matches!(
            bulk_cell(RowValues::Int(7), SqlType::SmallInt),
            ColumnData::I16(Some(7))
        ));
        assert!(matches!(
            bulk_cell(RowValues::Int(70_000), SqlType::SmallInt),
            ColumnData::I16(None)
        ));
        assert!(matches!(
            bulk_cell(RowValues::Null, SqlType::Int),
            ColumnData::I32(None)
        ));
        assert!(matches!(
            bulk_cell(RowValues::Text("x".into()), SqlType::NVarChar),
            ColumnData::String(Some(_))
        ));
    }
}
