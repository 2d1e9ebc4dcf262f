pub mod csv;
pub mod json;
pub mod table;

use crate::flight::FieldValue;

fn cell(value: Option<&FieldValue>) -> String {
    value.map(ToString::to_string).unwrap_or_default()
}
