//! Input Example Encoder
//!
//! Turns a small sample of model input into a size-capped document that is
//! stored next to the model as `instance.yaml`.

use ndarray::{ArrayD, ArrayViewD, Axis, Slice};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};

/// Maximum number of rows kept from an input example
pub const MAX_INPUT_EXAMPLE_ROWS: usize = 5;
/// Filename of the input example descriptor
pub const INPUT_EXAMPLE_FILE: &str = "instance.yaml";

/// An n-dimensional array example, keeping its element type
///
/// Integers and booleans encode as such, the way `ndarray.tolist()` does.
#[derive(Debug, Clone, PartialEq)]
pub enum ExampleArray {
    Float(ArrayD<f64>),
    Int(ArrayD<i64>),
    Bool(ArrayD<bool>),
}

impl ExampleArray {
    /// First rows as nested lists
    fn head_rows(&self) -> Result<Value> {
        match self {
            ExampleArray::Float(array) => array_rows(array.view()),
            ExampleArray::Int(array) => array_rows(array.view()),
            ExampleArray::Bool(array) => array_rows(array.view()),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            ExampleArray::Float(array) => array_to_json(array.view()),
            ExampleArray::Int(array) => array_to_json(array.view()),
            ExampleArray::Bool(array) => array_to_json(array.view()),
        }
    }
}

macro_rules! example_array_from {
    ($($element:ty => $variant:ident),*) => {$(
        impl<D: ndarray::Dimension> From<ndarray::Array<$element, D>> for ExampleArray {
            fn from(array: ndarray::Array<$element, D>) -> Self {
                ExampleArray::$variant(array.into_dyn())
            }
        }

        impl<D: ndarray::Dimension> From<ndarray::Array<$element, D>> for ExampleValue {
            fn from(array: ndarray::Array<$element, D>) -> Self {
                ExampleValue::Array(array.into())
            }
        }

        impl<D: ndarray::Dimension> From<ndarray::Array<$element, D>> for InputExample {
            fn from(array: ndarray::Array<$element, D>) -> Self {
                InputExample::Array(array.into())
            }
        }
    )*};
}

example_array_from!(f64 => Float, i64 => Int, bool => Bool);

/// Array elements and their JSON form
trait JsonElement: Copy {
    fn to_json(self) -> Value;
}

impl JsonElement for f64 {
    fn to_json(self) -> Value {
        float_value(self)
    }
}

impl JsonElement for i64 {
    fn to_json(self) -> Value {
        Value::from(self)
    }
}

impl JsonElement for bool {
    fn to_json(self) -> Value {
        Value::Bool(self)
    }
}

/// A value inside a list or dict input example
#[derive(Debug, Clone, PartialEq)]
pub enum ExampleValue {
    Json(Value),
    Array(ExampleArray),
}

impl From<Value> for ExampleValue {
    fn from(value: Value) -> Self {
        ExampleValue::Json(value)
    }
}

impl ExampleValue {
    fn is_sequence(&self) -> bool {
        matches!(self, ExampleValue::Json(Value::Array(_)))
    }

    fn is_array(&self) -> bool {
        matches!(self, ExampleValue::Array(_))
    }

    /// Booleans, numbers and strings. `null` is not a scalar.
    fn is_scalar(&self) -> bool {
        matches!(
            self,
            ExampleValue::Json(Value::Bool(_) | Value::Number(_) | Value::String(_))
        )
    }
}

/// A sample of model input
#[derive(Debug, Clone)]
pub enum InputExample {
    /// Rows (nested sequences) or a flat sequence of scalars
    List(Vec<ExampleValue>),
    /// Named features, in insertion order
    Dict(Vec<(String, ExampleValue)>),
    /// Numeric array, rows along the first axis
    Array(ExampleArray),
    #[cfg(feature = "tabular")]
    DataFrame(polars::prelude::DataFrame),
}

impl InputExample {
    /// Build an input example from JSON: arrays become lists, objects dicts
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => Ok(InputExample::List(
                items.into_iter().map(ExampleValue::Json).collect(),
            )),
            Value::Object(map) => Ok(InputExample::Dict(
                map.into_iter()
                    .map(|(key, value)| (key, ExampleValue::Json(value)))
                    .collect(),
            )),
            _ => Err(Error::UnsupportedInputType),
        }
    }

    /// Encode into a bounded document
    pub fn encode(&self) -> Result<InputExampleDocument> {
        let document = match self {
            InputExample::List(items) => encode_list(items)?,
            InputExample::Dict(entries) => encode_dict(entries)?,
            InputExample::Array(array) => InputExampleDocument {
                kind: ExampleKind::NumpyArray,
                data: array.head_rows()?,
            },
            #[cfg(feature = "tabular")]
            InputExample::DataFrame(frame) => InputExampleDocument {
                kind: ExampleKind::PandasDataFrame,
                data: tabular::frame_columns(frame)?,
            },
        };

        Ok(document)
    }
}

#[cfg(feature = "tabular")]
impl From<polars::prelude::DataFrame> for InputExample {
    fn from(frame: polars::prelude::DataFrame) -> Self {
        InputExample::DataFrame(frame)
    }
}

/// Type tag of an encoded input example
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExampleKind {
    #[serde(rename = "list")]
    List,
    #[serde(rename = "dict")]
    Dict,
    #[serde(rename = "numpy.ndarray")]
    NumpyArray,
    #[serde(rename = "pandas.DataFrame")]
    PandasDataFrame,
}

/// Encoded input example
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputExampleDocument {
    #[serde(rename = "type")]
    pub kind: ExampleKind,
    pub data: Value,
}

#[derive(Serialize, Deserialize)]
struct Descriptor {
    input_example: InputExampleDocument,
}

impl InputExampleDocument {
    /// Write `instance.yaml` into `dir`
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(INPUT_EXAMPLE_FILE);
        let descriptor = Descriptor {
            input_example: self.clone(),
        };
        fs::write(&path, serde_yaml::to_string(&descriptor)?)?;
        debug!("Wrote input example to {:?}", path);
        Ok(path)
    }

    /// Read a descriptor written by [`write_to`](Self::write_to)
    pub fn read_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let descriptor: Descriptor = serde_yaml::from_str(&content)?;
        Ok(descriptor.input_example)
    }
}

/// Encode `example` and write its descriptor into `dir`
pub fn save_input_example(example: &InputExample, dir: &Path) -> Result<PathBuf> {
    example.encode()?.write_to(dir)
}

fn encode_list(items: &[ExampleValue]) -> Result<InputExampleDocument> {
    // Rows are capped, flat scalar lists are kept whole.
    let data = if items.iter().all(ExampleValue::is_sequence) {
        items
            .iter()
            .take(MAX_INPUT_EXAMPLE_ROWS)
            .map(json_value)
            .collect::<Result<Vec<_>>>()?
    } else if items.iter().all(ExampleValue::is_scalar) {
        items.iter().map(json_value).collect::<Result<Vec<_>>>()?
    } else {
        return Err(Error::InvalidInputKind(
            "The value inside a list must be a scalar or list.".to_string(),
        ));
    };

    Ok(InputExampleDocument {
        kind: ExampleKind::List,
        data: Value::Array(data),
    })
}

fn encode_dict(entries: &[(String, ExampleValue)]) -> Result<InputExampleDocument> {
    let values = || entries.iter().map(|(_, value)| value);
    let mut data = Map::new();

    if values().all(ExampleValue::is_sequence) {
        for (key, value) in entries {
            if let ExampleValue::Json(Value::Array(items)) = value {
                let head = items.iter().take(MAX_INPUT_EXAMPLE_ROWS).cloned().collect();
                data.insert(key.clone(), Value::Array(head));
            }
        }
    } else if values().all(ExampleValue::is_array) {
        for (key, value) in entries {
            if let ExampleValue::Array(array) = value {
                data.insert(key.clone(), array.head_rows()?);
            }
        }
    } else if values().all(ExampleValue::is_scalar) {
        for (key, value) in entries {
            data.insert(key.clone(), json_value(value)?);
        }
    } else {
        return Err(Error::InvalidInputKind(
            "The value inside a dictionary must be a scalar, list, or numpy.ndarray".to_string(),
        ));
    }

    Ok(InputExampleDocument {
        kind: ExampleKind::Dict,
        data: Value::Object(data),
    })
}

fn json_value(value: &ExampleValue) -> Result<Value> {
    match value {
        ExampleValue::Json(value) => Ok(value.clone()),
        ExampleValue::Array(array) => Ok(array.to_json()),
    }
}

/// First rows of an array as nested lists
fn array_rows<T: JsonElement>(array: ArrayViewD<'_, T>) -> Result<Value> {
    if array.ndim() == 0 {
        return Err(Error::InvalidInputKind(
            "An array input example must have at least one dimension.".to_string(),
        ));
    }

    let rows = array.len_of(Axis(0)).min(MAX_INPUT_EXAMPLE_ROWS);
    Ok(array_to_json(array.slice_axis(Axis(0), Slice::from(..rows))))
}

fn array_to_json<T: JsonElement>(array: ArrayViewD<'_, T>) -> Value {
    if array.ndim() == 0 {
        return array
            .iter()
            .next()
            .map_or(Value::Null, |&value| value.to_json());
    }

    Value::Array(array.outer_iter().map(array_to_json).collect())
}

fn float_value(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
}

#[cfg(feature = "tabular")]
mod tabular {
    use super::*;
    use polars::prelude::{AnyValue, DataFrame};

    /// Column name to the first rows of that column
    pub(super) fn frame_columns(frame: &DataFrame) -> Result<Value> {
        let head = frame.head(Some(MAX_INPUT_EXAMPLE_ROWS));
        let mut data = Map::new();

        for series in head.get_columns() {
            let values = (0..series.len())
                .map(|i| series.get(i).map(any_value_to_json))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            data.insert(series.name().to_string(), Value::Array(values));
        }

        Ok(Value::Object(data))
    }

    fn any_value_to_json(value: AnyValue<'_>) -> Value {
        match value {
            AnyValue::Null => Value::Null,
            AnyValue::Boolean(b) => Value::Bool(b),
            AnyValue::Int32(v) => Value::from(v),
            AnyValue::Int64(v) => Value::from(v),
            AnyValue::UInt32(v) => Value::from(v),
            AnyValue::UInt64(v) => Value::from(v),
            AnyValue::Float32(v) => float_value(f64::from(v)),
            AnyValue::Float64(v) => float_value(v),
            AnyValue::String(s) => Value::String(s.to_string()),
            AnyValue::Date(days) => date_value(days),
            AnyValue::List(series) => Value::Array(
                (0..series.len())
                    .map(|i| series.get(i).map_or(Value::Null, any_value_to_json))
                    .collect(),
            ),
            // Remaining types (datetimes, durations, structs) keep their display form
            other => Value::String(other.to_string()),
        }
    }

    /// Days since the Unix epoch as `YYYY-MM-DD`
    fn date_value(days: i32) -> Value {
        chrono::NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
            .map_or(Value::Null, |date| Value::String(date.to_string()))
    }

    const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;
}
