//! Index formulas and input validation.

use chrono::{Local, NaiveDate};
use regex::Regex;
use shared::indices::{
    self, CalculationRecord, IndexDefinition, InputSlot, SlotKind, DATE_FORMAT, TIME_FORMAT,
};
use std::sync::OnceLock;
use uuid::Uuid;

/// Average month length used for age conversions
const DAYS_PER_MONTH: f64 = 30.4375;
/// Live weight of one animal unit
const KG_PER_ANIMAL_UNIT: f64 = 450.0;
const WEANING_REFERENCE_DAYS: f64 = 205.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalcError {
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("no formula registered for index '{0}'")]
    UnsupportedIndex(String),

    /// The definition's input slots do not fit its formula.
    #[error("index '{index}' {message}")]
    InvalidDefinition { index: String, message: String },
}

impl CalcError {
    fn invalid(slot: &InputSlot, message: impl Into<String>) -> Self {
        CalcError::Validation {
            field: slot.label.to_string(),
            message: message.into(),
        }
    }

    /// Field the user should correct, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            CalcError::Validation { field, .. } => Some(field),
            CalcError::UnsupportedIndex(_) | CalcError::InvalidDefinition { .. } => None,
        }
    }
}

/// Parsed input value for one slot.
#[derive(Debug, Clone, Copy)]
enum Value {
    Number(f64),
    Date(NaiveDate),
}

/// Parsed values read by position, checked against the slot kinds.
struct Inputs<'a> {
    definition: &'a IndexDefinition,
    values: Vec<Value>,
}

impl Inputs<'_> {
    fn mismatch(&self, message: String) -> CalcError {
        CalcError::InvalidDefinition {
            index: self.definition.name.to_string(),
            message,
        }
    }

    fn slot(&self, i: usize) -> Result<&'static InputSlot, CalcError> {
        self.definition
            .inputs
            .get(i)
            .ok_or_else(|| self.mismatch(format!("has no input {}", i + 1)))
    }

    fn number(&self, i: usize) -> Result<f64, CalcError> {
        match self.values.get(i) {
            Some(Value::Number(n)) => Ok(*n),
            Some(Value::Date(_)) => Err(self.mismatch(format!("input {} must be numeric", i + 1))),
            None => Err(self.mismatch(format!("has no input {}", i + 1))),
        }
    }

    fn date(&self, i: usize) -> Result<NaiveDate, CalcError> {
        match self.values.get(i) {
            Some(Value::Date(d)) => Ok(*d),
            Some(Value::Number(_)) => Err(self.mismatch(format!("input {} must be a date", i + 1))),
            None => Err(self.mismatch(format!("has no input {}", i + 1))),
        }
    }

    /// Numeric input that must be greater than zero.
    fn positive(&self, i: usize) -> Result<f64, CalcError> {
        nonzero(self.slot(i)?, self.number(i)?)
    }
}

fn date_shape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{2}/\d{2}/\d{4}$").expect("static regex"))
}

pub fn parse_number(slot: &InputSlot, raw: &str) -> Result<f64, CalcError> {
    let cleaned = raw.trim().replace(',', ".");
    if cleaned.is_empty() {
        return Err(CalcError::invalid(slot, "is required"));
    }
    let value: f64 = cleaned
        .parse()
        .map_err(|_| CalcError::invalid(slot, "must be a number"))?;
    if !value.is_finite() {
        return Err(CalcError::invalid(slot, "must be a number"));
    }
    if value < 0.0 {
        return Err(CalcError::invalid(slot, "must be a non-negative number"));
    }
    Ok(value)
}

pub fn parse_date(slot: &InputSlot, raw: &str) -> Result<NaiveDate, CalcError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CalcError::invalid(slot, "is required"));
    }
    if !date_shape().is_match(raw) {
        return Err(CalcError::invalid(slot, "must be a date in DD/MM/YYYY format"));
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| CalcError::invalid(slot, "is not a valid calendar date"))
}

fn parse_inputs<S: AsRef<str>>(
    definition: &IndexDefinition,
    raw_inputs: &[S],
) -> Result<Vec<Value>, CalcError> {
    if raw_inputs.len() != definition.inputs.len() {
        return Err(CalcError::Validation {
            field: definition.name.to_string(),
            message: format!(
                "expected {} inputs, got {}",
                definition.inputs.len(),
                raw_inputs.len()
            ),
        });
    }
    definition
        .inputs
        .iter()
        .zip(raw_inputs)
        .map(|(slot, raw)| match slot.kind {
            SlotKind::Numeric => parse_number(slot, raw.as_ref()).map(Value::Number),
            SlotKind::Date => parse_date(slot, raw.as_ref()).map(Value::Date),
        })
        .collect()
}

fn nonzero(slot: &InputSlot, value: f64) -> Result<f64, CalcError> {
    if value == 0.0 {
        Err(CalcError::invalid(slot, "must be greater than zero"))
    } else {
        Ok(value)
    }
}

fn percent(v: &Inputs) -> Result<f64, CalcError> {
    let denominator = v.positive(1)?;
    Ok(v.number(0)? / denominator * 100.0)
}

const FORMULAS: &[&str] = &[
    indices::PREGNANCY_RATE,
    indices::BIRTH_RATE,
    indices::WEANING_RATE,
    indices::ADJUSTED_WEANING_WEIGHT,
    indices::AVG_DAILY_GAIN,
    indices::MORTALITY_RATE,
    indices::AGE_AT_FIRST_CALVING,
    indices::CALVING_INTERVAL,
    indices::STOCKING_RATE,
    indices::MILK_YIELD,
    indices::FEED_CONVERSION,
    indices::CARCASS_YIELD,
];

pub fn has_formula(index_name: &str) -> bool {
    FORMULAS.contains(&index_name)
}

/// Applies the index formula and returns `(value, unit)`.
pub fn compute<S: AsRef<str>>(
    definition: &IndexDefinition,
    raw_inputs: &[S],
) -> Result<(f64, &'static str), CalcError> {
    if !has_formula(definition.name) {
        return Err(CalcError::UnsupportedIndex(definition.name.to_string()));
    }
    let v = Inputs {
        definition,
        values: parse_inputs(definition, raw_inputs)?,
    };

    let result = match definition.name {
        indices::PREGNANCY_RATE
        | indices::BIRTH_RATE
        | indices::WEANING_RATE
        | indices::MORTALITY_RATE => (percent(&v)?, "%"),
        indices::ADJUSTED_WEANING_WEIGHT => {
            let (birth, weaning) = (v.number(0)?, v.number(1)?);
            let age = v.positive(2)?;
            if weaning < birth {
                return Err(CalcError::invalid(
                    v.slot(1)?,
                    "must not be lower than the birth weight",
                ));
            }
            (birth + (weaning - birth) / age * WEANING_REFERENCE_DAYS, "kg")
        }
        indices::AVG_DAILY_GAIN => {
            let days = v.positive(2)?;
            ((v.number(1)? - v.number(0)?) / days, "kg/day")
        }
        indices::AGE_AT_FIRST_CALVING => {
            let (birth, calving) = (v.date(0)?, v.date(1)?);
            if calving < birth {
                return Err(CalcError::invalid(
                    v.slot(1)?,
                    "must not be before the birth date",
                ));
            }
            ((calving - birth).num_days() as f64 / DAYS_PER_MONTH, "months")
        }
        indices::CALVING_INTERVAL => {
            let (previous, current) = (v.date(0)?, v.date(1)?);
            if current < previous {
                return Err(CalcError::invalid(
                    v.slot(1)?,
                    "must not be before the previous calving",
                ));
            }
            ((current - previous).num_days() as f64, "days")
        }
        indices::STOCKING_RATE => {
            let weight = v.positive(1)?;
            let area = v.positive(2)?;
            ((v.number(0)? * weight / KG_PER_ANIMAL_UNIT) / area, "AU/ha")
        }
        indices::MILK_YIELD => {
            let cows = v.positive(1)?;
            (v.number(0)? / cows, "L/cow/day")
        }
        indices::FEED_CONVERSION => {
            let gain = v.positive(1)?;
            (v.number(0)? / gain, "kg DM/kg LW")
        }
        indices::CARCASS_YIELD => {
            let live = v.positive(0)?;
            (v.number(1)? / live * 100.0, "%")
        }
        other => return Err(CalcError::UnsupportedIndex(other.to_string())),
    };
    Ok(result)
}

pub fn format_result(value: f64, unit: &str) -> String {
    format!("{:.2} {}", value, unit)
}

/// Validates the inputs and stamps a new record with a fresh id and the
/// current local date and time.
pub fn calculate<S: AsRef<str>>(
    definition: &IndexDefinition,
    raw_inputs: &[S],
) -> Result<CalculationRecord, CalcError> {
    recalculate(definition, raw_inputs, &Uuid::new_v4().to_string())
}

/// Same as [`calculate`] but keeps an existing record id (edits).
pub fn recalculate<S: AsRef<str>>(
    definition: &IndexDefinition,
    raw_inputs: &[S],
    id: &str,
) -> Result<CalculationRecord, CalcError> {
    let (value, unit) = compute(definition, raw_inputs)?;
    let now = Local::now();
    Ok(CalculationRecord {
        id: id.to_string(),
        result_text: format_result(value, unit),
        date: now.format(DATE_FORMAT).to_string(),
        time: now.format(TIME_FORMAT).to_string(),
        raw_inputs: raw_inputs.iter().map(|s| s.as_ref().trim().to_string()).collect(),
    })
}
