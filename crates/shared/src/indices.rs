//! Zootechnical index catalog and calculation history records.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const DATE_FORMAT: &str = "%d/%m/%Y";
pub const TIME_FORMAT: &str = "%H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// Non-negative decimal, `.` or `,` as separator
    Numeric,
    /// `DD/MM/YYYY`
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSlot {
    pub label: &'static str,
    pub kind: SlotKind,
}

const fn num(label: &'static str) -> InputSlot {
    InputSlot {
        label,
        kind: SlotKind::Numeric,
    }
}

const fn date(label: &'static str) -> InputSlot {
    InputSlot {
        label,
        kind: SlotKind::Date,
    }
}

/// Static catalog entry describing one index and its input schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDefinition {
    pub name: &'static str,
    pub short_name: &'static str,
    pub concept: &'static str,
    pub inputs: &'static [InputSlot],
}

pub const PREGNANCY_RATE: &str = "Pregnancy Rate";
pub const BIRTH_RATE: &str = "Birth Rate";
pub const WEANING_RATE: &str = "Weaning Rate";
pub const ADJUSTED_WEANING_WEIGHT: &str = "Adjusted Weaning Weight (205d)";
pub const AVG_DAILY_GAIN: &str = "Avg Daily Gain";
pub const MORTALITY_RATE: &str = "Mortality Rate";
pub const AGE_AT_FIRST_CALVING: &str = "Age at First Calving";
pub const CALVING_INTERVAL: &str = "Calving Interval";
pub const STOCKING_RATE: &str = "Stocking Rate";
pub const MILK_YIELD: &str = "Milk Yield per Cow/Day";
pub const FEED_CONVERSION: &str = "Feed Conversion";
pub const CARCASS_YIELD: &str = "Carcass Yield";

static CATALOG: &[IndexDefinition] = &[
    IndexDefinition {
        name: BIRTH_RATE,
        short_name: "Births",
        concept: "Percentage of calves born alive relative to the number of breeding-eligible females exposed during a period.",
        inputs: &[
            num("Number of calves born alive"),
            num("Number of eligible females (exposed to breeding)"),
        ],
    },
    IndexDefinition {
        name: WEANING_RATE,
        short_name: "Weaning",
        concept: "Percentage of calves weaned relative to the calves born alive in the period.",
        inputs: &[
            num("Number of calves weaned"),
            num("Number of calves born alive in the period"),
        ],
    },
    IndexDefinition {
        name: AVG_DAILY_GAIN,
        short_name: "ADG",
        concept: "Average weight an animal or lot gains per day over a period. Used to track development in every phase.",
        inputs: &[
            num("Initial weight (kg)"),
            num("Final weight (kg)"),
            num("Days between weighings"),
        ],
    },
    IndexDefinition {
        name: ADJUSTED_WEANING_WEIGHT,
        short_name: "Adj. Weight",
        concept: "Standardises calf weaning weight to a common age of 205 days so animals can be compared fairly.",
        inputs: &[
            num("Birth weight (kg)"),
            num("Actual weaning weight (kg)"),
            num("Actual age at weaning (days)"),
        ],
    },
    IndexDefinition {
        name: MORTALITY_RATE,
        short_name: "Mortality",
        concept: "Percentage of animals that died relative to the total at the start of the period or phase.",
        inputs: &[
            num("Number of dead animals"),
            num("Total animals at the start of the period"),
        ],
    },
    IndexDefinition {
        name: STOCKING_RATE,
        short_name: "Stocking",
        concept: "Animal units (1 AU = 450 kg live weight) per hectare of available pasture. Indicates grazing pressure.",
        inputs: &[
            num("Total number of animals"),
            num("Average live weight per animal (kg)"),
            num("Total pasture area (ha)"),
        ],
    },
    IndexDefinition {
        name: MILK_YIELD,
        short_name: "Milk Yield",
        concept: "Average amount of milk produced per lactating cow per day.",
        inputs: &[
            num("Total milk produced in the day (L)"),
            num("Number of lactating cows"),
        ],
    },
    IndexDefinition {
        name: AGE_AT_FIRST_CALVING,
        short_name: "AFC",
        concept: "Average age of heifers at their first calving. Drives rearing cost and the start of productive life.",
        inputs: &[
            date("Heifer birth date (dd/mm/yyyy)"),
            date("First calving date (dd/mm/yyyy)"),
        ],
    },
    IndexDefinition {
        name: CALVING_INTERVAL,
        short_name: "CI",
        concept: "Time between two consecutive calvings of the same cow. Directly reflects reproductive efficiency.",
        inputs: &[
            date("Previous calving date (dd/mm/yyyy)"),
            date("Current calving date (dd/mm/yyyy)"),
        ],
    },
    IndexDefinition {
        name: PREGNANCY_RATE,
        short_name: "Pregnancy",
        concept: "Percentage of eligible females that became pregnant within a defined breeding period.",
        inputs: &[
            num("Number of females diagnosed pregnant"),
            num("Number of eligible females (exposed)"),
        ],
    },
    IndexDefinition {
        name: FEED_CONVERSION,
        short_name: "Feed Conv.",
        concept: "Dry matter intake needed for each kg of live weight gain.",
        inputs: &[
            num("Dry matter intake (kg DM)"),
            num("Live weight gain (kg LW)"),
        ],
    },
    IndexDefinition {
        name: CARCASS_YIELD,
        short_name: "Carcass",
        concept: "Percentage of the animal's live weight converted into carcass after slaughter.",
        inputs: &[
            num("Live weight before slaughter (kg)"),
            num("Carcass weight (kg)"),
        ],
    },
];

pub fn catalog() -> &'static [IndexDefinition] {
    CATALOG
}

pub fn find_index(name: &str) -> Option<&'static IndexDefinition> {
    CATALOG.iter().find(|d| d.name == name)
}

/// Case-insensitive substring match on the index name. An empty query returns
/// the whole catalog.
pub fn search_catalog(query: &str) -> Vec<&'static IndexDefinition> {
    let needle = query.trim().to_lowercase();
    CATALOG
        .iter()
        .filter(|d| needle.is_empty() || d.name.to_lowercase().contains(&needle))
        .collect()
}

fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

/// One computed value for an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationRecord {
    #[serde(default = "new_record_id")]
    pub id: String,
    #[serde(alias = "Resultado")]
    pub result_text: String,
    #[serde(alias = "Data")]
    pub date: String,
    #[serde(alias = "Hora", default)]
    pub time: String,
    #[serde(alias = "inputs", default)]
    pub raw_inputs: Vec<String>,
}

impl CalculationRecord {
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.date.trim(), DATE_FORMAT).ok()
    }

    /// Date and time combined. A missing time counts as midnight.
    pub fn parsed_timestamp(&self) -> Option<NaiveDateTime> {
        let time = if self.time.trim().is_empty() {
            "00:00"
        } else {
            self.time.trim()
        };
        NaiveDateTime::parse_from_str(
            &format!("{} {}", self.date.trim(), time),
            &format!("{} {}", DATE_FORMAT, TIME_FORMAT),
        )
        .ok()
    }
}

/// Index name to its records in append order.
pub type CalculatedIndices = BTreeMap<String, Vec<CalculationRecord>>;

/// Newest first by parsed date and time. Falls back to reversed append order
/// when any record carries an unparsable stamp.
pub fn newest_first(records: &[CalculationRecord]) -> Vec<&CalculationRecord> {
    let stamps: Option<Vec<NaiveDateTime>> =
        records.iter().map(|r| r.parsed_timestamp()).collect();
    match stamps {
        Some(stamps) => {
            let mut paired: Vec<_> = stamps.into_iter().zip(records.iter()).collect();
            paired.sort_by(|a, b| b.0.cmp(&a.0));
            paired.into_iter().map(|(_, r)| r).collect()
        }
        None => records.iter().rev().collect(),
    }
}
