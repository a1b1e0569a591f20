//! Data context: a condensed summary of recent index values for prompts.

use shared::indices::{newest_first, CalculationRecord};
use shared::AppState;

pub const CONTEXT_HEADING: &str = "## Context: Current BoviCheck Data";
/// Upper bound on records per index.
pub const MAX_RECORDS_PER_INDEX: usize = 5;

/// Every index with data, alphabetically. Empty when there is nothing to say.
pub fn format_data_context(state: &AppState) -> String {
    render(state, state.calculated_indices.keys().map(String::as_str))
}

/// Same layout restricted to one index.
pub fn format_data_context_for(state: &AppState, index_name: &str) -> String {
    render(state, std::iter::once(index_name))
}

fn render<'a>(state: &AppState, names: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for name in names {
        let records = state.history(name);
        if records.is_empty() {
            continue;
        }
        if out.is_empty() {
            out.push_str(CONTEXT_HEADING);
            out.push('\n');
        }
        out.push_str(&format!("\n### {}\n", name));
        for record in recent(records) {
            out.push_str(&format!(
                "- **{}** (Date: {})\n",
                record.result_text, record.date
            ));
        }
    }
    out
}

/// Newest first by date and time, or the last entries in list order when
/// any stamp fails to parse.
fn recent(records: &[CalculationRecord]) -> Vec<&CalculationRecord> {
    if records.iter().all(|r| r.parsed_timestamp().is_some()) {
        newest_first(records)
            .into_iter()
            .take(MAX_RECORDS_PER_INDEX)
            .collect()
    } else {
        let start = records.len().saturating_sub(MAX_RECORDS_PER_INDEX);
        records[start..].iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(day: u32, result: &str) -> CalculationRecord {
        CalculationRecord {
            id: format!("{}-{}", result, day),
            result_text: result.into(),
            date: format!("{:02}/01/2024", day),
            time: "12:00".into(),
            raw_inputs: vec![],
        }
    }

    #[test]
    fn empty_state_has_no_context() {
        assert_eq!(format_data_context(&AppState::default()), "");
        assert_eq!(
            format_data_context_for(&AppState::default(), "Birth Rate"),
            ""
        );
    }

    #[test]
    fn caps_each_index_at_five_newest() {
        let mut state = AppState::default();
        for day in 1..=7 {
            state.add_calculation("Weaning Rate", rec(day, &format!("{}.00 %", day)));
            state.add_calculation("Birth Rate", rec(day, &format!("{}0.00 %", day)));
        }
        let ctx = format_data_context(&state);
        assert!(ctx.starts_with(CONTEXT_HEADING));

        let birth = ctx.find("### Birth Rate").unwrap();
        let weaning = ctx.find("### Weaning Rate").unwrap();
        assert!(birth < weaning);

        let weaning_lines: Vec<_> = ctx[weaning..].lines().filter(|l| l.starts_with("- ")).collect();
        assert_eq!(weaning_lines.len(), 5);
        assert_eq!(weaning_lines[0], "- **7.00 %** (Date: 07/01/2024)");
        assert_eq!(weaning_lines[4], "- **3.00 %** (Date: 03/01/2024)");
        assert_eq!(ctx.lines().filter(|l| l.starts_with("- ")).count(), 10);
    }

    #[test]
    fn unparsable_dates_fall_back_to_last_five() {
        let mut state = AppState::default();
        for day in 1..=6 {
            state.add_calculation("Birth Rate", rec(day, &format!("{}.00 %", day)));
        }
        state.calculated_indices.get_mut("Birth Rate").unwrap()[0].date = "sometime".into();
        let ctx = format_data_context_for(&state, "Birth Rate");
        let lines: Vec<_> = ctx.lines().filter(|l| l.starts_with("- ")).collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains("2.00 %"));
        assert!(lines[4].contains("6.00 %"));
        assert!(!ctx.contains("sometime"));
    }
}
