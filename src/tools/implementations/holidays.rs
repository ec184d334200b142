//! Public holiday lookup tool

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::tools::registry::Tool;
use crate::tools::types::ToolSchema;
use crate::types::ToolOutcome;

/// Region code, holiday date (MM-DD), holiday name
const HOLIDAYS: &[(&str, &str, &str)] = &[
    ("us", "01-01", "New Year's Day"),
    ("us", "07-04", "Independence Day"),
    ("us", "12-25", "Christmas Day"),
    ("de", "01-01", "Neujahr"),
    ("de", "10-03", "Tag der Deutschen Einheit"),
    ("de", "12-25", "Erster Weihnachtstag"),
    ("za", "01-01", "New Year's Day"),
    ("za", "04-27", "Freedom Day"),
    ("za", "12-16", "Day of Reconciliation"),
    ("za", "12-25", "Christmas Day"),
];

/// Validated input record
#[derive(Debug, Deserialize)]
struct HolidayArgs {
    region: String,
    #[serde(default)]
    month: Option<u32>,
}

/// Static public holiday lookup (safe to retry)
#[derive(Debug, Default)]
pub struct HolidayLookup;

impl HolidayLookup {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for HolidayLookup {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "lookup_holidays",
            "List public holidays for a region, optionally filtered by month",
            json!({
                "type": "object",
                "properties": {
                    "region": {
                        "type": "string",
                        "description": "Two-letter region code, e.g. us, de, za"
                    },
                    "month": {
                        "type": "integer",
                        "description": "Month 1-12 to filter by",
                        "minimum": 1,
                        "maximum": 12
                    }
                },
                "required": ["region"]
            }),
            false,
        )
    }

    async fn invoke(&self, args: &serde_json::Value) -> ToolOutcome {
        let parsed: HolidayArgs = match serde_json::from_value(args.clone()) {
            Ok(parsed) => parsed,
            Err(e) => return ToolOutcome::err("lookup_holidays", e.to_string(), 0),
        };

        let region = parsed.region.to_ascii_lowercase();
        if !HOLIDAYS.iter().any(|(r, _, _)| *r == region) {
            return ToolOutcome::err(
                "lookup_holidays",
                format!("unknown region: {}", parsed.region),
                0,
            );
        }

        if let Some(month) = parsed.month {
            if !(1..=12).contains(&month) {
                return ToolOutcome::err(
                    "lookup_holidays",
                    format!("month out of range: {}", month),
                    0,
                );
            }
        }

        let holidays: Vec<serde_json::Value> = HOLIDAYS
            .iter()
            .filter(|(r, date, _)| {
                *r == region
                    && parsed
                        .month
                        .map(|m| date.starts_with(&format!("{:02}-", m)))
                        .unwrap_or(true)
            })
            .map(|(_, date, name)| json!({ "date": date, "name": name }))
            .collect();

        ToolOutcome::ok(
            "lookup_holidays",
            json!({ "region": region, "holidays": holidays }),
            0,
        )
    }
}
