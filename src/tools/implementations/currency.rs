//! Currency conversion tool

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::tools::registry::Tool;
use crate::tools::types::ToolSchema;
use crate::types::ToolOutcome;

/// Exchange rates against USD. A real deployment would pull these from a
/// rates provider; the table keeps the tool deterministic.
const USD_RATES: &[(&str, f64)] = &[
    ("USD", 1.0),
    ("EUR", 0.92),
    ("GBP", 0.79),
    ("JPY", 148.0),
    ("CHF", 0.88),
    ("ZAR", 18.2),
];

/// Validated input record
#[derive(Debug, Deserialize)]
struct ConvertArgs {
    amount: f64,
    from: String,
    to: String,
}

/// Fixed-rate currency converter (safe to retry)
#[derive(Debug, Default)]
pub struct CurrencyConverter;

impl CurrencyConverter {
    pub fn new() -> Self {
        Self
    }

    fn rate(code: &str) -> Option<f64> {
        let upper = code.to_ascii_uppercase();
        USD_RATES
            .iter()
            .find(|(c, _)| *c == upper)
            .map(|(_, r)| *r)
    }
}

#[async_trait]
impl Tool for CurrencyConverter {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new(
            "convert_currency",
            "Convert an amount from one currency to another",
            json!({
                "type": "object",
                "properties": {
                    "amount": {
                        "type": "number",
                        "description": "Amount in the source currency"
                    },
                    "from": {
                        "type": "string",
                        "description": "Source currency code, e.g. USD"
                    },
                    "to": {
                        "type": "string",
                        "description": "Target currency code, e.g. EUR"
                    }
                },
                "required": ["amount", "from", "to"]
            }),
            false,
        )
    }

    async fn invoke(&self, args: &serde_json::Value) -> ToolOutcome {
        let parsed: ConvertArgs = match serde_json::from_value(args.clone()) {
            Ok(parsed) => parsed,
            Err(e) => return ToolOutcome::err("convert_currency", e.to_string(), 0),
        };

        let Some(from_rate) = Self::rate(&parsed.from) else {
            return ToolOutcome::err(
                "convert_currency",
                format!("unsupported currency: {}", parsed.from),
                0,
            );
        };
        let Some(to_rate) = Self::rate(&parsed.to) else {
            return ToolOutcome::err(
                "convert_currency",
                format!("unsupported currency: {}", parsed.to),
                0,
            );
        };

        let converted = parsed.amount / from_rate * to_rate;

        ToolOutcome::ok(
            "convert_currency",
            json!({
                "amount": parsed.amount,
                "from": parsed.from.to_ascii_uppercase(),
                "to": parsed.to.to_ascii_uppercase(),
                "converted": (converted * 100.0).round() / 100.0,
            }),
            0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_usd_to_eur() {
        let tool = CurrencyConverter::new();
        let outcome = tool
            .invoke(&json!({"amount": 100.0, "from": "USD", "to": "EUR"}))
            .await;

        assert!(outcome.is_ok());
        assert!(outcome.render().contains("92"));
    }

    #[tokio::test]
    async fn test_case_insensitive_codes() {
        let tool = CurrencyConverter::new();
        let outcome = tool
            .invoke(&json!({"amount": 10.0, "from": "usd", "to": "gbp"}))
            .await;
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn test_unsupported_currency() {
        let tool = CurrencyConverter::new();
        let outcome = tool
            .invoke(&json!({"amount": 10.0, "from": "USD", "to": "XYZ"}))
            .await;

        assert!(!outcome.is_ok());
        assert!(outcome.render().contains("XYZ"));
    }
}
