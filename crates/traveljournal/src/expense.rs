//! Trip expenses kept in their own collection.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::{Result, ValidationErrors};
use crate::live::Entry;
use crate::remote::Fields;

/// A recorded expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    /// Store-assigned key.
    #[serde(default, skip_deserializing)]
    pub id: String,
    /// What the money was spent on.
    #[serde(default)]
    pub description: String,
    /// Amount spent.
    #[serde(default)]
    pub amount: f64,
    /// Day of the expense, `YYYY-MM-DD`.
    #[serde(default)]
    pub date: String,
}

impl Entry for Expense {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn label(&self) -> &str {
        &self.description
    }
}

/// Sum of all amounts.
#[must_use]
pub fn total(expenses: &[Expense]) -> f64 {
    expenses.iter().map(|e| e.amount).sum()
}

/// User input for a new expense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExpense {
    /// Description text.
    pub description: String,
    /// Amount as typed.
    pub amount: String,
    /// Date as typed; defaults to today.
    pub date: String,
}

impl NewExpense {
    /// Create input dated today.
    #[must_use]
    pub fn new(description: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            amount: amount.into(),
            date: today(),
        }
    }

    /// Override the date.
    #[must_use]
    pub fn on(mut self, date: impl Into<String>) -> Self {
        self.date = date.into();
        self
    }

    /// Validate and convert into wire fields.
    ///
    /// # Errors
    ///
    /// Returns a validation error listing every missing or malformed field.
    pub fn into_fields(self) -> Result<Fields> {
        let mut errors = ValidationErrors::new();
        errors.require("description", &self.description, "Description is required");
        errors.require("date", &self.date, "Date is required");

        let amount = self.amount.trim();
        let parsed = if amount.is_empty() {
            errors.push("amount", "Amount is required");
            None
        } else {
            match amount.parse::<f64>().ok().and_then(Number::from_f64) {
                Some(number) => Some(number),
                None => {
                    errors.push("amount", "Amount must be a number");
                    None
                }
            }
        };
        errors.into_result()?;

        let mut fields = Fields::new();
        fields.insert(
            "description".into(),
            Value::String(self.description.trim().to_string()),
        );
        if let Some(number) = parsed {
            fields.insert("amount".into(), Value::Number(number));
        }
        fields.insert("date".into(), Value::String(self.date.trim().to_string()));
        Ok(fields)
    }
}

fn today() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Whether a date string is a valid `YYYY-MM-DD` day.
#[must_use]
pub fn is_iso_date(value: &str) -> bool {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").is_ok()
}
