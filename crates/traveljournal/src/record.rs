//! Travel location records.
//!
//! A [`Record`] is one journal entry as read from the `points` collection.
//! [`NewRecord`] and [`RecordPatch`] carry user input for creation and
//! editing and perform the presence checks before anything is sent.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ValidationErrors};
use crate::live::Entry;
use crate::maps::Coordinates;
use crate::remote::Fields;

/// Wire name of the favorite flag.
pub const FAVORITE_FIELD: &str = "isFavorite";

/// Misspelled accuracy key found on older entries.
pub const LEGACY_ACCURACY_FIELD: &str = "accuration";

/// A visited location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Store-assigned key. Not part of the stored value.
    #[serde(default, skip_deserializing)]
    pub id: String,

    /// Display name.
    #[serde(default)]
    pub name: String,

    /// `"<latitude>,<longitude>"` as entered or captured.
    #[serde(default)]
    pub coordinates: String,

    /// Free-text accuracy such as `"5 m"`.
    #[serde(
        default,
        alias = "accuration",
        skip_serializing_if = "Option::is_none"
    )]
    pub accuracy: Option<String>,

    /// Favorite flag; absent on records that were never toggled.
    #[serde(
        default,
        rename = "isFavorite",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_favorite: Option<bool>,
}

impl Record {
    /// Whether the record is marked favorite, treating an absent flag as false.
    #[must_use]
    pub fn favorite(&self) -> bool {
        self.is_favorite.unwrap_or(false)
    }

    /// Parse the coordinate string.
    ///
    /// # Errors
    ///
    /// Returns an error if the coordinates are not two numbers.
    pub fn position(&self) -> Result<Coordinates> {
        self.coordinates.parse()
    }
}

impl Entry for Record {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn label(&self) -> &str {
        &self.name
    }
}

/// User input for a new record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewRecord {
    /// Location name.
    pub name: String,
    /// Coordinate string.
    pub coordinates: String,
    /// Accuracy text.
    pub accuracy: String,
}

impl NewRecord {
    /// Create input from its three fields.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        coordinates: impl Into<String>,
        accuracy: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            coordinates: coordinates.into(),
            accuracy: accuracy.into(),
        }
    }

    /// Check that every field is present.
    ///
    /// # Errors
    ///
    /// Returns a validation error listing every missing field.
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        errors.require("name", &self.name, "Location name is required");
        errors.require("coordinates", &self.coordinates, "Coordinates are required");
        errors.require("accuracy", &self.accuracy, "Accuracy is required");
        errors.into_result()
    }

    /// Validate and convert into trimmed wire fields.
    ///
    /// # Errors
    ///
    /// Returns a validation error listing every missing field.
    pub fn into_fields(self) -> Result<Fields> {
        self.validate()?;

        let mut fields = Fields::new();
        fields.insert("name".into(), Value::String(self.name.trim().to_string()));
        fields.insert(
            "coordinates".into(),
            Value::String(self.coordinates.trim().to_string()),
        );
        fields.insert(
            "accuracy".into(),
            Value::String(self.accuracy.trim().to_string()),
        );
        Ok(fields)
    }
}

/// A partial edit of an existing record. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    /// New name.
    pub name: Option<String>,
    /// New coordinate string.
    pub coordinates: Option<String>,
    /// New accuracy text.
    pub accuracy: Option<String>,
}

impl RecordPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.coordinates.is_none() && self.accuracy.is_none()
    }

    /// Check that the patch names at least one field and no named field is blank.
    ///
    /// # Errors
    ///
    /// Returns a validation error describing the offending fields.
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();
        if self.is_empty() {
            errors.push("patch", "At least one field must be changed");
        }
        if let Some(name) = &self.name {
            errors.require("name", name, "Location name cannot be empty");
        }
        if let Some(coordinates) = &self.coordinates {
            errors.require("coordinates", coordinates, "Coordinates cannot be empty");
        }
        if let Some(accuracy) = &self.accuracy {
            errors.require("accuracy", accuracy, "Accuracy cannot be empty");
        }
        errors.into_result()
    }

    /// Validate and convert into trimmed wire fields.
    ///
    /// Setting the accuracy also removes the legacy key, since an entry
    /// holding both would no longer decode.
    ///
    /// # Errors
    ///
    /// Returns a validation error describing the offending fields.
    pub fn into_fields(self) -> Result<Fields> {
        self.validate()?;

        let mut fields = Fields::new();
        if self.accuracy.is_some() {
            fields.insert(LEGACY_ACCURACY_FIELD.into(), Value::Null);
        }
        for (key, value) in [
            ("name", self.name),
            ("coordinates", self.coordinates),
            ("accuracy", self.accuracy),
        ] {
            if let Some(value) = value {
                fields.insert(key.into(), Value::String(value.trim().to_string()));
            }
        }
        Ok(fields)
    }
}
