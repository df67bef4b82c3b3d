use crate::error::{MissingFieldSnafu, ValidationError};
use jiff::civil::Date;
use maud::{Render, html, Markup};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// The four editable values of a student record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RecordFields {
    pub full_name: String,
    pub registration_number: String,
    pub email: String,
    pub birth_date: String,
}

/// One student, as last read from the store.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Record {
    pub id: Uuid,
    #[sqlx(flatten)]
    pub fields: RecordFields,
    pub owner_id: Uuid,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub fields: RecordFields,
    pub owner_id: Uuid,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    FullName,
    RegistrationNumber,
    Email,
    BirthDate,
}

impl Field {
    pub const ALL: [Self; 4] = [
        Self::FullName,
        Self::RegistrationNumber,
        Self::Email,
        Self::BirthDate,
    ];

    /// Form input name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::FullName => "full_name",
            Self::RegistrationNumber => "registration_number",
            Self::Email => "email",
            Self::BirthDate => "birth_date",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::FullName => "Full Name",
            Self::RegistrationNumber => "Registration Number",
            Self::Email => "Email",
            Self::BirthDate => "Birth Date",
        }
    }

    pub const fn input_type(self) -> &'static str {
        match self {
            Self::FullName | Self::RegistrationNumber => "text",
            Self::Email => "email",
            Self::BirthDate => "date",
        }
    }
}

impl RecordFields {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::FullName => &self.full_name,
            Field::RegistrationNumber => &self.registration_number,
            Field::Email => &self.email,
            Field::BirthDate => &self.birth_date,
        }
    }

    pub fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::FullName => &mut self.full_name,
            Field::RegistrationNumber => &mut self.registration_number,
            Field::Email => &mut self.email,
            Field::BirthDate => &mut self.birth_date,
        };
        *slot = value;
    }
}

/// Values held by the open add/edit form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormDraft {
    fields: RecordFields,
}

impl FormDraft {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn seeded_from(record: &Record) -> Self {
        Self {
            fields: record.fields.clone(),
        }
    }

    pub const fn fields(&self) -> &RecordFields {
        &self.fields
    }

    pub fn get(&self, field: Field) -> &str {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.fields.set(field, value.into());
    }

    /// Whitespace-only values count as missing. Values are submitted as typed.
    pub fn validate(&self) -> Result<RecordFields, ValidationError> {
        for field in Field::ALL {
            snafu::ensure!(!self.get(field).trim().is_empty(), MissingFieldSnafu { field });
        }
        Ok(self.fields.clone())
    }
}

/// `dd/mm/yyyy` for ISO dates, anything else as stored.
pub struct BirthDateDisplay<'a>(pub &'a str);

impl Render for BirthDateDisplay<'_> {
    fn render(&self) -> Markup {
        match self.0.parse::<Date>() {
            Ok(date) => html! {(date.strftime("%d/%m/%Y").to_string())},
            Err(_) => html! {(self.0)},
        }
    }
}
