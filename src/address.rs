//! Shipping addresses
//!
//! [`AddressValidator`] is the gate between a user-entered [`ShippingAddress`]
//! and everything downstream. It either returns a [`NormalizedAddress`] or every
//! problem it found at once; there is no partially valid address.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;
use tracing::debug;

use crate::countries::{CountryRecord, CountryTable, MAX_SUGGESTIONS, PhoneError};

/// Shipping address as entered by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    /// Given name
    pub first_name: String,

    /// Family name
    pub last_name: String,

    /// Street and house number
    pub street: String,

    /// City
    pub city: String,

    /// Postal code
    pub postal_code: String,

    /// Country display name
    pub country_name: String,

    /// Phone number, in any form the country's plan accepts
    #[serde(rename = "phoneE164")]
    pub phone: String,
}

/// An address that passed validation.
///
/// Fields are trimmed, the country is the canonical record name and the phone
/// is in canonical international form. Only [`AddressValidator::validate`]
/// creates these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedAddress {
    first_name: String,
    last_name: String,
    street: String,
    city: String,
    postal_code: String,
    country_name: String,
    #[serde(rename = "phoneE164")]
    phone: String,
}

impl NormalizedAddress {
    /// Given name
    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    /// Family name
    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    /// Street and house number
    pub fn street(&self) -> &str {
        &self.street
    }

    /// City
    pub fn city(&self) -> &str {
        &self.city
    }

    /// Postal code
    pub fn postal_code(&self) -> &str {
        &self.postal_code
    }

    /// Canonical country name
    pub fn country_name(&self) -> &str {
        &self.country_name
    }

    /// Phone in canonical international form, e.g. `+49 151 23456789`
    pub fn phone(&self) -> &str {
        &self.phone
    }
}

impl From<NormalizedAddress> for ShippingAddress {
    fn from(address: NormalizedAddress) -> Self {
        Self {
            first_name: address.first_name,
            last_name: address.last_name,
            street: address.street,
            city: address.city,
            postal_code: address.postal_code,
            country_name: address.country_name,
            phone: address.phone,
        }
    }
}

/// Address fields, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AddressField {
    /// Given name
    FirstName,
    /// Family name
    LastName,
    /// Street
    Street,
    /// City
    City,
    /// Postal code
    PostalCode,
    /// Country
    CountryName,
    /// Phone
    #[serde(rename = "phoneE164")]
    Phone,
}

impl AddressField {
    /// Every field, in display order.
    pub const ALL: [Self; 7] = [
        Self::FirstName,
        Self::LastName,
        Self::Street,
        Self::City,
        Self::PostalCode,
        Self::CountryName,
        Self::Phone,
    ];

    /// Raw value of this field on an address.
    pub fn value(self, address: &ShippingAddress) -> &str {
        match self {
            Self::FirstName => &address.first_name,
            Self::LastName => &address.last_name,
            Self::Street => &address.street,
            Self::City => &address.city,
            Self::PostalCode => &address.postal_code,
            Self::CountryName => &address.country_name,
            Self::Phone => &address.phone,
        }
    }
}

impl fmt::Display for AddressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FirstName => "first name",
            Self::LastName => "last name",
            Self::Street => "street",
            Self::City => "city",
            Self::PostalCode => "postal code",
            Self::CountryName => "country",
            Self::Phone => "phone",
        })
    }
}

/// A single problem with one address field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// The field is empty after trimming.
    #[error("{0} is required")]
    Missing(AddressField),

    /// The country name does not match any known country.
    #[error("unknown country{}", format_suggestions(.suggestions))]
    InvalidCountry {
        /// Up to three close matches
        suggestions: SmallVec<[String; MAX_SUGGESTIONS]>,
    },

    /// The phone number is not valid for the country.
    #[error("invalid phone number ({reason}), expected something like {example_format}")]
    InvalidPhone {
        /// Why the number was rejected
        reason: PhoneError,
        /// Example number for the country in canonical form
        example_format: String,
    },
}

impl FieldError {
    /// The field this error belongs to.
    pub fn field(&self) -> AddressField {
        match self {
            Self::Missing(field) => *field,
            Self::InvalidCountry { .. } => AddressField::CountryName,
            Self::InvalidPhone { .. } => AddressField::Phone,
        }
    }
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(", did you mean {}?", suggestions.join(", "))
    }
}

/// All problems found with an address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("address is invalid: {}", format_errors(.0))]
pub struct FieldErrors(SmallVec<[FieldError; 2]>);

impl FieldErrors {
    /// Errors in field order.
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// Errors for one field.
    pub fn for_field(&self, field: AddressField) -> impl Iterator<Item = &FieldError> {
        self.0.iter().filter(move |error| error.field() == field)
    }

    /// Number of errors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no errors.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn format_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validates and normalizes shipping addresses against a country table.
#[derive(Debug, Clone, Copy)]
pub struct AddressValidator<'a> {
    countries: &'a CountryTable,
}

impl<'a> AddressValidator<'a> {
    /// Create a validator over the given countries.
    pub fn new(countries: &'a CountryTable) -> Self {
        Self { countries }
    }

    /// Validate an address.
    ///
    /// Missing fields are all reported together with any country or phone
    /// problem. The phone is only checked once the country resolves.
    ///
    /// # Errors
    ///
    /// Returns [`FieldErrors`] listing every problem found.
    pub fn validate(&self, address: &ShippingAddress) -> Result<NormalizedAddress, FieldErrors> {
        let mut errors: SmallVec<[FieldError; 2]> = AddressField::ALL
            .into_iter()
            .filter(|field| field.value(address).trim().is_empty())
            .map(FieldError::Missing)
            .collect();

        let country = self.resolve_country(address, &mut errors);
        let phone = country.and_then(|country| Self::normalize_phone(country, address, &mut errors));

        match (country, phone) {
            (Some(country), Some(phone)) if errors.is_empty() => Ok(NormalizedAddress {
                first_name: address.first_name.trim().to_string(),
                last_name: address.last_name.trim().to_string(),
                street: address.street.trim().to_string(),
                city: address.city.trim().to_string(),
                postal_code: address.postal_code.trim().to_string(),
                country_name: country.name().to_string(),
                phone,
            }),
            _ => {
                debug!(error_count = errors.len(), "rejected shipping address");

                errors.sort_by_key(FieldError::field);

                Err(FieldErrors(errors))
            }
        }
    }

    fn resolve_country(
        &self,
        address: &ShippingAddress,
        errors: &mut SmallVec<[FieldError; 2]>,
    ) -> Option<&'a CountryRecord> {
        let name = address.country_name.trim();

        if name.is_empty() {
            return None;
        }

        let country = self.countries.get(name);

        if country.is_none() {
            errors.push(FieldError::InvalidCountry {
                suggestions: self.countries.suggest(name),
            });
        }

        country
    }

    fn normalize_phone(
        country: &CountryRecord,
        address: &ShippingAddress,
        errors: &mut SmallVec<[FieldError; 2]>,
    ) -> Option<String> {
        if address.phone.trim().is_empty() {
            return None;
        }

        country
            .phone()
            .normalize(&address.phone)
            .map_err(|reason| {
                errors.push(FieldError::InvalidPhone {
                    reason,
                    example_format: country.phone().example_format(),
                });
            })
            .ok()
    }
}
