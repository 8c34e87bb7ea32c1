//! Countries
//!
//! Static country reference data, loaded once from the store configuration and
//! shared immutably afterwards.

use rustc_hash::FxHashMap;
use rusty_money::{Money, iso::Currency};
use smallvec::SmallVec;
use thiserror::Error;

pub mod phone;

pub use phone::{PhoneError, PhonePlan};

/// Maximum number of suggestions offered for an unknown country name.
pub const MAX_SUGGESTIONS: usize = 3;

/// Shortest common prefix that makes a country a suggestion for a typo.
const SUGGESTION_PREFIX_LEN: usize = 3;

/// Errors raised when building a country table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CountryTableError {
    /// Two records share a name (case-insensitive).
    #[error("country {0} is defined more than once")]
    DuplicateName(String),
}

/// A country the store ships to.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryRecord {
    name: String,
    iso_code: String,
    base_shipping_cost: Money<'static, Currency>,
    phone: PhonePlan,
}

impl CountryRecord {
    /// Create a new country record.
    pub fn new(
        name: impl Into<String>,
        iso_code: impl Into<String>,
        base_shipping_cost: Money<'static, Currency>,
        phone: PhonePlan,
    ) -> Self {
        Self {
            name: name.into(),
            iso_code: iso_code.into(),
            base_shipping_cost,
            phone,
        }
    }

    /// Display name, also the lookup key
    pub fn name(&self) -> &str {
        &self.name
    }

    /// ISO 3166-1 alpha-2 code
    pub fn iso_code(&self) -> &str {
        &self.iso_code
    }

    /// Shipping cost before any threshold or discount
    pub fn base_shipping_cost(&self) -> Money<'static, Currency> {
        self.base_shipping_cost
    }

    /// Phone numbering plan
    pub fn phone(&self) -> &PhonePlan {
        &self.phone
    }
}

/// Country lookup table keyed by case-insensitive name.
#[derive(Debug, Clone, Default)]
pub struct CountryTable {
    records: Vec<CountryRecord>,
    by_name: FxHashMap<String, usize>,
}

impl CountryTable {
    /// Build a table from records.
    ///
    /// # Errors
    ///
    /// Returns [`CountryTableError::DuplicateName`] if two records share a name.
    pub fn new(records: impl IntoIterator<Item = CountryRecord>) -> Result<Self, CountryTableError> {
        let records: Vec<CountryRecord> = records.into_iter().collect();
        let mut by_name = FxHashMap::default();

        for (idx, record) in records.iter().enumerate() {
            if by_name.insert(fold(&record.name), idx).is_some() {
                return Err(CountryTableError::DuplicateName(record.name.clone()));
            }
        }

        Ok(Self { records, by_name })
    }

    /// Find a country by name, ignoring case and surrounding whitespace.
    pub fn get(&self, name: &str) -> Option<&CountryRecord> {
        self.by_name
            .get(&fold(name))
            .and_then(|idx| self.records.get(*idx))
    }

    /// Suggest up to [`MAX_SUGGESTIONS`] country names for an unmatched query.
    ///
    /// A country is a candidate when its name contains the query, its ISO code
    /// matches the query, or its name shares a leading prefix with the query.
    /// Candidates sharing a longer prefix come first; ties keep table order.
    pub fn suggest(&self, query: &str) -> SmallVec<[String; MAX_SUGGESTIONS]> {
        let query = fold(query);

        if query.is_empty() {
            return SmallVec::new();
        }

        let prefix_len = SUGGESTION_PREFIX_LEN.min(query.chars().count());

        let mut candidates: SmallVec<[(usize, usize); 8]> = self
            .records
            .iter()
            .enumerate()
            .filter_map(|(idx, record)| {
                let name = fold(&record.name);
                let shared = common_prefix_len(&name, &query);

                let matches = name.contains(&query)
                    || record.iso_code.eq_ignore_ascii_case(&query)
                    || shared >= prefix_len;

                matches.then_some((shared, idx))
            })
            .collect();

        candidates.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        candidates
            .into_iter()
            .filter_map(|(_, idx)| self.records.get(idx))
            .map(|record| record.name.clone())
            .take(MAX_SUGGESTIONS)
            .collect()
    }

    /// Records in configuration order.
    pub fn records(&self) -> impl Iterator<Item = &CountryRecord> {
        self.records.iter()
    }

    /// Number of countries.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn fold(name: &str) -> String {
    name.trim().to_lowercase()
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}
