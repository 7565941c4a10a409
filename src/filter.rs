use std::cmp::Ordering;

use crate::models::{InvestmentObject, ObjectStatus, PropertyType};

/// Catalogue yield ranges, percent
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum YieldBucket {
    #[value(name = "0-5")]
    Low,
    #[value(name = "5-10")]
    Medium,
    #[value(name = "10-15")]
    High,
    #[value(name = "15+")]
    Top,
}

impl YieldBucket {
    /// Lower bound and optional upper bound of the range.
    pub fn bounds(self) -> (f64, Option<f64>) {
        match self {
            YieldBucket::Low => (0.0, Some(5.0)),
            YieldBucket::Medium => (5.0, Some(10.0)),
            YieldBucket::High => (10.0, Some(15.0)),
            YieldBucket::Top => (15.0, None),
        }
    }

    pub fn contains(self, value: f64) -> bool {
        let (low, high) = self.bounds();
        in_range(value, low, high)
    }
}

/// Catalogue payback ranges, years
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PaybackBucket {
    #[value(name = "0-3")]
    Fast,
    #[value(name = "3-5")]
    Short,
    #[value(name = "5-7")]
    Medium,
    #[value(name = "7+")]
    Long,
}

impl PaybackBucket {
    pub fn contains(self, value: f64) -> bool {
        let (low, high) = match self {
            PaybackBucket::Fast => (0.0, Some(3.0)),
            PaybackBucket::Short => (3.0, Some(5.0)),
            PaybackBucket::Medium => (5.0, Some(7.0)),
            PaybackBucket::Long => (7.0, None),
        };
        in_range(value, low, high)
    }
}

fn in_range(value: f64, low: f64, high: Option<f64>) -> bool {
    value >= low && high.map_or(true, |high| value < high)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SortOrder {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    YieldDesc,
    PaybackAsc,
}

impl SortOrder {
    fn compare(self, a: &InvestmentObject, b: &InvestmentObject) -> Ordering {
        match self {
            SortOrder::Newest => b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)),
            SortOrder::PriceAsc => a.fields.price.total_cmp(&b.fields.price),
            SortOrder::PriceDesc => b.fields.price.total_cmp(&a.fields.price),
            SortOrder::YieldDesc => b.fields.yield_percent.total_cmp(&a.fields.yield_percent),
            SortOrder::PaybackAsc => a.fields.payback_years.total_cmp(&b.fields.payback_years),
        }
    }
}

/// Catalogue filters. Empty lists and `None` match everything; several
/// values in one list match any of them.
#[derive(Debug, Clone, Default)]
pub struct ObjectFilters {
    pub search: Option<String>,
    pub cities: Vec<String>,
    pub types: Vec<PropertyType>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub yields: Vec<YieldBucket>,
    pub paybacks: Vec<PaybackBucket>,
    pub status: Option<ObjectStatus>,
}

impl ObjectFilters {
    pub fn matches(&self, object: &InvestmentObject) -> bool {
        let fields = &object.fields;

        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let hit = [&fields.title, &fields.city, &fields.address]
                .iter()
                .any(|text| text.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        if !self.cities.is_empty()
            && !self
                .cities
                .iter()
                .any(|c| c.trim().to_lowercase() == fields.city.trim().to_lowercase())
        {
            return false;
        }

        if !self.types.is_empty() && !self.types.contains(&fields.property_type) {
            return false;
        }

        if self.min_price.map_or(false, |min| fields.price < min)
            || self.max_price.map_or(false, |max| fields.price > max)
        {
            return false;
        }

        if !self.yields.is_empty() && !self.yields.iter().any(|b| b.contains(fields.yield_percent)) {
            return false;
        }

        if !self.paybacks.is_empty()
            && !self.paybacks.iter().any(|b| b.contains(fields.payback_years))
        {
            return false;
        }

        self.status.map_or(true, |status| fields.status == status)
    }

    pub fn apply<'a>(&self, objects: &'a [InvestmentObject], sort: SortOrder) -> Vec<&'a InvestmentObject> {
        let mut found: Vec<&InvestmentObject> = objects.iter().filter(|o| self.matches(o)).collect();
        found.sort_by(|a, b| sort.compare(a, b));
        found
    }
}
