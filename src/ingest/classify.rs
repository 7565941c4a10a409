use crate::models::PropertyType;

const APARTMENTS: &[&str] = &["апарт", "apart"];
const COMMERCIAL: &[&str] = &["коммерч", "офис", "торгов", "commercial", "office", "retail"];
const COUNTRY: &[&str] = &["загород", "коттедж", "дом", "country", "cottage", "house"];

/// Guess the property type from free text (a type column, or a title when
/// the sheet has none). Checked in order; anything unrecognised is a flat.
pub fn classify(text: &str) -> PropertyType {
    let text = text.to_lowercase();
    let has = |keywords: &[&str]| keywords.iter().any(|k| text.contains(k));

    if has(APARTMENTS) {
        PropertyType::Apartments
    } else if has(COMMERCIAL) {
        PropertyType::Commercial
    } else if has(COUNTRY) {
        PropertyType::Country
    } else {
        PropertyType::Flats
    }
}
