use tracing::warn;

use crate::config::{DEFAULT_CITY, DEFAULT_IMAGE};
use crate::ingest::classify::classify;
use crate::ingest::table::{normalize_header, Row};
use crate::models::{NewObject, ObjectStatus};

/// Fallback chains of column names, tried in order.
pub mod aliases {
    pub const TITLE: &[&str] = &["Название объекта", "Объект", "Название", "Title", "Name"];
    pub const TYPE: &[&str] = &["Тип", "Тип объекта", "Type", "Property type"];
    pub const CITY: &[&str] = &["Город", "Локация", "City", "Location"];
    pub const ADDRESS: &[&str] = &["Адрес", "Расположение", "Address"];
    pub const PRICE: &[&str] = &["Цена", "Стоимость", "Price"];
    pub const YIELD: &[&str] = &["Доходность %", "Доходность", "Yield"];
    pub const PAYBACK: &[&str] = &["Окупаемость", "Payback", "Срок окупаемости"];
    pub const AREA: &[&str] = &["Площадь", "Area"];
    pub const IMAGE: &[&str] = &["Изображение", "Фото", "Image", "Photo"];
    pub const DESCRIPTION: &[&str] = &["Описание", "Description"];
    pub const STATUS: &[&str] = &["Статус", "Status"];
    pub const MONTHLY_INCOME: &[&str] = &["Месячный доход", "Monthly income"];
    pub const MIN_INVESTMENT: &[&str] = &["Минимальные инвестиции", "Мин. вход", "Min investment"];
    pub const MONTHLY_PAYMENT: &[&str] = &["Ежемесячный платеж", "Monthly payment"];
    pub const STRATEGY: &[&str] = &["Стратегия", "Strategy"];
    pub const DEAL_CYCLE: &[&str] = &["Цикл сделки", "Deal cycle"];
    pub const PRESENTATION: &[&str] = &["Презентация", "Presentation"];
    pub const DECISION: &[&str] = &["Инвестиционное решение", "Investment decision"];
}

/// Header labels that sometimes reappear as data in the title column.
const TITLE_LABELS: &[&str] = &["Объект / фокус внимания"];

const PLACEHOLDERS: &[&str] = &["?", "н/д", "n/a", "-", "—"];

/// First non-empty value along an alias chain.
///
/// Exact header matches are preferred; failing that, a header that starts
/// with an alias followed by a non-letter (`"Доходность, %"`) is accepted.
pub fn lookup<'a>(row: &'a Row, chain: &[&str]) -> Option<&'a str> {
    let chain: Vec<String> = chain.iter().map(|a| normalize_header(a)).collect();

    for alias in &chain {
        if let Some(value) = row.get(alias) {
            return Some(value);
        }
    }

    for alias in &chain {
        let hit = row.fields.iter().find(|(header, value)| {
            !value.is_empty()
                && header.starts_with(alias.as_str())
                && header[alias.len()..]
                    .chars()
                    .next()
                    .map_or(false, |c| !c.is_alphabetic())
        });
        if let Some((_, value)) = hit {
            return Some(value.as_str());
        }
    }

    None
}

/// Lenient number coercion for hand-typed sheet cells.
///
/// `"1 500 000 ₽"` → 1500000, `"12,5%"` → 12.5, `"5-7 лет"` → 5.
/// Placeholders and unparseable text become 0.
pub fn parse_number(value: &str) -> f64 {
    let value = value.trim();
    if value.is_empty() || PLACEHOLDERS.contains(&value.to_lowercase().as_str()) {
        return 0.0;
    }

    let cleaned: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect::<String>()
        .replacen(',', ".", 1);

    leading_float(&cleaned).unwrap_or(0.0)
}

fn leading_float(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut end = 0;
    if bytes.first() == Some(&b'-') {
        end = 1;
    }
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => end += 1,
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }
    s[..end].parse::<f64>().ok().filter(|n| n.is_finite())
}

fn non_negative(field: &str, value: f64, line: usize) -> f64 {
    if value < 0.0 {
        warn!("Row {}: negative {} ({}) clamped to 0", line, field, value);
        0.0
    } else {
        value
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Maps free-form sheet rows onto [`NewObject`], filling defaults.
#[derive(Debug, Clone)]
pub struct Normalizer {
    pub default_city: String,
    pub default_image: String,
    pub broker_id: Option<i64>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            default_city: DEFAULT_CITY.to_string(),
            default_image: DEFAULT_IMAGE.to_string(),
            broker_id: None,
        }
    }
}

impl Normalizer {
    pub fn for_broker(&self, broker_id: Option<i64>) -> Self {
        Self {
            broker_id,
            ..self.clone()
        }
    }

    /// `None` for rows without a title (section breaks, repeated headers).
    pub fn normalize(&self, row: &Row) -> Option<NewObject> {
        let title = lookup(row, aliases::TITLE)?.to_string();
        if is_label(&title) {
            return None;
        }

        let line = row.line;
        let number = |chain: &[&str], field: &str| {
            lookup(row, chain).map(|v| non_negative(field, parse_number(v), line))
        };
        let text = |chain: &[&str]| lookup(row, chain).map(str::to_string);

        let property_type = classify(lookup(row, aliases::TYPE).unwrap_or(title.as_str()));
        let price = number(aliases::PRICE, "price").unwrap_or(0.0);
        let monthly_income = number(aliases::MONTHLY_INCOME, "monthly income");

        let mut yield_percent = number(aliases::YIELD, "yield").unwrap_or(0.0);
        let mut payback_years = number(aliases::PAYBACK, "payback").unwrap_or(0.0);
        if let Some(income) = monthly_income.filter(|i| *i > 0.0 && price > 0.0) {
            if yield_percent == 0.0 {
                yield_percent = round2(income * 12.0 / price * 100.0);
            }
            if payback_years == 0.0 {
                payback_years = round2(price / (income * 12.0));
            }
        }

        let status = match lookup(row, aliases::STATUS) {
            Some(raw) => ObjectStatus::parse(raw).unwrap_or_else(|| {
                warn!("Row {}: unknown status '{}', using available", line, raw);
                ObjectStatus::Available
            }),
            None => ObjectStatus::Available,
        };

        let images = lookup(row, aliases::IMAGE)
            .map(split_urls)
            .filter(|urls| !urls.is_empty())
            .unwrap_or_else(|| vec![self.default_image.clone()]);

        Some(NewObject {
            property_type,
            city: text(aliases::CITY).unwrap_or_else(|| self.default_city.clone()),
            address: text(aliases::ADDRESS).unwrap_or_default(),
            price,
            yield_percent,
            payback_years,
            area: number(aliases::AREA, "area").unwrap_or(0.0),
            status,
            images,
            description: text(aliases::DESCRIPTION).unwrap_or_else(|| title.clone()),
            broker_id: self.broker_id,
            monthly_income,
            min_investment: number(aliases::MIN_INVESTMENT, "min investment"),
            monthly_payment: number(aliases::MONTHLY_PAYMENT, "monthly payment"),
            strategy: text(aliases::STRATEGY),
            deal_cycle: text(aliases::DEAL_CYCLE),
            presentation_link: text(aliases::PRESENTATION),
            investment_decision: text(aliases::DECISION),
            title,
        })
    }
}

fn is_label(title: &str) -> bool {
    let title = normalize_header(title);
    aliases::TITLE
        .iter()
        .chain(TITLE_LABELS)
        .any(|label| normalize_header(label) == title)
}

fn split_urls(value: &str) -> Vec<String> {
    value
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|part| part.starts_with("http://") || part.starts_with("https://"))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PropertyType;

    fn row(pairs: &[(&str, &str)]) -> Row {
        Row::new(
            2,
            pairs
                .iter()
                .map(|(h, v)| (normalize_header(h), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn numbers_are_coerced_leniently() {
        assert_eq!(parse_number("1 500 000 ₽"), 1_500_000.0);
        assert_eq!(parse_number("12,5%"), 12.5);
        assert_eq!(parse_number("5-7 лет"), 5.0);
        assert_eq!(parse_number("н/д"), 0.0);
        assert_eq!(parse_number("?"), 0.0);
        assert_eq!(parse_number("abc"), 0.0);
        assert_eq!(parse_number(""), 0.0);
        assert_eq!(parse_number("-3"), -3.0);
        assert_eq!(parse_number("1.2.3"), 1.2);
    }

    #[test]
    fn alias_chain_order_and_prefix_match() {
        let r = row(&[("Стоимость", "200"), ("Цена", ""), ("Доходность, %", "11")]);
        assert_eq!(lookup(&r, aliases::PRICE), Some("200"));
        assert_eq!(lookup(&r, aliases::YIELD), Some("11"));

        let r = row(&[("Доходность", "9"), ("Доходность %", "11")]);
        assert_eq!(lookup(&r, aliases::YIELD), Some("11"));

        let r = row(&[("Название", "Лофт"), ("Объект", "Склад №4")]);
        assert_eq!(lookup(&r, aliases::TITLE), Some("Склад №4"));

        let r = row(&[("Типография", "x")]);
        assert_eq!(lookup(&r, aliases::TYPE), None);
    }

    #[test]
    fn full_row_is_normalized() {
        let r = row(&[
            ("Название объекта", "ЖК Север"),
            ("Тип", "Апартаменты"),
            ("Город", "Казань"),
            ("Адрес", "ул. Мира, 5"),
            ("Цена", "12 000 000"),
            ("Доходность %", "10,5"),
            ("Окупаемость", "9"),
            ("Площадь", "42.5 м²"),
            ("Фото", "https://a/1.jpg, https://a/2.jpg"),
            ("Статус", "Бронь"),
        ]);
        let obj = Normalizer::default().for_broker(Some(3)).normalize(&r).unwrap();
        assert_eq!(obj.title, "ЖК Север");
        assert_eq!(obj.property_type, PropertyType::Apartments);
        assert_eq!(obj.city, "Казань");
        assert_eq!(obj.price, 12_000_000.0);
        assert_eq!(obj.yield_percent, 10.5);
        assert_eq!(obj.payback_years, 9.0);
        assert_eq!(obj.area, 42.5);
        assert_eq!(obj.images, vec!["https://a/1.jpg", "https://a/2.jpg"]);
        assert_eq!(obj.status, ObjectStatus::Reserved);
        assert_eq!(obj.broker_id, Some(3));
        assert_eq!(obj.description, "ЖК Север");
    }

    #[test]
    fn defaults_fill_missing_columns() {
        let obj = Normalizer::default()
            .normalize(&row(&[("Объект", "Офис на Тверской")]))
            .unwrap();
        assert_eq!(obj.city, "Москва");
        assert_eq!(obj.address, "");
        assert_eq!(obj.price, 0.0);
        assert_eq!(obj.status, ObjectStatus::Available);
        assert_eq!(obj.images, vec![DEFAULT_IMAGE.to_string()]);
        // no type column: the title is classified instead
        assert_eq!(obj.property_type, PropertyType::Commercial);
        assert!(obj.strategy.is_none());
    }

    #[test]
    fn rows_without_title_or_with_label_title_are_skipped() {
        let n = Normalizer::default();
        assert!(n.normalize(&row(&[("Название", ""), ("Цена", "5")])).is_none());
        assert!(n.normalize(&row(&[("Название", "Название объекта")])).is_none());
        assert!(n.normalize(&row(&[("Объект", "Объект / фокус внимания")])).is_none());
    }

    #[test]
    fn negatives_are_clamped() {
        let obj = Normalizer::default()
            .normalize(&row(&[("Название", "Дом"), ("Цена", "-100"), ("Площадь", "-5")]))
            .unwrap();
        assert_eq!(obj.price, 0.0);
        assert_eq!(obj.area, 0.0);
    }

    #[test]
    fn yield_and_payback_derived_from_income() {
        let obj = Normalizer::default()
            .normalize(&row(&[
                ("Название", "Студия"),
                ("Цена", "6000000"),
                ("Месячный доход", "50000"),
            ]))
            .unwrap();
        assert_eq!(obj.monthly_income, Some(50_000.0));
        assert_eq!(obj.yield_percent, 10.0);
        assert_eq!(obj.payback_years, 10.0);
    }
}
