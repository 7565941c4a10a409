use tracing::{debug, warn};

use crate::ingest::normalize::{lookup, Normalizer};
use crate::ingest::table::{normalize_header, Row, Table};
use crate::ingest::{BrokerDraft, ImportBatch, Owner, RowIssue};

/// Listings a broker row can carry in `broker-columns` sheets.
pub const MAX_SLOTS: usize = 10;

/// Records before the first listing in a broker's own tab.
const BROKER_SHEET_PREAMBLE: usize = 3;

/// Column positions in a broker's own tab, named after the alias they feed.
const BROKER_SHEET_COLUMNS: &[(usize, &str)] = &[
    (0, "Название"),
    (3, "Минимальные инвестиции"),
    (4, "Цена"),
    (5, "Ежемесячный платеж"),
    (6, "Стратегия"),
    (7, "Цикл сделки"),
    (8, "Доходность"),
    (12, "Презентация"),
    (14, "Инвестиционное решение"),
];

const SLOT_WORDS: &[&str] = &["объект", "object", "obj", "#", "№"];

mod broker_aliases {
    pub const NAME: &[&str] = &["Брокер", "ФИО", "Имя", "Broker", "Name"];
    pub const COMPANY: &[&str] = &["Компания", "Клуб", "Company", "Club"];
    pub const PHONE: &[&str] = &["Телефон", "Phone"];
    pub const EMAIL: &[&str] = &["Email", "E-mail", "Почта"];
    pub const CITY: &[&str] = &["Город", "City"];
}

/// One listing per row.
pub fn flat(table: &Table, normalizer: &Normalizer, batch: &mut ImportBatch) {
    batch.rows_read += table.rows.len();
    for row in &table.rows {
        match normalizer.normalize(row) {
            Some(object) => {
                let owner = Owner::Id(object.broker_id);
                batch.push(object, owner);
            }
            None => batch.skipped += 1,
        }
    }
}

/// Split a (normalized) header like `объект 3 цена` or `3. цена` into its
/// slot number and the field name behind it.
pub fn split_slot(header: &str) -> Option<(usize, String)> {
    let mut rest = header.trim();
    let mut had_word = false;
    for word in SLOT_WORDS {
        if let Some(stripped) = rest.strip_prefix(word) {
            rest = stripped.trim_start();
            had_word = true;
            break;
        }
    }

    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let slot: usize = rest[..digits].parse().ok()?;
    let after = &rest[digits..];

    let field = after.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '.' | '_' | ':' | '-' | ')'));
    // "1комн" is a value, not a slot; without a slot word a separator is required
    if field.is_empty() || (!had_word && field.len() == after.len()) {
        return None;
    }
    Some((slot, field.to_string()))
}

/// Separate a broker row into the broker's own columns and one row per
/// embedded listing slot, in slot order.
pub fn split_row(row: &Row) -> (Row, Vec<(usize, Row)>) {
    let mut own = Row::new(row.line, Vec::new());
    let mut slots: Vec<(usize, Row)> = Vec::new();

    for (header, value) in &row.fields {
        match split_slot(header) {
            Some((slot, field)) if (1..=MAX_SLOTS).contains(&slot) => {
                let idx = match slots.iter().position(|(n, _)| *n == slot) {
                    Some(idx) => idx,
                    None => {
                        slots.push((slot, Row::new(row.line, Vec::new())));
                        slots.len() - 1
                    }
                };
                slots[idx].1.fields.push((normalize_header(&field), value.clone()));
            }
            Some((slot, _)) => debug!("Ignoring column '{}' for slot {}", header, slot),
            None => own.fields.push((header.clone(), value.clone())),
        }
    }

    slots.sort_by_key(|(n, _)| *n);
    (own, slots)
}

fn broker_from_row(row: &Row) -> Option<BrokerDraft> {
    let text = |chain: &[&str]| lookup(row, chain).map(str::to_string);
    let broker = BrokerDraft {
        name: text(broker_aliases::NAME).unwrap_or_default(),
        company: text(broker_aliases::COMPANY).unwrap_or_default(),
        phone: text(broker_aliases::PHONE).unwrap_or_default(),
        email: text(broker_aliases::EMAIL).unwrap_or_default(),
        city: text(broker_aliases::CITY),
    };
    if broker.name.is_empty() && broker.email.is_empty() {
        None
    } else {
        Some(broker)
    }
}

/// One broker per row, each with up to [`MAX_SLOTS`] listings in numbered columns.
pub fn broker_columns(table: &Table, normalizer: &Normalizer, batch: &mut ImportBatch) {
    batch.rows_read += table.rows.len();

    for row in &table.rows {
        let (own, slots) = split_row(row);

        let Some(broker) = broker_from_row(&own) else {
            warn!("Row {}: no broker name or email, skipping", row.line);
            batch
                .issues
                .push(RowIssue::new(row.line, "missing broker name and email"));
            continue;
        };
        let owner = Owner::Draft(batch.add_broker(broker));

        let mut imported = 0;
        for (slot, slot_row) in &slots {
            if slot_row.is_blank() {
                continue;
            }
            match normalizer.normalize(slot_row) {
                Some(object) => {
                    if batch.push(object, owner) {
                        imported += 1;
                    }
                }
                None => {
                    debug!("Row {}: slot {} has no title", row.line, slot);
                    batch.skipped += 1;
                }
            }
        }
        debug!("Row {}: {} listings from {} slots", row.line, imported, slots.len());
    }
}

/// A broker's own tab: three preamble records, then one listing per record
/// at fixed positions. Every listing belongs to the normalizer's broker.
pub fn broker_sheet(records: &[Vec<String>], normalizer: &Normalizer, batch: &mut ImportBatch) {
    if records.len() < 2 {
        batch.issues.push(RowIssue::new(0, "No data or sheet not found"));
        return;
    }
    batch.owner = normalizer.broker_id;

    for (idx, record) in records.iter().enumerate().skip(BROKER_SHEET_PREAMBLE) {
        batch.rows_read += 1;
        let fields = BROKER_SHEET_COLUMNS
            .iter()
            .map(|(col, name)| {
                let value = record.get(*col).map(|v| v.trim().to_string()).unwrap_or_default();
                (normalize_header(name), value)
            })
            .collect();
        let row = Row::new(idx + 1, fields);

        match normalizer.normalize(&row) {
            Some(object) => {
                let owner = Owner::Id(object.broker_id);
                batch.push(object, owner);
            }
            None => batch.skipped += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::table::parse_table;
    use crate::ingest::{ingest, Layout};

    #[test]
    fn slot_headers() {
        assert_eq!(split_slot("объект 1 название"), Some((1, "название".into())));
        assert_eq!(split_slot("object 10 price"), Some((10, "price".into())));
        assert_eq!(split_slot("3. цена"), Some((3, "цена".into())));
        assert_eq!(split_slot("4_адрес"), Some((4, "адрес".into())));
        assert_eq!(split_slot("№2 площадь"), Some((2, "площадь".into())));
        assert_eq!(split_slot("объект2название"), Some((2, "название".into())));
        assert_eq!(split_slot("1комн"), None);
        assert_eq!(split_slot("цена"), None);
        assert_eq!(split_slot("объект"), None);
        assert_eq!(split_slot("5"), None);
    }

    #[test]
    fn broker_row_splits_into_slots() {
        let table = parse_table(
            "Брокер,Email,Объект 2 Название,Объект 1 Название,Объект 1 Цена,Объект 11 Название\n\
             Иван,ivan@x.ru,Склад,Студия,100,Лишний\n",
        )
        .unwrap();
        let (own, slots) = split_row(&table.rows[0]);
        assert_eq!(own.get("брокер"), Some("Иван"));
        assert_eq!(own.fields.len(), 2);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].0, 1);
        assert_eq!(slots[0].1.get("название"), Some("Студия"));
        assert_eq!(slots[0].1.get("цена"), Some("100"));
        assert_eq!(slots[1].1.get("название"), Some("Склад"));
    }

    #[test]
    fn broker_columns_layout() {
        let text = "Брокер,Компания,Email,Объект 1 Название,Объект 1 Цена,Объект 2 Название,Объект 2 Цена,Объект 3 Название\n\
                    Мария Волкова,Инвест Капитал,volkova@invest.ru,Апартаменты Сити,30000000,Склад,5000000,\n\
                    Дмитрий Петров,,petrov@estate.ru,Апартаменты Сити,31000000,,,\n\
                    ,,,Без брокера,1,,,\n";
        let batch = ingest(text, Layout::BrokerColumns, &Normalizer::default()).unwrap();

        assert_eq!(batch.brokers.len(), 2);
        assert_eq!(batch.brokers[0].company, "Инвест Капитал");
        assert_eq!(batch.objects.len(), 3);
        assert_eq!(batch.objects[0].owner, Owner::Draft(0));
        assert_eq!(batch.objects[1].object.title, "Склад");
        assert_eq!(batch.objects[2].owner, Owner::Draft(1));
        assert_eq!(batch.objects[2].object.price, 31_000_000.0);
        assert_eq!(batch.issues.len(), 1);
        assert_eq!(batch.issues[0].line, 4);
    }

    #[test]
    fn broker_sheet_layout() {
        let text = "Брокер: Юрий,,,,,,,,,\n\
                    Объект / фокус внимания,,,Вход,Цена,Платеж,Стратегия,Цикл,Доходность\n\
                    ,,,,,,,,\n\
                    Объект / фокус внимания,,,,,,,,\n\
                    Студия на Арбате,,,\"1 000 000\",\"8 500 000\",45000,Аренда,12 мес,\"14,5\",,,,https://deck,,Да\n\
                    Коттедж в Истре,,,?,н/д,,,,\n";
        let normalizer = Normalizer::default().for_broker(Some(2));
        let batch = ingest(text, Layout::BrokerSheet, &normalizer).unwrap();

        assert_eq!(batch.objects.len(), 2);
        assert_eq!(batch.skipped, 1);
        let first = &batch.objects[0].object;
        assert_eq!(first.title, "Студия на Арбате");
        assert_eq!(first.broker_id, Some(2));
        assert_eq!(first.min_investment, Some(1_000_000.0));
        assert_eq!(first.price, 8_500_000.0);
        assert_eq!(first.monthly_payment, Some(45_000.0));
        assert_eq!(first.strategy.as_deref(), Some("Аренда"));
        assert_eq!(first.deal_cycle.as_deref(), Some("12 мес"));
        assert_eq!(first.yield_percent, 14.5);
        assert_eq!(first.presentation_link.as_deref(), Some("https://deck"));
        assert_eq!(first.investment_decision.as_deref(), Some("Да"));
        let second = &batch.objects[1].object;
        assert_eq!(second.price, 0.0);
        assert_eq!(second.min_investment, Some(0.0));
        assert_eq!(batch.objects[1].owner, Owner::Id(Some(2)));
        assert_eq!(batch.owner, Some(2));
    }

    #[test]
    fn emptied_broker_sheet_still_names_its_owner() {
        let text = "Брокер: Юрий,,,\n\
                    Объект / фокус внимания,,,Вход\n\
                    ,,,\n\
                    Объект / фокус внимания,,,\n";
        let normalizer = Normalizer::default().for_broker(Some(7));
        let batch = ingest(text, Layout::BrokerSheet, &normalizer).unwrap();

        assert!(batch.objects.is_empty());
        assert_eq!(batch.owner, Some(7));
        assert!(!batch.is_empty());
    }

    #[test]
    fn broker_sheet_without_data() {
        let batch = ingest("only one line\n", Layout::BrokerSheet, &Normalizer::default()).unwrap();
        assert!(batch.objects.is_empty());
        assert_eq!(batch.issues.len(), 1);
        assert_eq!(batch.owner, None);
        assert!(batch.is_empty());
    }
}
