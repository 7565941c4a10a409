use std::collections::HashMap;

use serde::Serialize;

use crate::models::{InvestmentObject, ObjectStatus, Role, User};

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Dashboard {
    pub users: usize,
    pub investors: usize,
    pub brokers: usize,
    pub admins: usize,
    pub objects: usize,
    pub available: usize,
    pub reserved: usize,
    pub sold: usize,
    pub total_value: f64,
    pub average_yield: f64,
    pub by_city: Vec<(String, usize)>,
    pub by_type: Vec<(String, usize)>,
}

/// Count per key, most frequent first, ties by name.
fn distribution<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for key in keys {
        *counts.entry(key).or_default() += 1;
    }
    let mut sorted: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(key, count)| (key.to_string(), count))
        .collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted
}

pub fn dashboard(users: &[User], objects: &[InvestmentObject]) -> Dashboard {
    let role_count = |role: Role| users.iter().filter(|u| u.role == role).count();
    let status_count = |status: ObjectStatus| objects.iter().filter(|o| o.fields.status == status).count();

    let average_yield = if objects.is_empty() {
        0.0
    } else {
        objects.iter().map(|o| o.fields.yield_percent).sum::<f64>() / objects.len() as f64
    };

    Dashboard {
        users: users.len(),
        investors: role_count(Role::Investor),
        brokers: role_count(Role::Broker),
        admins: users.iter().filter(|u| u.is_admin()).count(),
        objects: objects.len(),
        available: status_count(ObjectStatus::Available),
        reserved: status_count(ObjectStatus::Reserved),
        sold: status_count(ObjectStatus::Sold),
        total_value: objects.iter().map(|o| o.fields.price).sum(),
        average_yield,
        by_city: distribution(objects.iter().map(|o| o.fields.city.as_str())),
        by_type: distribution(objects.iter().map(|o| o.fields.property_type.as_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewObject, PropertyType};
    use chrono::Utc;

    fn user(id: i64, role: Role, is_admin: bool) -> User {
        User {
            id,
            email: format!("u{id}@x.ru"),
            name: format!("User {id}"),
            role,
            is_admin,
            notify_new_objects: false,
            created_at: None,
        }
    }

    fn object(city: &str, kind: PropertyType, status: ObjectStatus, price: f64, yield_percent: f64) -> InvestmentObject {
        InvestmentObject {
            id: 0,
            fields: NewObject {
                title: "Объект".into(),
                city: city.into(),
                property_type: kind,
                status,
                price,
                yield_percent,
                ..Default::default()
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_dashboard_has_zero_yield() {
        let stats = dashboard(&[], &[]);
        assert_eq!(stats.average_yield, 0.0);
        assert_eq!(stats.total_value, 0.0);
        assert!(stats.by_city.is_empty());
    }

    #[test]
    fn counts_and_distributions() {
        let users = vec![
            user(1, Role::Investor, false),
            user(2, Role::Investor, true),
            user(3, Role::Broker, false),
            user(4, Role::Admin, false),
        ];
        let objects = vec![
            object("Казань", PropertyType::Flats, ObjectStatus::Available, 5.0, 8.0),
            object("Москва", PropertyType::Flats, ObjectStatus::Sold, 10.0, 10.0),
            object("Москва", PropertyType::Commercial, ObjectStatus::Reserved, 20.0, 12.0),
            object("Адлер", PropertyType::Country, ObjectStatus::Available, 15.0, 6.0),
        ];

        let stats = dashboard(&users, &objects);
        assert_eq!((stats.investors, stats.brokers, stats.admins), (2, 1, 2));
        assert_eq!((stats.available, stats.reserved, stats.sold), (2, 1, 1));
        assert_eq!(stats.total_value, 50.0);
        assert_eq!(stats.average_yield, 9.0);
        assert_eq!(
            stats.by_city,
            vec![
                ("Москва".to_string(), 2),
                ("Адлер".to_string(), 1),
                ("Казань".to_string(), 1)
            ]
        );
        assert_eq!(stats.by_type[0], ("flats".to_string(), 2));
    }
}
