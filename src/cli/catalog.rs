use anyhow::Result;
use tracing::info;

use crate::analytics::{self, Dashboard};
use crate::api::{ObjectQuery, ObjectUpdate};
use crate::cli::{print_object, App};
use crate::filter::{ObjectFilters, SortOrder};
use crate::models::{InvestmentObject, ObjectStatus};

/// The API filters what it can; the rest is filtered locally.
fn remote_query(filters: &ObjectFilters) -> ObjectQuery {
    let (min_yield, max_yield) = match filters.yields.as_slice() {
        [bucket] => {
            let (low, high) = bucket.bounds();
            (Some(low), high)
        }
        _ => (None, None),
    };
    ObjectQuery {
        city: match filters.cities.as_slice() {
            [city] => Some(city.clone()),
            _ => None,
        },
        property_type: match filters.types.as_slice() {
            [kind] => Some(*kind),
            _ => None,
        },
        status: filters.status,
        min_price: filters.min_price,
        max_price: filters.max_price,
        min_yield,
        max_yield,
        ..Default::default()
    }
}

async fn load_objects(app: &App, filters: &ObjectFilters, remote: bool) -> Result<Vec<InvestmentObject>> {
    if remote {
        let api = app.api()?;
        let objects = api.get_objects(&remote_query(filters)).await?;
        return Ok(objects.into_iter().map(|o| o.into_object()).collect());
    }
    Ok(app.store.load().await?.objects)
}

pub async fn list(app: &App, filters: ObjectFilters, sort: SortOrder, remote: bool, json: bool) -> Result<()> {
    let objects = load_objects(app, &filters, remote).await?;
    let found = filters.apply(&objects, sort);
    info!("{} of {} listings match", found.len(), objects.len());

    if json {
        println!("{}", serde_json::to_string_pretty(&found)?);
        return Ok(());
    }
    if found.is_empty() {
        println!("No listings found.");
        return Ok(());
    }
    for object in found {
        print_object(object);
    }
    Ok(())
}

fn print_dashboard(stats: &Dashboard) {
    println!(
        "Users: {} ({} investors, {} brokers, {} admins)",
        stats.users, stats.investors, stats.brokers, stats.admins
    );
    println!(
        "Listings: {} ({} available, {} reserved, {} sold)",
        stats.objects, stats.available, stats.reserved, stats.sold
    );
    println!("Total value: {:.0} ₽", stats.total_value);
    println!("Average yield: {:.1}%", stats.average_yield);
    println!("By city:");
    for (city, count) in &stats.by_city {
        println!("   {city}: {count}");
    }
    println!("By type:");
    for (kind, count) in &stats.by_type {
        println!("   {kind}: {count}");
    }
}

pub async fn stats(app: &App, remote: bool, json: bool) -> Result<()> {
    let stats = if remote {
        let api = app.api()?;
        let users = api.get_users().await?;
        let objects: Vec<InvestmentObject> = api
            .get_objects(&ObjectQuery::default())
            .await?
            .into_iter()
            .map(|o| o.into_object())
            .collect();
        analytics::dashboard(&users, &objects)
    } else {
        let store = app.store.load().await?;
        analytics::dashboard(&store.users, &store.objects)
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print_dashboard(&stats);
    }
    Ok(())
}

pub async fn set_status(app: &App, id: i64, status: ObjectStatus, remote: bool) -> Result<()> {
    let from = if remote {
        let api = app.api()?;
        let from = api.get_object(id).await?.status;
        from.transition(status)?;
        let update = ObjectUpdate {
            status: Some(status),
            ..Default::default()
        };
        api.update_object(id, &update).await?;
        from
    } else {
        let mut store = app.store.load().await?;
        let from = store.set_status(id, status)?;
        app.store.save(&store).await?;
        from
    };
    println!("Listing #{id}: {from} -> {status}");
    Ok(())
}

pub async fn delete(app: &App, id: i64, actor: i64) -> Result<()> {
    let mut store = app.store.load().await?;
    let removed = store.delete_object(id, actor)?;
    app.store.save(&store).await?;
    info!("🗑️ Deleted listing #{} by user #{}", removed.id, actor);
    println!("Deleted #{} {}", removed.id, removed.fields.title);
    Ok(())
}
