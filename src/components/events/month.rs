//! Loading every event shown on a month grid.

use chrono::NaiveDate;
use futures::future::join_all;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use uuid::Uuid;

use super::models::Event;
use super::EventStore;
use crate::config::MonthFetch;
use crate::error::AppResult;
use crate::utils::grid::CalendarCell;

/// Events keyed by date; dates without events are absent
pub type MonthEvents = BTreeMap<NaiveDate, Vec<Event>>;

/// Group events by their date, keeping each date's input order
pub fn group_by_date(events: Vec<Event>) -> MonthEvents {
    let mut grouped = MonthEvents::new();
    for event in events {
        grouped.entry(event.date).or_default().push(event);
    }
    grouped
}

/// Fetch the events of every cell in `cells`.
///
/// With `MonthFetch::PerDay` a failed cell is logged and left empty, so only the range
/// strategy can return an error.
pub async fn load_month_events(
    store: &dyn EventStore,
    user_id: Uuid,
    cells: &[CalendarCell],
    strategy: MonthFetch,
) -> AppResult<MonthEvents> {
    let dates: Vec<NaiveDate> = cells.iter().filter_map(CalendarCell::date).collect();
    let (Some(&from), Some(&to)) = (dates.first(), dates.last()) else {
        return Ok(MonthEvents::new());
    };

    match strategy {
        MonthFetch::Range => {
            debug!("Loading events {}..={} in one request", from, to);
            let events = store.events_in_range(from, to, user_id).await?;
            Ok(group_by_date(events))
        }
        MonthFetch::PerDay => {
            debug!("Loading events {}..={} one day at a time", from, to);
            let results = join_all(
                dates
                    .iter()
                    .map(|&date| async move { (date, store.events_for_date(date, user_id).await) }),
            )
            .await;

            let mut grouped = MonthEvents::new();
            for (date, result) in results {
                match result {
                    Ok(events) if !events.is_empty() => {
                        grouped.insert(date, events);
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Failed to load events for {}: {}", date, e),
                }
            }
            Ok(grouped)
        }
    }
}
