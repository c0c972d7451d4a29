use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::error;

use super::{day_href, month_href};
use crate::components::events::month::{load_month_events, MonthEvents};
use crate::components::session::SessionUser;
use crate::utils::grid::{month_grid, CalendarCell, YearMonth};
use crate::utils::time::{month_name, today_in};
use crate::web::templates::{render, CalendarTemplate, CellView, MonthOption, PageError};
use crate::web::AppState;

/// Icons shown per cell before the "+N" counter takes over
pub const MAX_CELL_ICONS: usize = 3;

/// `?year=YYYY&month=M`; values that do not parse fall back to the current month
#[derive(Debug, Default, Deserialize)]
pub struct CalendarQuery {
    pub year: Option<String>,
    pub month: Option<String>,
}

impl CalendarQuery {
    /// The month asked for, if both parts are present and valid
    pub fn requested(&self) -> Option<YearMonth> {
        let year = self.year.as_deref()?.trim().parse::<i32>().ok()?;
        let month1 = self.month.as_deref()?.trim().parse::<u32>().ok()?;
        YearMonth::new(year, month1.checked_sub(1)?)
    }
}

fn cell_view(cell: &CalendarCell, events: &MonthEvents) -> CellView {
    let mut classes = String::from("cell");
    if !cell.is_current_month() {
        classes.push_str(" other-month");
    }
    if cell.is_today {
        classes.push_str(" today");
    }

    let day_events = cell
        .date()
        .and_then(|date| events.get(&date))
        .map(Vec::as_slice)
        .unwrap_or_default();

    CellView {
        day: cell.day,
        href: day_href(&cell.date_string),
        classes,
        icons: day_events
            .iter()
            .take(MAX_CELL_ICONS)
            .map(|e| e.icon.clone())
            .collect(),
        overflow: day_events.len().saturating_sub(MAX_CELL_ICONS),
    }
}

fn href_of(month: Option<YearMonth>) -> Option<String> {
    month.map(|m| month_href(m.year(), m.month1()))
}

/// Build the calendar page for `month`
pub fn calendar_page(
    month: YearMonth,
    today: NaiveDate,
    cells: &[CalendarCell],
    events: &MonthEvents,
    user: &SessionUser,
    notice: Option<String>,
) -> CalendarTemplate {
    let weeks = cells
        .chunks(7)
        .map(|week| week.iter().map(|cell| cell_view(cell, events)).collect())
        .collect();

    let months = (0..12)
        .map(|month0| MonthOption {
            value: month0 + 1,
            name: month_name(month0),
            selected: month0 == month.month0(),
        })
        .collect();

    let today_month = YearMonth::containing(today).unwrap_or(month);

    CalendarTemplate {
        title: t!("calendar_title").to_string(),
        user_email: user.email.clone(),
        month_label: format!("{} {}", month_name(month.month0()), month.year()),
        year: month.year(),
        weeks,
        months,
        today_href: month_href(today_month.year(), today_month.month1()),
        prev_month_href: href_of(month.previous()),
        next_month_href: href_of(month.next()),
        prev_year_href: href_of(month.add_years(-1)),
        next_year_href: href_of(month.add_years(1)),
        notice,
    }
}

/// Handler for the month grid
pub async fn calendar(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Query(query): Query<CalendarQuery>,
) -> Result<Response, PageError> {
    let today = today_in(state.settings.tz);
    let month = match query.requested() {
        Some(month) => month,
        None => YearMonth::containing(today).ok_or_else(|| {
            PageError::new(StatusCode::INTERNAL_SERVER_ERROR, t!("error_generic"))
        })?,
    };

    let cells = month_grid(month, today);
    let (events, notice) = match load_month_events(
        state.events.as_ref(),
        user.id,
        &cells,
        state.settings.month_fetch,
    )
    .await
    {
        Ok(events) => (events, None),
        Err(e) => {
            error!("Failed to load events for {}-{:02}: {}", month.year(), month.month1(), e);
            (MonthEvents::new(), Some(t!("calendar_load_failed").to_string()))
        }
    };

    Ok(render(&calendar_page(month, today, &cells, &events, &user, notice)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::events::{group_by_date, Event};
    use chrono::Utc;
    use uuid::Uuid;

    fn query(year: Option<&str>, month: Option<&str>) -> CalendarQuery {
        CalendarQuery {
            year: year.map(String::from),
            month: month.map(String::from),
        }
    }

    #[test]
    fn test_requested_month() {
        assert_eq!(
            query(Some("2025"), Some("3")).requested(),
            YearMonth::new(2025, 2)
        );
        assert_eq!(query(Some("2025"), Some("0")).requested(), None);
        assert_eq!(query(Some("2025"), Some("13")).requested(), None);
        assert_eq!(query(Some("abc"), Some("3")).requested(), None);
        assert_eq!(query(None, Some("3")).requested(), None);
    }

    #[test]
    fn test_page_model() {
        let user = SessionUser {
            id: Uuid::new_v4(),
            email: "ada@example.com".into(),
        };
        let month = YearMonth::new(2025, 2).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let cells = month_grid(month, today);

        let events: Vec<Event> = (0..5)
            .map(|i| Event {
                id: Uuid::new_v4(),
                user_id: user.id,
                name: format!("Event {}", i),
                icon: "🎉".into(),
                date: today,
                created_at: Utc::now(),
                todos: Vec::new(),
            })
            .collect();
        let page = calendar_page(month, today, &cells, &group_by_date(events), &user, None);

        assert_eq!(page.weeks.len(), 6);
        assert!(page.weeks.iter().all(|w| w.len() == 7));
        assert_eq!(page.month_label, "March 2025");
        assert_eq!(page.prev_month_href.as_deref(), Some("/?year=2025&month=2"));
        assert_eq!(page.next_year_href.as_deref(), Some("/?year=2026&month=3"));
        assert!(page.months[2].selected);

        let cell = page
            .weeks
            .iter()
            .flatten()
            .find(|c| c.href == "/day/2025-03-10")
            .unwrap();
        assert_eq!(cell.icons.len(), 3);
        assert_eq!(cell.overflow, 2);
        assert!(cell.classes.contains("today"));

        // March 2025 starts on a Saturday, so the grid opens on Feb 23
        assert_eq!(page.weeks[0][0].href, "/day/2025-02-23");
        assert!(page.weeks[0][0].classes.contains("other-month"));
    }

    #[test]
    fn test_edges_have_no_links() {
        let user = SessionUser {
            id: Uuid::new_v4(),
            email: String::new(),
        };
        let month = YearMonth::new(9999, 11).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let cells = month_grid(month, today);
        let page = calendar_page(month, today, &cells, &MonthEvents::new(), &user, None);
        assert!(page.next_month_href.is_none());
        assert!(page.next_year_href.is_none());
        assert!(page.prev_month_href.is_some());
    }
}
