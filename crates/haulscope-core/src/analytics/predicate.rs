//! SQL fragments appended to every operational query.
//!
//! All values go through `push_bind`; only the fixed column names from
//! [`OwnerColumns`] are spliced into the text.

use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::models::{AnalyticsFilter, DateRange, Scope};

/// Ownership columns of the relation a query is scoped through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerColumns {
    /// `tickets t`, directly or joined from `trips tr`
    Tickets,
    /// `contracts c`
    Contracts,
    /// Any daily rollup aliased `mv`
    Rollup,
}

impl OwnerColumns {
    fn creator(self) -> &'static str {
        match self {
            OwnerColumns::Tickets => "t.created_by_org_id",
            OwnerColumns::Contracts => "c.created_by_org",
            OwnerColumns::Rollup => "mv.created_by_org_id",
        }
    }

    fn contractor(self) -> &'static str {
        match self {
            OwnerColumns::Tickets => "t.contractor_id",
            OwnerColumns::Contracts => "c.contractor_id",
            OwnerColumns::Rollup => "mv.contractor_id",
        }
    }
}

/// Append ` AND <scope predicate>` to a query that already has a `WHERE`
pub fn push_scope(qb: &mut QueryBuilder<'_, Postgres>, scope: &Scope, columns: OwnerColumns) {
    match scope {
        Scope::City => {}
        Scope::Regional {
            org_id,
            contractors,
        } if contractors.is_empty() => {
            qb.push(" AND ").push(columns.creator()).push(" = ");
            qb.push_bind(*org_id);
        }
        Scope::Regional {
            org_id,
            contractors,
        } => {
            qb.push(" AND (").push(columns.creator()).push(" = ");
            qb.push_bind(*org_id);
            qb.push(" OR ").push(columns.contractor()).push(" = ANY(");
            qb.push_bind(contractors.clone());
            qb.push("))");
        }
        Scope::Contractor { org_id } => {
            qb.push(" AND ").push(columns.contractor()).push(" = ");
            qb.push_bind(*org_id);
        }
        Scope::Technical => {
            qb.push(" AND FALSE");
        }
    }
}

/// Append ` AND column >= from AND column < to`
pub fn push_range(qb: &mut QueryBuilder<'_, Postgres>, column: &'static str, range: &DateRange) {
    qb.push(" AND ").push(column).push(" >= ");
    qb.push_bind(range.from);
    qb.push(" AND ").push(column).push(" < ");
    qb.push_bind(range.to);
}

/// Append ` AND column = value` when a value is present
pub fn push_eq(qb: &mut QueryBuilder<'_, Postgres>, column: &'static str, value: Option<Uuid>) {
    if let Some(value) = value {
        qb.push(" AND ").push(column).push(" = ");
        qb.push_bind(value);
    }
}

/// Append the optional entity filters of a live `trips tr` query
pub fn push_trip_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &AnalyticsFilter) {
    push_eq(qb, "t.contractor_id", filter.contractor_id);
    push_eq(qb, "tr.driver_id", filter.driver_id);
    push_eq(qb, "tr.polygon_id", filter.polygon_id);
    push_eq(qb, "tr.camera_id", filter.camera_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const BASE: &str = "SELECT 1 FROM trips tr JOIN tickets t ON t.id = tr.ticket_id WHERE TRUE";

    fn org() -> Uuid {
        Uuid::from_u128(0xA)
    }

    fn render(scope: &Scope, columns: OwnerColumns) -> String {
        let mut qb = QueryBuilder::<Postgres>::new(BASE);
        push_scope(&mut qb, scope, columns);
        qb.sql()[BASE.len()..].to_string()
    }

    #[rstest]
    #[case::city(Scope::City, OwnerColumns::Tickets, "")]
    #[case::contractor_tickets(
        Scope::Contractor { org_id: org() },
        OwnerColumns::Tickets,
        " AND t.contractor_id = $1"
    )]
    #[case::contractor_contracts(
        Scope::Contractor { org_id: org() },
        OwnerColumns::Contracts,
        " AND c.contractor_id = $1"
    )]
    #[case::regional_without_children(
        Scope::Regional { org_id: org(), contractors: vec![] },
        OwnerColumns::Rollup,
        " AND mv.created_by_org_id = $1"
    )]
    #[case::regional_with_children(
        Scope::Regional { org_id: org(), contractors: vec![Uuid::from_u128(1), Uuid::from_u128(2)] },
        OwnerColumns::Tickets,
        " AND (t.created_by_org_id = $1 OR t.contractor_id = ANY($2))"
    )]
    #[case::regional_contracts(
        Scope::Regional { org_id: org(), contractors: vec![Uuid::from_u128(1)] },
        OwnerColumns::Contracts,
        " AND (c.created_by_org = $1 OR c.contractor_id = ANY($2))"
    )]
    #[case::technical(Scope::Technical, OwnerColumns::Rollup, " AND FALSE")]
    fn test_scope_predicate(#[case] scope: Scope, #[case] columns: OwnerColumns, #[case] expected: &str) {
        assert_eq!(render(&scope, columns), expected);
    }

    #[test]
    fn test_range_is_half_open() {
        let range = DateRange::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 8, 0, 0, 0).unwrap(),
        );
        let mut qb = QueryBuilder::<Postgres>::new("WHERE TRUE");
        push_range(&mut qb, "tr.entry_at", &range);
        assert_eq!(qb.sql(), "WHERE TRUE AND tr.entry_at >= $1 AND tr.entry_at < $2");
    }

    #[test]
    fn test_optional_equality() {
        let mut qb = QueryBuilder::<Postgres>::new("WHERE TRUE");
        push_eq(&mut qb, "tr.driver_id", None);
        push_eq(&mut qb, "t.contractor_id", Some(org()));
        assert_eq!(qb.sql(), "WHERE TRUE AND t.contractor_id = $1");
    }

    #[test]
    fn test_trip_filters_skip_unset() {
        let mut filter = AnalyticsFilter::for_range(DateRange::new(Utc::now(), Utc::now()));
        filter.driver_id = Some(org());
        filter.camera_id = Some(org());
        let mut qb = QueryBuilder::<Postgres>::new("WHERE TRUE");
        push_trip_filters(&mut qb, &filter);
        assert_eq!(qb.sql(), "WHERE TRUE AND tr.driver_id = $1 AND tr.camera_id = $2");
    }
}
