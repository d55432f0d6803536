//! Rendering of composed ticket listings into SQL.

use quickdesk_core::query::{Predicate, TicketQuery};
use sqlx::{Postgres, QueryBuilder};

/// Columns of a [`TicketSummary`](quickdesk_core::model::TicketSummary) row.
pub(crate) const SUMMARY_SELECT: &str = "SELECT t.id, t.title, t.description, t.status, \
    t.priority, t.category_id, t.creator_id, t.assigned_agent_id, t.created_at, t.updated_at, \
    c.name AS category_name, c.color AS category_color, \
    cr.full_name AS creator_name, cr.email AS creator_email, \
    ag.full_name AS assigned_agent_name, \
    (SELECT COUNT(*) FROM ticket_comments tc WHERE tc.ticket_id = t.id) AS comment_count, \
    (SELECT COUNT(*) FROM ticket_votes v WHERE v.ticket_id = t.id AND v.vote_type = 'upvote') AS upvotes, \
    (SELECT COUNT(*) FROM ticket_votes v WHERE v.ticket_id = t.id AND v.vote_type = 'downvote') AS downvotes, \
    EXISTS (SELECT 1 FROM ticket_attachments a WHERE a.ticket_id = t.id) AS has_attachments \
    FROM tickets t \
    LEFT JOIN categories c ON c.id = t.category_id \
    LEFT JOIN profiles cr ON cr.id = t.creator_id \
    LEFT JOIN profiles ag ON ag.id = t.assigned_agent_id";

/// Escape `\`, `%` and `_` and wrap in `%` for a literal substring match.
pub(crate) fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Append ` WHERE ...` for the predicates, in order. Nothing for none.
pub(crate) fn push_predicates(qb: &mut QueryBuilder<'_, Postgres>, predicates: &[Predicate]) {
    for (i, predicate) in predicates.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        match predicate {
            Predicate::CreatedBy(id) => {
                qb.push("t.creator_id = ").push_bind(*id);
            }
            Predicate::CreatedByOrAssignedTo(id) => {
                qb.push("(t.creator_id = ")
                    .push_bind(*id)
                    .push(" OR t.assigned_agent_id = ")
                    .push_bind(*id)
                    .push(")");
            }
            Predicate::Search(term) => {
                let pattern = like_pattern(term);
                qb.push("(t.title ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR t.description ILIKE ")
                    .push_bind(pattern)
                    .push(")");
            }
            Predicate::Status(status) => {
                qb.push("t.status = ").push_bind(*status);
            }
            Predicate::Priority(priority) => {
                qb.push("t.priority = ").push_bind(*priority);
            }
            Predicate::Category(id) => {
                qb.push("t.category_id = ").push_bind(*id);
            }
            Predicate::Unassigned => {
                qb.push("t.assigned_agent_id IS NULL");
            }
            Predicate::AssignedTo(id) => {
                qb.push("t.assigned_agent_id = ").push_bind(*id);
            }
        }
    }
}

/// Full page query for a listing.
pub(crate) fn ticket_page(query: &TicketQuery) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(SUMMARY_SELECT);
    push_predicates(&mut qb, &query.predicates);
    let direction = query.sort_order.keyword();
    qb.push(format!(
        " ORDER BY t.{} {}, t.id {}",
        query.sort_field.column(),
        direction,
        direction
    ));
    qb.push(" LIMIT ")
        .push_bind(i64::from(query.limit))
        .push(" OFFSET ")
        .push_bind(i64::try_from(query.offset).unwrap_or(i64::MAX));
    qb
}

/// `SELECT COUNT(*)` over the same predicates.
pub(crate) fn ticket_count(predicates: &[Predicate]) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM tickets t");
    push_predicates(&mut qb, predicates);
    qb
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quickdesk_core::model::{NotificationSettings, Profile, Role, TicketStatus};
    use quickdesk_core::query::{self, TicketFilters, TicketListRequest};
    use uuid::Uuid;

    fn viewer(role: Role) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            full_name: "Viewer".into(),
            email: "viewer@example.com".into(),
            role,
            notification_settings: NotificationSettings::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_like_pattern_is_literal() {
        assert_eq!(like_pattern("vpn"), "%vpn%");
        assert_eq!(like_pattern("100%_done\\"), "%100\\%\\_done\\\\%");
    }

    #[test]
    fn test_end_user_scope_comes_first() {
        let request = TicketListRequest {
            filters: TicketFilters {
                search: Some("printer".into()),
                status: Some("open".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let query = query::compose(&viewer(Role::EndUser), &request).unwrap();
        let qb = ticket_page(&query);
        let sql = qb.sql();

        let where_clause = &sql[sql.find(" WHERE ").unwrap()..];
        assert!(where_clause.starts_with(" WHERE t.creator_id = $1 AND "));
        assert!(sql.contains("(t.title ILIKE $2 OR t.description ILIKE $3)"));
        assert!(sql.contains("t.status = $4"));
        assert!(sql.ends_with("ORDER BY t.created_at DESC, t.id DESC LIMIT $5 OFFSET $6"));
    }

    #[test]
    fn test_agent_scope_is_parenthesised() {
        let query = query::compose(&viewer(Role::SupportAgent), &TicketListRequest::default()).unwrap();
        let qb = ticket_count(&query.predicates);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM tickets t WHERE (t.creator_id = $1 OR t.assigned_agent_id = $2)"
        );
    }

    #[test]
    fn test_admin_without_filters_has_no_where() {
        let qb = ticket_count(&[]);
        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM tickets t");

        let qb = ticket_count(&[Predicate::Unassigned, Predicate::Status(TicketStatus::Closed)]);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM tickets t WHERE t.assigned_agent_id IS NULL AND t.status = $1"
        );
    }
}
