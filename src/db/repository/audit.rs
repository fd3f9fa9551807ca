use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::db::{format_timestamp, parse_timestamp, DatabaseError};
use crate::models::{AuditLogEntry, NewAuditEvent};

/// Hard cap on rows returned by one compliance query.
pub const MAX_AUDIT_QUERY_LIMIT: u32 = 1000;

/// Filter for compliance queries. Empty filter = everything, newest first.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub actor: Option<String>,
    pub action: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

/// Append one event. Returns the new row id.
pub fn insert_audit_event(
    conn: &Connection,
    event: &NewAuditEvent,
    timestamp: DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO audit_log (timestamp, actor, action, resource, ip_address, details)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            format_timestamp(&timestamp),
            event.actor,
            event.action.as_str(),
            event.resource,
            event.ip_address,
            event.details,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Query audit entries, newest first.
pub fn query_audit_log(
    conn: &Connection,
    filter: &AuditFilter,
) -> Result<Vec<AuditLogEntry>, DatabaseError> {
    let limit = filter
        .limit
        .unwrap_or(100)
        .clamp(1, MAX_AUDIT_QUERY_LIMIT);
    let since = filter.since.as_ref().map(format_timestamp);

    let mut stmt = conn.prepare(
        "SELECT id, timestamp, actor, action, resource, ip_address, details
         FROM audit_log
         WHERE (?1 IS NULL OR actor = ?1)
           AND (?2 IS NULL OR action = ?2)
           AND (?3 IS NULL OR timestamp >= ?3)
         ORDER BY timestamp DESC, id DESC
         LIMIT ?4",
    )?;

    let rows = stmt
        .query_map(
            params![filter.actor, filter.action, since, limit],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, ts, actor, action, resource, ip_address, details)| {
            Ok(AuditLogEntry {
                id,
                timestamp: parse_timestamp("audit_log.timestamp", &ts)?,
                actor,
                action,
                resource,
                ip_address,
                details,
            })
        })
        .collect()
}

pub fn count_audit_entries(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?;
    Ok(count)
}
