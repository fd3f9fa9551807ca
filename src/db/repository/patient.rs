use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::crypto::FieldCipher;
use crate::db::{format_timestamp, parse_timestamp, DatabaseError};
use crate::models::{PatientDemographics, PatientRecord};

/// Store a patient with every identifying column encrypted.
pub fn insert_patient(
    conn: &Connection,
    cipher: &FieldCipher,
    demographics: &PatientDemographics,
    created_at: DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO patient_data (name_encrypted, dob_encrypted, ssn_encrypted,
         medical_history_encrypted, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            cipher.encrypt_field(&demographics.name)?,
            cipher.encrypt_field(&demographics.date_of_birth)?,
            cipher.encrypt_field(&demographics.ssn)?,
            cipher.encrypt_field(&demographics.medical_history)?,
            format_timestamp(&created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Load and decrypt one patient.
pub fn get_patient(
    conn: &Connection,
    cipher: &FieldCipher,
    id: i64,
) -> Result<Option<PatientRecord>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT name_encrypted, dob_encrypted, ssn_encrypted,
                    medical_history_encrypted, created_at
             FROM patient_data WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;

    let Some((name, dob, ssn, history, created_at)) = row else {
        return Ok(None);
    };

    Ok(Some(PatientRecord {
        id,
        demographics: PatientDemographics {
            name: cipher.decrypt_field(&name)?,
            date_of_birth: cipher.decrypt_field(&dob)?,
            ssn: cipher.decrypt_field(&ssn)?,
            medical_history: cipher.decrypt_field(&history)?,
        },
        created_at: parse_timestamp("patient_data.created_at", &created_at)?,
    }))
}

/// Retention policy: delete patients created before `cutoff`.
pub fn purge_patients_before(conn: &Connection, cutoff: DateTime<Utc>) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM patient_data WHERE created_at < ?1",
        params![format_timestamp(&cutoff)],
    )?;
    Ok(deleted)
}

pub fn count_patients(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM patient_data", [], |row| row.get(0))?;
    Ok(count)
}
