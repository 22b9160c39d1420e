use std::io::Write;

use super::domain::ApplicationRecord;

const HEADER: [&str; 13] = [
    "id",
    "category",
    "status",
    "memberId",
    "firstName",
    "middleName",
    "lastName",
    "email",
    "phone",
    "district",
    "createdAt",
    "updatedAt",
    "rejectionReason",
];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write csv export: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush csv export: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes one CSV row per record, header first.
pub fn write_csv<W: Write>(writer: W, records: &[ApplicationRecord]) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(HEADER)?;

    for record in records {
        let applicant = &record.applicant;
        let created_at = record.created_at.to_rfc3339();
        let updated_at = record.updated_at.to_rfc3339();
        csv.write_record([
            record.id.as_str(),
            record.category.label(),
            record.status.label(),
            record.member_id.as_ref().map_or("", |id| id.as_str()),
            applicant.first_name.as_str(),
            applicant.middle_name.as_deref().unwrap_or(""),
            applicant.last_name.as_str(),
            applicant.email.as_str(),
            applicant.phone.as_str(),
            applicant.district.as_deref().unwrap_or(""),
            created_at.as_str(),
            updated_at.as_str(),
            record.rejection_reason.as_deref().unwrap_or(""),
        ])?;
    }

    csv.flush()?;
    Ok(())
}

pub fn to_csv_bytes(records: &[ApplicationRecord]) -> Result<Vec<u8>, ExportError> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, records)?;
    Ok(buffer)
}
