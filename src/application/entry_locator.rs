use crate::domain::models::{TimeEntry, TimeEntryId, WorkItemId};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::mite_client::MiteClient;

/// Finds today's entry tagged for `work_item_id`.
///
/// Scans in the order the service returns entries and takes the first match.
/// Tags are assumed unique per work item and day; if they are not, the result
/// depends on the remote ordering.
pub async fn find_today_entry_for<C>(
    client: &C,
    work_item_id: WorkItemId,
) -> Result<Option<TimeEntry>, InfraError>
where
    C: MiteClient + ?Sized,
{
    let entries = client.time_entries_for_today().await?;
    Ok(entries.into_iter().find(|entry| entry.belongs_to(work_item_id)))
}

pub async fn find_running_entry_id<C>(client: &C) -> Result<Option<TimeEntryId>, InfraError>
where
    C: MiteClient + ?Sized,
{
    Ok(client.tracking_time_entry().await?.map(|running| running.id))
}
