use std::path::PathBuf;

use clap::Subcommand;
use deleter::{Criterion, DeletionSummary, Engine};
use serde_json::json;

#[derive(Subcommand, Debug)]
pub enum DeleteCommand {
    /// Delete all records in the portal
    DeleteAll,
    /// Delete all records of the given object type(s)
    DeleteObjects {
        /// Object types, e.g. contacts deals 2-1234567
        #[arg(required = true, num_args = 1..)]
        object_types: Vec<String>,
    },
    /// Delete records based on creation or modification date.
    ///
    /// Timestamps must carry an explicit offset: YYYY-MM-DDTHH:MM:SS±HHMM,
    /// e.g. 2024-03-01T00:00:00-0500.
    DeleteByDate {
        /// Delete records created at or after this time
        #[arg(long)]
        created_after: Option<String>,
        /// Delete records modified at or after this time
        #[arg(long)]
        modified_after: Option<String>,
        /// Object types to process; repeat for several, or use "all"
        #[arg(long = "object-types", default_value = "all")]
        object_types: Vec<String>,
    },
    /// Delete records matching a search query
    DeleteByQuery {
        object_type: String,
        /// JSON array of search filters, e.g.
        /// '[{"propertyName":"lifecyclestage","operator":"EQ","value":"lead"}]'
        query: String,
    },
    /// Delete records listed in a CSV file
    DeleteFromCsv {
        /// Object type for rows without an object_type column value
        object_type: String,
        csv_file: PathBuf,
        /// Column containing HubSpot record ids
        #[arg(long)]
        id_column: Option<String>,
    },
    /// Delete records that have a value for a property
    DeleteByProperty {
        object_type: String,
        property_name: String,
    },
}

impl DeleteCommand {
    pub async fn run(self, engine: &Engine, json: bool) -> anyhow::Result<()> {
        match self {
            DeleteCommand::DeleteAll => {
                let summary = engine.delete_all().await?;
                report(&summary, json)
            }
            DeleteCommand::DeleteObjects { object_types } => {
                let summary = engine.delete_objects_by_type(&object_types).await?;
                report(&summary, json)
            }
            DeleteCommand::DeleteByDate {
                created_after,
                modified_after,
                object_types,
            } => {
                let summary = engine
                    .delete_by_date_range(
                        created_after.as_deref(),
                        modified_after.as_deref(),
                        Some(object_types.as_slice()),
                    )
                    .await?;
                report(&summary, json)
            }
            DeleteCommand::DeleteByQuery { object_type, query } => {
                let category = engine.catalog().resolve(&object_type)?;
                let summary = engine.run(Criterion::query(category, &query)?).await?;
                println!("{}", count_message(&summary, &object_type, engine.is_dry_run(), json)?);
                Ok(())
            }
            DeleteCommand::DeleteFromCsv {
                object_type,
                csv_file,
                id_column,
            } => {
                tracing::info!(
                    %object_type,
                    file = %csv_file.display(),
                    "Deleting records listed in CSV file"
                );
                let summary = match id_column {
                    Some(column) => {
                        engine
                            .delete_from_external_list_with_column(&object_type, &csv_file, &column)
                            .await?
                    }
                    None => {
                        engine
                            .delete_from_external_list(&object_type, &csv_file)
                            .await?
                    }
                };
                report(&summary, json)
            }
            DeleteCommand::DeleteByProperty {
                object_type,
                property_name,
            } => {
                let category = engine.catalog().resolve(&object_type)?;
                let criterion = Criterion::property_presence(category, &property_name)?;
                let summary = engine.run(criterion).await?;
                println!("{}", count_message(&summary, &object_type, engine.is_dry_run(), json)?);
                Ok(())
            }
        }
    }
}

fn report(summary: &DeletionSummary, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else if summary.is_empty() {
        println!("No records deleted");
    } else {
        println!("Deletion complete. Summary: {summary}");
    }
    Ok(())
}

/// Result line for the single-category commands
fn count_message(
    summary: &DeletionSummary,
    object_type: &str,
    dry_run: bool,
    json: bool,
) -> anyhow::Result<String> {
    let total = summary.total();
    if json {
        return Ok(serde_json::to_string_pretty(
            &json!({ object_type: total.confirmed_deleted }),
        )?);
    }
    Ok(if dry_run {
        format!(
            "Dry run: would delete {} {object_type} records, none were deleted",
            total.attempted
        )
    } else {
        format!(
            "Successfully deleted {} {object_type} records",
            total.confirmed_deleted
        )
    })
}
