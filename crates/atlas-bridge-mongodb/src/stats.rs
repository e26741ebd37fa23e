//! Aggregation summary pipeline
//!
//! Builds the match/group/project/sort pipeline behind collection
//! summaries: document counts per group, optional average and total of
//! numeric fields, and an optional distinct-value count.

use bson::{doc, Bson, Document as BsonDocument};

use atlas_bridge_common::Result;

use crate::collection::CollectionHandle;

/// Description of one summary aggregation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummarySpec {
    /// Filter applied before grouping; empty means no `$match` stage
    pub match_filter: BsonDocument,
    /// Field whose values partition the groups; `None` groups everything
    pub group_by: Option<String>,
    /// Field averaged per group as `average`
    pub avg_field: Option<String>,
    /// Field totalled per group as `total`
    pub sum_field: Option<String>,
    /// Field whose distinct values are counted per group as `uniqueCount`
    pub unique_field: Option<String>,
}

impl SummarySpec {
    /// Builds the aggregation stages for this summary
    pub fn build_pipeline(&self) -> Vec<BsonDocument> {
        let mut pipeline = Vec::new();

        if !self.match_filter.is_empty() {
            pipeline.push(doc! { "$match": self.match_filter.clone() });
        }

        let group_key = match &self.group_by {
            Some(field) => Bson::String(format!("${}", field)),
            None => Bson::Null,
        };
        let mut group_stage = doc! {
            "_id": group_key,
            "count": { "$sum": 1 },
        };
        if let Some(field) = &self.avg_field {
            group_stage.insert("average", doc! { "$avg": format!("${}", field) });
        }
        if let Some(field) = &self.sum_field {
            group_stage.insert("total", doc! { "$sum": format!("${}", field) });
        }
        if let Some(field) = &self.unique_field {
            group_stage.insert("uniqueValues", doc! { "$addToSet": format!("${}", field) });
        }
        pipeline.push(doc! { "$group": group_stage });

        if self.unique_field.is_some() {
            pipeline.push(doc! {
                "$project": {
                    "_id": 1,
                    "count": 1,
                    "average": 1,
                    "total": 1,
                    "uniqueCount": { "$size": "$uniqueValues" },
                }
            });
        }

        pipeline.push(doc! { "$sort": { "count": -1 } });
        pipeline
    }
}

impl CollectionHandle {
    /// Runs a summary aggregation over this collection
    pub async fn summarize(&self, spec: &SummarySpec) -> Result<Vec<BsonDocument>> {
        self.aggregate_documents(spec.build_pipeline()).await
    }
}
