use async_graphql::{ComplexObject, Context, EmptyMutation, Json, Object, Result as GraphQLResult, Schema, Subscription};
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::models::*;
use crate::service::ProcessingService;

pub type ProcessingSchema = Schema<QueryRoot, EmptyMutation, SubscriptionRoot>;

pub fn build_schema(service: ProcessingService) -> ProcessingSchema {
    Schema::build(QueryRoot, EmptyMutation, SubscriptionRoot)
        .data(service)
        .finish()
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Get a job by its batch ID
    async fn job(&self, ctx: &Context<'_>, id: Uuid) -> GraphQLResult<Option<Job>> {
        let service = ctx.data::<ProcessingService>()?;
        Ok(service.registry.get(id).await)
    }

    /// List jobs, newest first
    async fn jobs(&self, ctx: &Context<'_>, limit: Option<i32>) -> GraphQLResult<Vec<Job>> {
        let service = ctx.data::<ProcessingService>()?;
        let limit = limit.map(|l| l.max(0) as usize);
        Ok(service.registry.list(limit).await)
    }

    /// Pipeline stage labels in execution order
    async fn stage_names(&self) -> Vec<String> {
        StageName::ALL.iter().map(|s| s.label().to_string()).collect()
    }

    /// Health check
    async fn health(&self) -> GraphQLResult<String> {
        Ok("OK".to_string())
    }
}

#[ComplexObject]
impl Job {
    /// Published result bundle, present once the job has completed
    async fn bundle(&self) -> Option<Json<ResultBundle>> {
        self.bundle.clone().map(Json)
    }
}

pub struct SubscriptionRoot;

#[Subscription]
impl SubscriptionRoot {
    /// Current stage snapshot followed by one snapshot per transition.
    /// The stream ends when the job finishes.
    async fn stage_updates(
        &self,
        ctx: &Context<'_>,
        job_id: Uuid,
    ) -> async_graphql::Result<impl Stream<Item = StageSnapshot>> {
        let service = ctx.data::<ProcessingService>()?;
        let (initial, updates) = service.registry.subscribe(job_id).await?;

        Ok(futures::stream::unfold((Some(initial), updates), |(pending, mut updates)| async move {
            if let Some(snapshot) = pending {
                return Some((snapshot, (None, updates)));
            }
            let receiver = updates.as_mut()?;
            loop {
                match receiver.recv().await {
                    Ok(snapshot) => return Some((snapshot, (None, updates))),
                    // Snapshots are complete, so the next one supersedes what was missed
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Stage subscriber lagged");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        }))
    }
}
